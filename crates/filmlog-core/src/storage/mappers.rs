//! Row-to-entity decoding
//!
//! One typed decode function per entity, reading columns by name so the
//! decoders survive column reordering. Nullable numeric columns decode to
//! the entity's default value; legacy text encodings that cannot be parsed
//! (location, custom aperture list) decode to empty rather than failing,
//! since files from old releases may carry junk in them. Dates are required
//! to parse; a bad date fails the read fast.
//!
//! Link id sets are not populated here; the façade loads them with follow-up
//! queries one level deep.

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{Result, Row};
use thiserror::Error;

use crate::models::{
    Camera, CompIncrements, FilmFormat, FilmProcess, FilmStock, FilmType, Filter, Frame,
    Increments, Lens, LightSource, Roll,
};

/// Storage format for roll and frame timestamps
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub(crate) const FILM_STOCK_COLUMNS: &str = "film_stock_id, film_stock_make, film_stock_model, \
     film_iso, film_type, film_process, film_is_preadded";

pub(crate) const LENS_COLUMNS: &str = "lens_id, lens_make, lens_model, lens_serial_no, \
     lens_min_aperture, lens_max_aperture, lens_min_focal_length, lens_max_focal_length, \
     lens_aperture_increments, lens_custom_aperture_values";

pub(crate) const CAMERA_COLUMNS: &str = "camera_id, camera_make, camera_model, camera_serial_no, \
     camera_min_shutter, camera_max_shutter, camera_shutter_increments, \
     camera_exposure_comp_increments, camera_format, lens_id";

pub(crate) const FILTER_COLUMNS: &str = "filter_id, filter_make, filter_model";

pub(crate) const ROLL_COLUMNS: &str = "roll_id, roll_name, roll_date, roll_note, roll_iso, \
     roll_push_pull, roll_format, roll_archived, roll_unloaded, roll_developed, camera_id, \
     film_stock_id";

pub(crate) const FRAME_COLUMNS: &str = "frame_id, roll_id, count, date, shutter, aperture, \
     frame_note, location, formatted_address, focal_length, exposure_comp, no_of_exposures, \
     flash_used, flash_power, flash_comp, metering_mode, light_source, picture_filename, lens_id";

/// A decoded camera row; the fixed lens is still an id at this point
pub(crate) struct CameraRow {
    pub camera: Camera,
    pub lens_id: Option<i64>,
}

/// Error decoding a column value that the schema cannot constrain
#[derive(Debug, Error)]
#[error("column '{column}': {source}")]
pub(crate) struct ColumnDecodeError {
    column: &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

fn decode_error(
    column: &'static str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        Box::new(ColumnDecodeError {
            column,
            source: Box::new(source),
        }),
    )
}

/// Parse a stored timestamp
///
/// Accepts the seconds-bearing variant first; old files wrote minutes only.
pub(crate) fn parse_datetime(text: &str) -> chrono::ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, DATETIME_FORMAT))
}

/// Format a timestamp for storage
pub(crate) fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

fn required_datetime(row: &Row, column: &'static str) -> Result<NaiveDateTime> {
    let text: String = row.get(column)?;
    parse_datetime(&text).map_err(|e| decode_error(column, e))
}

fn optional_datetime(row: &Row, column: &'static str) -> Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => parse_datetime(&text)
            .map(Some)
            .map_err(|e| decode_error(column, e)),
        None => Ok(None),
    }
}

/// Serialize a custom aperture list for storage; empty lists store as NULL
pub(crate) fn encode_aperture_values(values: &[f64]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        serde_json::to_string(values).ok()
    }
}

fn decode_aperture_values(text: Option<String>) -> Vec<f64> {
    text.and_then(|t| serde_json::from_str(&t).ok())
        .unwrap_or_default()
}

pub(crate) fn film_stock_from_row(row: &Row) -> Result<FilmStock> {
    Ok(FilmStock {
        id: row.get("film_stock_id")?,
        make: row.get("film_stock_make")?,
        model: row.get("film_stock_model")?,
        iso: row.get::<_, Option<i32>>("film_iso")?.unwrap_or(0),
        film_type: FilmType::from_code(row.get::<_, Option<i32>>("film_type")?.unwrap_or(0)),
        process: FilmProcess::from_code(row.get::<_, Option<i32>>("film_process")?.unwrap_or(0)),
        is_preadded: row.get::<_, i32>("film_is_preadded")? != 0,
    })
}

pub(crate) fn lens_from_row(row: &Row) -> Result<Lens> {
    Ok(Lens {
        id: row.get("lens_id")?,
        make: row.get("lens_make")?,
        model: row.get("lens_model")?,
        serial_number: row.get("lens_serial_no")?,
        min_aperture: row.get("lens_min_aperture")?,
        max_aperture: row.get("lens_max_aperture")?,
        min_focal_length: row
            .get::<_, Option<i32>>("lens_min_focal_length")?
            .unwrap_or(0),
        max_focal_length: row
            .get::<_, Option<i32>>("lens_max_focal_length")?
            .unwrap_or(0),
        aperture_increments: Increments::from_code(row.get("lens_aperture_increments")?),
        custom_aperture_values: decode_aperture_values(row.get("lens_custom_aperture_values")?),
        filter_ids: Default::default(),
        camera_ids: Default::default(),
    })
}

pub(crate) fn camera_from_row(row: &Row) -> Result<CameraRow> {
    let camera = Camera {
        id: row.get("camera_id")?,
        make: row.get("camera_make")?,
        model: row.get("camera_model")?,
        serial_number: row.get("camera_serial_no")?,
        min_shutter: row.get("camera_min_shutter")?,
        max_shutter: row.get("camera_max_shutter")?,
        shutter_increments: Increments::from_code(row.get("camera_shutter_increments")?),
        exposure_comp_increments: CompIncrements::from_code(
            row.get("camera_exposure_comp_increments")?,
        ),
        format: FilmFormat::from_code(row.get::<_, Option<i32>>("camera_format")?.unwrap_or(0)),
        lens: None,
        lens_ids: Default::default(),
    };
    Ok(CameraRow {
        camera,
        lens_id: row.get("lens_id")?,
    })
}

pub(crate) fn filter_from_row(row: &Row) -> Result<Filter> {
    Ok(Filter {
        id: row.get("filter_id")?,
        make: row.get("filter_make")?,
        model: row.get("filter_model")?,
    })
}

pub(crate) fn roll_from_row(row: &Row) -> Result<Roll> {
    Ok(Roll {
        id: row.get("roll_id")?,
        name: row.get("roll_name")?,
        date: required_datetime(row, "roll_date")?,
        unloaded: optional_datetime(row, "roll_unloaded")?,
        developed: optional_datetime(row, "roll_developed")?,
        note: row.get("roll_note")?,
        camera_id: row.get("camera_id")?,
        iso: row.get::<_, Option<i32>>("roll_iso")?.unwrap_or(0),
        push_pull: row.get("roll_push_pull")?,
        format: FilmFormat::from_code(row.get::<_, Option<i32>>("roll_format")?.unwrap_or(0)),
        archived: row.get::<_, i32>("roll_archived")? != 0,
        film_stock_id: row.get("film_stock_id")?,
    })
}

pub(crate) fn frame_from_row(row: &Row) -> Result<Frame> {
    Ok(Frame {
        id: row.get("frame_id")?,
        roll_id: row.get("roll_id")?,
        count: row.get("count")?,
        date: required_datetime(row, "date")?,
        shutter: row.get("shutter")?,
        aperture: row.get("aperture")?,
        note: row.get("frame_note")?,
        location: row
            .get::<_, Option<String>>("location")?
            .and_then(|s| s.parse().ok()),
        formatted_address: row.get("formatted_address")?,
        focal_length: row.get::<_, Option<i32>>("focal_length")?.unwrap_or(0),
        exposure_comp: row.get("exposure_comp")?,
        no_of_exposures: row.get::<_, Option<i32>>("no_of_exposures")?.unwrap_or(1),
        flash_used: row.get::<_, Option<i32>>("flash_used")?.unwrap_or(0) != 0,
        flash_power: row.get("flash_power")?,
        flash_comp: row.get("flash_comp")?,
        metering_mode: row.get::<_, Option<i32>>("metering_mode")?.unwrap_or(0),
        light_source: LightSource::from_code(
            row.get::<_, Option<i32>>("light_source")?.unwrap_or(0),
        ),
        picture_filename: row.get("picture_filename")?,
        lens_id: row.get("lens_id")?,
        filter_ids: Default::default(),
    })
}
