//! Data models for filmlog
//!
//! Defines the six core entities of the store: FilmStock, Lens, Camera,
//! Filter, Roll, and Frame. Ids are assigned by the database on insert;
//! an id of 0 means the record has not been persisted yet.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Film type stored as an integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FilmType {
    #[default]
    Unknown,
    Slide,
    ColorNegative,
    BwNegative,
    BwReversal,
    Infrared,
    Instant,
}

impl FilmType {
    /// Decode from the stored integer code; unknown codes fall back to `Unknown`
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FilmType::Slide,
            2 => FilmType::ColorNegative,
            3 => FilmType::BwNegative,
            4 => FilmType::BwReversal,
            5 => FilmType::Infrared,
            6 => FilmType::Instant,
            _ => FilmType::Unknown,
        }
    }

    /// The integer code stored in the database
    pub fn code(self) -> i32 {
        match self {
            FilmType::Unknown => 0,
            FilmType::Slide => 1,
            FilmType::ColorNegative => 2,
            FilmType::BwNegative => 3,
            FilmType::BwReversal => 4,
            FilmType::Infrared => 5,
            FilmType::Instant => 6,
        }
    }
}

/// Development process stored as an integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FilmProcess {
    #[default]
    Unknown,
    C41,
    E6,
    Bw,
    Ecn2,
}

impl FilmProcess {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FilmProcess::C41,
            2 => FilmProcess::E6,
            3 => FilmProcess::Bw,
            4 => FilmProcess::Ecn2,
            _ => FilmProcess::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            FilmProcess::Unknown => 0,
            FilmProcess::C41 => 1,
            FilmProcess::E6 => 2,
            FilmProcess::Bw => 3,
            FilmProcess::Ecn2 => 4,
        }
    }
}

/// Aperture or shutter scale granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Increments {
    #[default]
    Third,
    Half,
    Full,
}

impl Increments {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Increments::Half,
            2 => Increments::Full,
            _ => Increments::Third,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Increments::Third => 0,
            Increments::Half => 1,
            Increments::Full => 2,
        }
    }
}

/// Exposure compensation scale granularity (cameras offer third or half stops)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CompIncrements {
    #[default]
    Third,
    Half,
}

impl CompIncrements {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => CompIncrements::Half,
            _ => CompIncrements::Third,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            CompIncrements::Third => 0,
            CompIncrements::Half => 1,
        }
    }
}

/// Physical film format of a roll or camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FilmFormat {
    #[default]
    Format135,
    Format120,
    Format127,
    Format110,
    LargeFormat4x5,
    LargeFormat8x10,
}

impl FilmFormat {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FilmFormat::Format120,
            2 => FilmFormat::Format127,
            3 => FilmFormat::Format110,
            4 => FilmFormat::LargeFormat4x5,
            5 => FilmFormat::LargeFormat8x10,
            _ => FilmFormat::Format135,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            FilmFormat::Format135 => 0,
            FilmFormat::Format120 => 1,
            FilmFormat::Format127 => 2,
            FilmFormat::Format110 => 3,
            FilmFormat::LargeFormat4x5 => 4,
            FilmFormat::LargeFormat8x10 => 5,
        }
    }
}

/// Ambient light source recorded for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LightSource {
    #[default]
    Unknown,
    Daylight,
    Sunny,
    Cloudy,
    Shade,
    Fluorescent,
    Tungsten,
    Flash,
}

impl LightSource {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => LightSource::Daylight,
            2 => LightSource::Sunny,
            3 => LightSource::Cloudy,
            4 => LightSource::Shade,
            5 => LightSource::Fluorescent,
            6 => LightSource::Tungsten,
            7 => LightSource::Flash,
            _ => LightSource::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            LightSource::Unknown => 0,
            LightSource::Daylight => 1,
            LightSource::Sunny => 2,
            LightSource::Cloudy => 3,
            LightSource::Shade => 4,
            LightSource::Fluorescent => 5,
            LightSource::Tungsten => 6,
            LightSource::Flash => 7,
        }
    }
}

/// Geographic coordinates of an exposure
///
/// Stored as a `"latitude longitude"` text column for compatibility with
/// files written by earlier releases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.latitude, self.longitude)
    }
}

/// Error parsing a stored location string
#[derive(Debug, Error)]
#[error("invalid location string: expected 'latitude longitude'")]
pub struct LocationParseError;

impl FromStr for Location {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let latitude = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or(LocationParseError)?;
        let longitude = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or(LocationParseError)?;
        if parts.next().is_some() {
            return Err(LocationParseError);
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// A film stock (emulsion) that rolls can reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilmStock {
    /// Database id, 0 until inserted
    pub id: i64,
    pub make: String,
    pub model: String,
    /// Box speed
    pub iso: i32,
    pub film_type: FilmType,
    pub process: FilmProcess,
    /// True for catalog entries bundled with the application
    pub is_preadded: bool,
}

impl FilmStock {
    pub fn new(make: impl Into<String>, model: impl Into<String>, iso: i32) -> Self {
        Self {
            id: 0,
            make: make.into(),
            model: model.into(),
            iso,
            film_type: FilmType::Unknown,
            process: FilmProcess::Unknown,
            is_preadded: false,
        }
    }
}

/// A lens, either standalone or fixed to a camera
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lens {
    /// Database id, 0 until inserted
    pub id: i64,
    pub make: String,
    pub model: String,
    pub serial_number: Option<String>,
    /// Widest aperture as display text, e.g. "1.8"
    pub min_aperture: Option<String>,
    /// Narrowest aperture as display text, e.g. "22"
    pub max_aperture: Option<String>,
    /// Millimetres; 0 when unknown
    pub min_focal_length: i32,
    pub max_focal_length: i32,
    pub aperture_increments: Increments,
    /// User-defined aperture values outside the standard scales
    pub custom_aperture_values: Vec<f64>,
    /// Ids of filters mountable on this lens
    pub filter_ids: HashSet<i64>,
    /// Ids of cameras this lens mounts on
    pub camera_ids: HashSet<i64>,
}

impl Lens {
    pub fn new(make: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: 0,
            make: make.into(),
            model: model.into(),
            serial_number: None,
            min_aperture: None,
            max_aperture: None,
            min_focal_length: 0,
            max_focal_length: 0,
            aperture_increments: Increments::Third,
            custom_aperture_values: Vec::new(),
            filter_ids: HashSet::new(),
            camera_ids: HashSet::new(),
        }
    }
}

/// A camera body
///
/// A camera either owns one fixed lens (`lens` is set) or mounts
/// interchangeable lenses (`lens_ids`), never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Camera {
    /// Database id, 0 until inserted
    pub id: i64,
    pub make: String,
    pub model: String,
    pub serial_number: Option<String>,
    /// Slowest shutter speed as display text, e.g. "8"
    pub min_shutter: Option<String>,
    /// Fastest shutter speed as display text, e.g. "1/4000"
    pub max_shutter: Option<String>,
    pub shutter_increments: Increments,
    pub exposure_comp_increments: CompIncrements,
    pub format: FilmFormat,
    /// Fixed lens owned exclusively by this camera
    pub lens: Option<Lens>,
    /// Ids of mountable lenses (empty for fixed-lens cameras)
    pub lens_ids: HashSet<i64>,
}

impl Camera {
    pub fn new(make: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: 0,
            make: make.into(),
            model: model.into(),
            serial_number: None,
            min_shutter: None,
            max_shutter: None,
            shutter_increments: Increments::Third,
            exposure_comp_increments: CompIncrements::Third,
            format: FilmFormat::Format135,
            lens: None,
            lens_ids: HashSet::new(),
        }
    }
}

/// A lens filter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    /// Database id, 0 until inserted
    pub id: i64,
    pub make: String,
    pub model: String,
}

impl Filter {
    pub fn new(make: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: 0,
            make: make.into(),
            model: model.into(),
        }
    }
}

/// A roll of film, owning an ordered sequence of frames
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Roll {
    /// Database id, 0 until inserted
    pub id: i64,
    pub name: String,
    /// When the roll was loaded into a camera
    pub date: NaiveDateTime,
    pub unloaded: Option<NaiveDateTime>,
    pub developed: Option<NaiveDateTime>,
    pub note: Option<String>,
    /// Camera the roll was shot in; cleared when the camera is deleted
    pub camera_id: Option<i64>,
    /// Shot speed, 0 when unknown
    pub iso: i32,
    /// Push/pull processing as display text, e.g. "+1"
    pub push_pull: Option<String>,
    pub format: FilmFormat,
    pub archived: bool,
    pub film_stock_id: Option<i64>,
}

impl Roll {
    pub fn new(name: impl Into<String>, date: NaiveDateTime) -> Self {
        Self {
            id: 0,
            name: name.into(),
            date,
            unloaded: None,
            developed: None,
            note: None,
            camera_id: None,
            iso: 0,
            push_pull: None,
            format: FilmFormat::Format135,
            archived: false,
            film_stock_id: None,
        }
    }
}

/// One exposure on a roll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    /// Database id, 0 until inserted
    pub id: i64,
    /// Owning roll; frames are deleted with their roll
    pub roll_id: i64,
    /// Position on the roll, starting at 1
    pub count: i32,
    pub date: NaiveDateTime,
    /// Shutter speed as display text, e.g. "1/125"
    pub shutter: Option<String>,
    /// Aperture as display text, e.g. "5.6"
    pub aperture: Option<String>,
    pub note: Option<String>,
    pub location: Option<Location>,
    pub formatted_address: Option<String>,
    /// Millimetres; 0 when unknown
    pub focal_length: i32,
    /// Exposure compensation as display text, e.g. "-2/3"
    pub exposure_comp: Option<String>,
    /// Number of exposures made on this frame (multi-exposure)
    pub no_of_exposures: i32,
    pub flash_used: bool,
    pub flash_power: Option<String>,
    pub flash_comp: Option<String>,
    pub metering_mode: i32,
    pub light_source: LightSource,
    /// Filename of a complementary digital picture
    pub picture_filename: Option<String>,
    /// Lens used; cleared when the lens is deleted
    pub lens_id: Option<i64>,
    /// Filters mounted when the frame was taken
    pub filter_ids: HashSet<i64>,
}

impl Frame {
    pub fn new(roll_id: i64, count: i32, date: NaiveDateTime) -> Self {
        Self {
            id: 0,
            roll_id,
            count,
            date,
            shutter: None,
            aperture: None,
            note: None,
            location: None,
            formatted_address: None,
            focal_length: 0,
            exposure_comp: None,
            no_of_exposures: 1,
            flash_used: false,
            flash_power: None,
            flash_comp: None,
            metering_mode: 0,
            light_source: LightSource::Unknown,
            picture_filename: None,
            lens_id: None,
            filter_ids: HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 12)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_film_type_codes() {
        assert_eq!(FilmType::from_code(3), FilmType::BwNegative);
        assert_eq!(FilmType::BwNegative.code(), 3);
        // Unknown codes decode without panicking
        assert_eq!(FilmType::from_code(42), FilmType::Unknown);
        assert_eq!(FilmType::from_code(-1), FilmType::Unknown);
    }

    #[test]
    fn test_enum_code_round_trips() {
        for code in 0..=6 {
            assert_eq!(FilmType::from_code(code).code(), code);
        }
        for code in 0..=4 {
            assert_eq!(FilmProcess::from_code(code).code(), code);
        }
        for code in 0..=2 {
            assert_eq!(Increments::from_code(code).code(), code);
        }
        for code in 0..=1 {
            assert_eq!(CompIncrements::from_code(code).code(), code);
        }
        for code in 0..=5 {
            assert_eq!(FilmFormat::from_code(code).code(), code);
        }
        for code in 0..=7 {
            assert_eq!(LightSource::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_location_display_round_trip() {
        let loc = Location::new(60.1699, 24.9384);
        let text = loc.to_string();
        assert_eq!(text, "60.1699 24.9384");

        let parsed: Location = text.parse().unwrap();
        assert_eq!(parsed, loc);
    }

    #[test]
    fn test_location_parse_rejects_garbage() {
        assert!("".parse::<Location>().is_err());
        assert!("60.1699".parse::<Location>().is_err());
        assert!("north south".parse::<Location>().is_err());
        assert!("60.1699 24.9384 extra".parse::<Location>().is_err());
    }

    #[test]
    fn test_location_parse_negative_coordinates() {
        let parsed: Location = "-33.8688 151.2093".parse().unwrap();
        assert_eq!(parsed.latitude, -33.8688);
        assert_eq!(parsed.longitude, 151.2093);
    }

    #[test]
    fn test_film_stock_new() {
        let stock = FilmStock::new("Kodak", "Tri-X 400", 400);
        assert_eq!(stock.id, 0);
        assert_eq!(stock.make, "Kodak");
        assert_eq!(stock.model, "Tri-X 400");
        assert_eq!(stock.iso, 400);
        assert!(!stock.is_preadded);
        assert_eq!(stock.film_type, FilmType::Unknown);
    }

    #[test]
    fn test_lens_new() {
        let lens = Lens::new("Canon", "FD 50mm f/1.4");
        assert_eq!(lens.id, 0);
        assert_eq!(lens.min_focal_length, 0);
        assert!(lens.custom_aperture_values.is_empty());
        assert!(lens.filter_ids.is_empty());
        assert!(lens.camera_ids.is_empty());
    }

    #[test]
    fn test_camera_new() {
        let camera = Camera::new("Nikon", "FM2");
        assert_eq!(camera.id, 0);
        assert!(camera.lens.is_none());
        assert!(camera.lens_ids.is_empty());
        assert_eq!(camera.format, FilmFormat::Format135);
    }

    #[test]
    fn test_roll_new() {
        let roll = Roll::new("Summer trip", test_date());
        assert_eq!(roll.id, 0);
        assert!(!roll.archived);
        assert!(roll.camera_id.is_none());
        assert!(roll.film_stock_id.is_none());
        assert!(roll.unloaded.is_none());
    }

    #[test]
    fn test_frame_new() {
        let frame = Frame::new(7, 1, test_date());
        assert_eq!(frame.roll_id, 7);
        assert_eq!(frame.count, 1);
        assert_eq!(frame.no_of_exposures, 1);
        assert!(!frame.flash_used);
        assert!(frame.lens_id.is_none());
        assert!(frame.filter_ids.is_empty());
    }

    #[test]
    fn test_frame_serialization() {
        let mut frame = Frame::new(1, 3, test_date());
        frame.shutter = Some("1/125".to_string());
        frame.aperture = Some("5.6".to_string());
        frame.location = Some(Location::new(60.1699, 24.9384));
        frame.filter_ids.insert(2);

        let json = serde_json::to_string(&frame).unwrap();
        let deserialized: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, deserialized);
    }

    #[test]
    fn test_camera_serialization() {
        let mut camera = Camera::new("Contax", "T2");
        camera.lens = Some(Lens::new("Contax", "T2"));

        let json = serde_json::to_string(&camera).unwrap();
        let deserialized: Camera = serde_json::from_str(&json).unwrap();
        assert_eq!(camera, deserialized);
    }
}
