//! Database façade
//!
//! `Database` owns the single connection to the store and exposes every
//! read and write the application performs. Opening a file prepares it:
//! a missing store is created at the current version and seeded with the
//! film stock catalog, an old store is upgraded through the migration
//! history, and a store written by a newer release is refused.
//!
//! Writes that touch more than one table (frames with their filter links,
//! cameras with their fixed lens) run inside a transaction. Reads hydrate
//! link id sets one level deep; they never recurse further.
//!
//! A camera either owns one fixed lens or mounts interchangeable lenses,
//! never both. The fixed lens row lives in `lenses` but is excluded from
//! the standalone lens listing and is deleted together with its camera.

use std::collections::HashSet;
use std::mem;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{Camera, FilmStock, Filter, Frame, Lens, Roll};
use crate::storage::error::{DatabaseError, DatabaseResult};
use crate::storage::import;
use crate::storage::integrity;
use crate::storage::mappers::{
    camera_from_row, encode_aperture_values, film_stock_from_row, filter_from_row, format_datetime,
    frame_from_row, lens_from_row, roll_from_row, CameraRow, CAMERA_COLUMNS, FILM_STOCK_COLUMNS,
    FILTER_COLUMNS, FRAME_COLUMNS, LENS_COLUMNS, ROLL_COLUMNS,
};
use crate::storage::migrations::run_migrations;
use crate::storage::schema::{
    create_schema, schema_exists, schema_version, BASE_VERSION, DATABASE_VERSION,
};
use crate::storage::seed;

/// Selects which rolls a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollFilter {
    /// Rolls still in the shooting or development workflow
    #[default]
    Active,
    Archived,
    All,
}

/// Result of an insert-or-update write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Handle to an open film log store
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    // ==================== Opening ====================

    /// Open the store at the configured location, creating it if needed
    pub fn open(config: &Config) -> DatabaseResult<Self> {
        Self::open_at(&config.database_path())
    }

    /// Open the store at an explicit path, creating it if needed
    pub fn open_at(path: &Path) -> DatabaseResult<Self> {
        let conn = open_connection(path)?;
        let mut db = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        db.prepare()?;
        Ok(db)
    }

    /// Open a transient in-memory store; mainly for tests and previews
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Self { conn, path: None };
        db.prepare()?;
        Ok(db)
    }

    /// Bring the opened file to the current schema version
    fn prepare(&mut self) -> DatabaseResult<()> {
        let version = schema_version(&self.conn)?;
        if version > DATABASE_VERSION {
            return Err(DatabaseError::NewerSchema {
                found: version,
                supported: DATABASE_VERSION,
            });
        }
        if version == 0 && !schema_exists(&self.conn)? {
            info!("Creating new store at schema version {}", DATABASE_VERSION);
            create_schema(&self.conn)?;
            let report = seed::populate(&self.conn)?;
            info!("Seeded film stock catalog: {} entries", report.inserted);
            return Ok(());
        }
        if version < BASE_VERSION {
            return Err(DatabaseError::UnsupportedSchema { found: version });
        }
        if version < DATABASE_VERSION {
            run_migrations(&mut self.conn, version)?;
        }
        Ok(())
    }

    /// Schema version of the open store
    pub fn version(&self) -> DatabaseResult<i32> {
        Ok(schema_version(&self.conn)?)
    }

    /// Path of the backing file, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ==================== Rolls ====================

    /// Insert a roll; assigns `roll.id` and returns it
    pub fn add_roll(&mut self, roll: &mut Roll) -> DatabaseResult<i64> {
        self.conn.execute(
            "INSERT INTO rolls (roll_name, roll_date, roll_note, roll_iso, roll_push_pull, \
             roll_format, roll_archived, roll_unloaded, roll_developed, camera_id, film_stock_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                roll.name,
                format_datetime(&roll.date),
                roll.note,
                roll.iso,
                roll.push_pull,
                roll.format.code(),
                roll.archived,
                roll.unloaded.as_ref().map(format_datetime),
                roll.developed.as_ref().map(format_datetime),
                roll.camera_id,
                roll.film_stock_id,
            ],
        )?;
        roll.id = self.conn.last_insert_rowid();
        debug!("Added roll {} '{}'", roll.id, roll.name);
        Ok(roll.id)
    }

    /// Update a roll; returns the number of rows changed (0 or 1)
    pub fn update_roll(&mut self, roll: &Roll) -> DatabaseResult<usize> {
        let affected = self.conn.execute(
            "UPDATE rolls SET roll_name = ?1, roll_date = ?2, roll_note = ?3, roll_iso = ?4, \
             roll_push_pull = ?5, roll_format = ?6, roll_archived = ?7, roll_unloaded = ?8, \
             roll_developed = ?9, camera_id = ?10, film_stock_id = ?11 WHERE roll_id = ?12",
            params![
                roll.name,
                format_datetime(&roll.date),
                roll.note,
                roll.iso,
                roll.push_pull,
                roll.format.code(),
                roll.archived,
                roll.unloaded.as_ref().map(format_datetime),
                roll.developed.as_ref().map(format_datetime),
                roll.camera_id,
                roll.film_stock_id,
                roll.id,
            ],
        )?;
        Ok(affected)
    }

    /// Delete a roll and, via cascade, its frames
    pub fn delete_roll(&mut self, id: i64) -> DatabaseResult<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM rolls WHERE roll_id = ?", [id])?;
        Ok(affected)
    }

    pub fn get_roll(&self, id: i64) -> DatabaseResult<Option<Roll>> {
        let roll = self
            .conn
            .query_row(
                &format!("SELECT {ROLL_COLUMNS} FROM rolls WHERE roll_id = ?"),
                [id],
                |row| roll_from_row(row),
            )
            .optional()?;
        Ok(roll)
    }

    /// List rolls, newest first
    pub fn get_rolls(&self, filter: RollFilter) -> DatabaseResult<Vec<Roll>> {
        let where_clause = match filter {
            RollFilter::Active => " WHERE roll_archived = 0",
            RollFilter::Archived => " WHERE roll_archived = 1",
            RollFilter::All => "",
        };
        let sql =
            format!("SELECT {ROLL_COLUMNS} FROM rolls{where_clause} ORDER BY roll_date DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rolls = stmt
            .query_map([], |row| roll_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(rolls)
    }

    /// Number of frames exposed on a roll
    pub fn get_frame_count(&self, roll_id: i64) -> DatabaseResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM frames WHERE roll_id = ?",
            [roll_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ==================== Frames ====================

    /// Insert a frame and its filter links; assigns `frame.id` and returns it
    pub fn add_frame(&mut self, frame: &mut Frame) -> DatabaseResult<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO frames (roll_id, count, date, shutter, aperture, frame_note, location, \
             formatted_address, focal_length, exposure_comp, no_of_exposures, flash_used, \
             flash_power, flash_comp, metering_mode, light_source, picture_filename, lens_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                frame.roll_id,
                frame.count,
                format_datetime(&frame.date),
                frame.shutter,
                frame.aperture,
                frame.note,
                frame.location.as_ref().map(|l| l.to_string()),
                frame.formatted_address,
                frame.focal_length,
                frame.exposure_comp,
                frame.no_of_exposures,
                frame.flash_used,
                frame.flash_power,
                frame.flash_comp,
                frame.metering_mode,
                frame.light_source.code(),
                frame.picture_filename,
                frame.lens_id,
            ],
        )?;
        frame.id = tx.last_insert_rowid();
        insert_frame_filters(&tx, frame.id, &frame.filter_ids)?;
        tx.commit()?;
        Ok(frame.id)
    }

    /// Update a frame; its filter links are rewritten to match `filter_ids`
    pub fn update_frame(&mut self, frame: &Frame) -> DatabaseResult<usize> {
        let tx = self.conn.transaction()?;
        let affected = tx.execute(
            "UPDATE frames SET roll_id = ?1, count = ?2, date = ?3, shutter = ?4, aperture = ?5, \
             frame_note = ?6, location = ?7, formatted_address = ?8, focal_length = ?9, \
             exposure_comp = ?10, no_of_exposures = ?11, flash_used = ?12, flash_power = ?13, \
             flash_comp = ?14, metering_mode = ?15, light_source = ?16, picture_filename = ?17, \
             lens_id = ?18 WHERE frame_id = ?19",
            params![
                frame.roll_id,
                frame.count,
                format_datetime(&frame.date),
                frame.shutter,
                frame.aperture,
                frame.note,
                frame.location.as_ref().map(|l| l.to_string()),
                frame.formatted_address,
                frame.focal_length,
                frame.exposure_comp,
                frame.no_of_exposures,
                frame.flash_used,
                frame.flash_power,
                frame.flash_comp,
                frame.metering_mode,
                frame.light_source.code(),
                frame.picture_filename,
                frame.lens_id,
                frame.id,
            ],
        )?;
        if affected > 0 {
            tx.execute("DELETE FROM link_frame_filter WHERE frame_id = ?", [frame.id])?;
            insert_frame_filters(&tx, frame.id, &frame.filter_ids)?;
        }
        tx.commit()?;
        Ok(affected)
    }

    pub fn delete_frame(&mut self, id: i64) -> DatabaseResult<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM frames WHERE frame_id = ?", [id])?;
        Ok(affected)
    }

    /// List a roll's frames in shooting order
    pub fn get_frames(&self, roll_id: i64) -> DatabaseResult<Vec<Frame>> {
        let sql = format!("SELECT {FRAME_COLUMNS} FROM frames WHERE roll_id = ? ORDER BY count");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut frames = stmt
            .query_map([roll_id], |row| frame_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        for frame in &mut frames {
            frame.filter_ids = id_set(
                &self.conn,
                "SELECT filter_id FROM link_frame_filter WHERE frame_id = ?",
                frame.id,
            )?;
        }
        Ok(frames)
    }

    // ==================== Lenses ====================

    /// Insert a lens; assigns `lens.id` and returns it
    pub fn add_lens(&mut self, lens: &mut Lens) -> DatabaseResult<i64> {
        lens.id = insert_lens(&self.conn, lens)?;
        debug!("Added lens {} '{} {}'", lens.id, lens.make, lens.model);
        Ok(lens.id)
    }

    pub fn update_lens(&mut self, lens: &Lens) -> DatabaseResult<usize> {
        let affected = update_lens_row(&self.conn, lens)?;
        Ok(affected)
    }

    /// Insert or update depending on whether the lens row exists
    pub fn upsert_lens(&mut self, lens: &mut Lens) -> DatabaseResult<UpsertOutcome> {
        let outcome = upsert_lens_row(&self.conn, lens)?;
        Ok(outcome)
    }

    /// Delete a lens; frames referencing it keep their data with the lens cleared
    pub fn delete_lens(&mut self, id: i64) -> DatabaseResult<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM lenses WHERE lens_id = ?", [id])?;
        Ok(affected)
    }

    pub fn get_lens(&self, id: i64) -> DatabaseResult<Option<Lens>> {
        let lens = self
            .conn
            .query_row(
                &format!("SELECT {LENS_COLUMNS} FROM lenses WHERE lens_id = ?"),
                [id],
                |row| lens_from_row(row),
            )
            .optional()?;
        match lens {
            Some(mut lens) => {
                self.hydrate_lens(&mut lens)?;
                Ok(Some(lens))
            }
            None => Ok(None),
        }
    }

    /// List standalone lenses; fixed lenses owned by a camera are excluded
    pub fn get_lenses(&self) -> DatabaseResult<Vec<Lens>> {
        let sql = format!(
            "SELECT {LENS_COLUMNS} FROM lenses \
             WHERE lens_id NOT IN (SELECT lens_id FROM cameras WHERE lens_id IS NOT NULL) \
             ORDER BY lens_make COLLATE NOCASE, lens_model COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut lenses = stmt
            .query_map([], |row| lens_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        for lens in &mut lenses {
            self.hydrate_lens(lens)?;
        }
        Ok(lenses)
    }

    /// Whether any frame was shot with this lens
    pub fn is_lens_in_use(&self, id: i64) -> DatabaseResult<bool> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM frames WHERE lens_id = ?")?;
        Ok(stmt.exists([id])?)
    }

    fn hydrate_lens(&self, lens: &mut Lens) -> DatabaseResult<()> {
        lens.filter_ids = id_set(
            &self.conn,
            "SELECT filter_id FROM link_lens_filter WHERE lens_id = ?",
            lens.id,
        )?;
        lens.camera_ids = id_set(
            &self.conn,
            "SELECT camera_id FROM link_camera_lens WHERE lens_id = ?",
            lens.id,
        )?;
        Ok(())
    }

    // ==================== Cameras ====================

    /// Insert a camera; a fixed lens carried on the camera is inserted first
    ///
    /// Assigns `camera.id` (and the fixed lens id) and returns the camera id.
    pub fn add_camera(&mut self, camera: &mut Camera) -> DatabaseResult<i64> {
        let tx = self.conn.transaction()?;
        if let Some(lens) = camera.lens.as_mut() {
            if lens.id == 0 {
                lens.id = insert_lens(&tx, lens)?;
            }
        }
        tx.execute(
            "INSERT INTO cameras (camera_make, camera_model, camera_serial_no, \
             camera_min_shutter, camera_max_shutter, camera_shutter_increments, \
             camera_exposure_comp_increments, camera_format, lens_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                camera.make,
                camera.model,
                camera.serial_number,
                camera.min_shutter,
                camera.max_shutter,
                camera.shutter_increments.code(),
                camera.exposure_comp_increments.code(),
                camera.format.code(),
                camera.lens.as_ref().map(|l| l.id),
            ],
        )?;
        camera.id = tx.last_insert_rowid();
        tx.commit()?;
        debug!("Added camera {} '{} {}'", camera.id, camera.make, camera.model);
        Ok(camera.id)
    }

    /// Update a camera and reconcile its fixed lens
    ///
    /// Setting a fixed lens upserts the lens row and removes the camera's
    /// mountable lens links; clearing it deletes the now-orphaned lens row.
    pub fn update_camera(&mut self, camera: &mut Camera) -> DatabaseResult<usize> {
        let tx = self.conn.transaction()?;
        let previous = fixed_lens_id(&tx, camera.id)?;

        match camera.lens.as_mut() {
            Some(lens) => {
                upsert_lens_row(&tx, lens)?;
                // A fixed-lens camera cannot also have mountable lenses
                tx.execute(
                    "DELETE FROM link_camera_lens WHERE camera_id = ?",
                    [camera.id],
                )?;
            }
            None => {
                if let Some(orphan) = previous {
                    tx.execute("DELETE FROM lenses WHERE lens_id = ?", [orphan])?;
                }
            }
        }

        let affected = tx.execute(
            "UPDATE cameras SET camera_make = ?1, camera_model = ?2, camera_serial_no = ?3, \
             camera_min_shutter = ?4, camera_max_shutter = ?5, camera_shutter_increments = ?6, \
             camera_exposure_comp_increments = ?7, camera_format = ?8, lens_id = ?9 \
             WHERE camera_id = ?10",
            params![
                camera.make,
                camera.model,
                camera.serial_number,
                camera.min_shutter,
                camera.max_shutter,
                camera.shutter_increments.code(),
                camera.exposure_comp_increments.code(),
                camera.format.code(),
                camera.lens.as_ref().map(|l| l.id),
                camera.id,
            ],
        )?;
        tx.commit()?;
        Ok(affected)
    }

    /// Delete a camera together with its fixed lens, if it owns one
    ///
    /// Rolls shot in the camera keep their data with the camera cleared.
    pub fn delete_camera(&mut self, id: i64) -> DatabaseResult<usize> {
        let tx = self.conn.transaction()?;
        let fixed = fixed_lens_id(&tx, id)?;
        let affected = tx.execute("DELETE FROM cameras WHERE camera_id = ?", [id])?;
        if affected > 0 {
            if let Some(lens_id) = fixed {
                tx.execute("DELETE FROM lenses WHERE lens_id = ?", [lens_id])?;
            }
        }
        tx.commit()?;
        Ok(affected)
    }

    pub fn get_camera(&self, id: i64) -> DatabaseResult<Option<Camera>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {CAMERA_COLUMNS} FROM cameras WHERE camera_id = ?"),
                [id],
                |row| camera_from_row(row),
            )
            .optional()?;
        match row {
            Some(row) => Ok(Some(self.hydrate_camera(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_cameras(&self) -> DatabaseResult<Vec<Camera>> {
        let sql = format!(
            "SELECT {CAMERA_COLUMNS} FROM cameras \
             ORDER BY camera_make COLLATE NOCASE, camera_model COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| camera_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        let mut cameras = Vec::with_capacity(rows.len());
        for row in rows {
            cameras.push(self.hydrate_camera(row)?);
        }
        Ok(cameras)
    }

    /// Whether any roll was shot in this camera
    pub fn is_camera_in_use(&self, id: i64) -> DatabaseResult<bool> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM rolls WHERE camera_id = ?")?;
        Ok(stmt.exists([id])?)
    }

    fn hydrate_camera(&self, row: CameraRow) -> DatabaseResult<Camera> {
        let mut camera = row.camera;
        if let Some(lens_id) = row.lens_id {
            camera.lens = self.get_lens(lens_id)?;
        }
        camera.lens_ids = id_set(
            &self.conn,
            "SELECT lens_id FROM link_camera_lens WHERE camera_id = ?",
            camera.id,
        )?;
        Ok(camera)
    }

    // ==================== Filters ====================

    /// Insert a filter; assigns `filter.id` and returns it
    pub fn add_filter(&mut self, filter: &mut Filter) -> DatabaseResult<i64> {
        self.conn.execute(
            "INSERT INTO filters (filter_make, filter_model) VALUES (?1, ?2)",
            params![filter.make, filter.model],
        )?;
        filter.id = self.conn.last_insert_rowid();
        Ok(filter.id)
    }

    pub fn update_filter(&mut self, filter: &Filter) -> DatabaseResult<usize> {
        let affected = self.conn.execute(
            "UPDATE filters SET filter_make = ?1, filter_model = ?2 WHERE filter_id = ?3",
            params![filter.make, filter.model, filter.id],
        )?;
        Ok(affected)
    }

    pub fn delete_filter(&mut self, id: i64) -> DatabaseResult<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM filters WHERE filter_id = ?", [id])?;
        Ok(affected)
    }

    pub fn get_filter(&self, id: i64) -> DatabaseResult<Option<Filter>> {
        let filter = self
            .conn
            .query_row(
                &format!("SELECT {FILTER_COLUMNS} FROM filters WHERE filter_id = ?"),
                [id],
                |row| filter_from_row(row),
            )
            .optional()?;
        Ok(filter)
    }

    pub fn get_filters(&self) -> DatabaseResult<Vec<Filter>> {
        let sql = format!(
            "SELECT {FILTER_COLUMNS} FROM filters \
             ORDER BY filter_make COLLATE NOCASE, filter_model COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let filters = stmt
            .query_map([], |row| filter_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(filters)
    }

    /// Whether any frame was shot through this filter
    pub fn is_filter_in_use(&self, id: i64) -> DatabaseResult<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM link_frame_filter WHERE filter_id = ?")?;
        Ok(stmt.exists([id])?)
    }

    // ==================== Film stocks ====================

    /// Insert a film stock; assigns `stock.id` and returns it
    pub fn add_film_stock(&mut self, stock: &mut FilmStock) -> DatabaseResult<i64> {
        self.conn.execute(
            "INSERT INTO film_stocks (film_stock_make, film_stock_model, film_iso, film_type, \
             film_process, film_is_preadded) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stock.make,
                stock.model,
                stock.iso,
                stock.film_type.code(),
                stock.process.code(),
                stock.is_preadded,
            ],
        )?;
        stock.id = self.conn.last_insert_rowid();
        Ok(stock.id)
    }

    pub fn update_film_stock(&mut self, stock: &FilmStock) -> DatabaseResult<usize> {
        let affected = self.conn.execute(
            "UPDATE film_stocks SET film_stock_make = ?1, film_stock_model = ?2, film_iso = ?3, \
             film_type = ?4, film_process = ?5, film_is_preadded = ?6 WHERE film_stock_id = ?7",
            params![
                stock.make,
                stock.model,
                stock.iso,
                stock.film_type.code(),
                stock.process.code(),
                stock.is_preadded,
                stock.id,
            ],
        )?;
        Ok(affected)
    }

    /// Delete a film stock; rolls referencing it keep their data with the stock cleared
    pub fn delete_film_stock(&mut self, id: i64) -> DatabaseResult<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM film_stocks WHERE film_stock_id = ?", [id])?;
        Ok(affected)
    }

    pub fn get_film_stock(&self, id: i64) -> DatabaseResult<Option<FilmStock>> {
        let stock = self
            .conn
            .query_row(
                &format!("SELECT {FILM_STOCK_COLUMNS} FROM film_stocks WHERE film_stock_id = ?"),
                [id],
                |row| film_stock_from_row(row),
            )
            .optional()?;
        Ok(stock)
    }

    pub fn get_film_stocks(&self) -> DatabaseResult<Vec<FilmStock>> {
        let sql = format!(
            "SELECT {FILM_STOCK_COLUMNS} FROM film_stocks \
             ORDER BY film_stock_make COLLATE NOCASE, film_stock_model COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let stocks = stmt
            .query_map([], |row| film_stock_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(stocks)
    }

    /// Whether any roll was loaded with this film stock
    pub fn is_film_stock_in_use(&self, id: i64) -> DatabaseResult<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM rolls WHERE film_stock_id = ?")?;
        Ok(stmt.exists([id])?)
    }

    // ==================== Links ====================

    /// Record that a lens mounts on a camera; already-linked pairs are a no-op
    pub fn add_camera_lens_link(&mut self, camera_id: i64, lens_id: i64) -> DatabaseResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO link_camera_lens (camera_id, lens_id) VALUES (?1, ?2)",
            params![camera_id, lens_id],
        )?;
        Ok(())
    }

    pub fn delete_camera_lens_link(
        &mut self,
        camera_id: i64,
        lens_id: i64,
    ) -> DatabaseResult<usize> {
        let affected = self.conn.execute(
            "DELETE FROM link_camera_lens WHERE camera_id = ?1 AND lens_id = ?2",
            params![camera_id, lens_id],
        )?;
        Ok(affected)
    }

    /// Lenses mountable on a camera
    pub fn get_camera_lenses(&self, camera_id: i64) -> DatabaseResult<Vec<Lens>> {
        let sql = format!(
            "SELECT {LENS_COLUMNS} FROM lenses WHERE lens_id IN \
             (SELECT lens_id FROM link_camera_lens WHERE camera_id = ?) \
             ORDER BY lens_make COLLATE NOCASE, lens_model COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut lenses = stmt
            .query_map([camera_id], |row| lens_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        for lens in &mut lenses {
            self.hydrate_lens(lens)?;
        }
        Ok(lenses)
    }

    /// Cameras a lens mounts on
    pub fn get_lens_cameras(&self, lens_id: i64) -> DatabaseResult<Vec<Camera>> {
        let sql = format!(
            "SELECT {CAMERA_COLUMNS} FROM cameras WHERE camera_id IN \
             (SELECT camera_id FROM link_camera_lens WHERE lens_id = ?) \
             ORDER BY camera_make COLLATE NOCASE, camera_model COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([lens_id], |row| camera_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        let mut cameras = Vec::with_capacity(rows.len());
        for row in rows {
            cameras.push(self.hydrate_camera(row)?);
        }
        Ok(cameras)
    }

    /// Record that a filter mounts on a lens; already-linked pairs are a no-op
    pub fn add_lens_filter_link(&mut self, lens_id: i64, filter_id: i64) -> DatabaseResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO link_lens_filter (lens_id, filter_id) VALUES (?1, ?2)",
            params![lens_id, filter_id],
        )?;
        Ok(())
    }

    pub fn delete_lens_filter_link(
        &mut self,
        lens_id: i64,
        filter_id: i64,
    ) -> DatabaseResult<usize> {
        let affected = self.conn.execute(
            "DELETE FROM link_lens_filter WHERE lens_id = ?1 AND filter_id = ?2",
            params![lens_id, filter_id],
        )?;
        Ok(affected)
    }

    /// Filters mountable on a lens
    pub fn get_lens_filters(&self, lens_id: i64) -> DatabaseResult<Vec<Filter>> {
        let sql = format!(
            "SELECT {FILTER_COLUMNS} FROM filters WHERE filter_id IN \
             (SELECT filter_id FROM link_lens_filter WHERE lens_id = ?) \
             ORDER BY filter_make COLLATE NOCASE, filter_model COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let filters = stmt
            .query_map([lens_id], |row| filter_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(filters)
    }

    /// Lenses a filter mounts on
    pub fn get_filter_lenses(&self, filter_id: i64) -> DatabaseResult<Vec<Lens>> {
        let sql = format!(
            "SELECT {LENS_COLUMNS} FROM lenses WHERE lens_id IN \
             (SELECT lens_id FROM link_lens_filter WHERE filter_id = ?) \
             ORDER BY lens_make COLLATE NOCASE, lens_model COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut lenses = stmt
            .query_map([filter_id], |row| lens_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        for lens in &mut lenses {
            self.hydrate_lens(lens)?;
        }
        Ok(lenses)
    }

    /// Record a filter used on a frame; already-linked pairs are a no-op
    pub fn add_frame_filter_link(&mut self, frame_id: i64, filter_id: i64) -> DatabaseResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO link_frame_filter (frame_id, filter_id) VALUES (?1, ?2)",
            params![frame_id, filter_id],
        )?;
        Ok(())
    }

    pub fn delete_frame_filter_link(
        &mut self,
        frame_id: i64,
        filter_id: i64,
    ) -> DatabaseResult<usize> {
        let affected = self.conn.execute(
            "DELETE FROM link_frame_filter WHERE frame_id = ?1 AND filter_id = ?2",
            params![frame_id, filter_id],
        )?;
        Ok(affected)
    }

    /// Filters used on a frame
    pub fn get_frame_filters(&self, frame_id: i64) -> DatabaseResult<Vec<Filter>> {
        let sql = format!(
            "SELECT {FILTER_COLUMNS} FROM filters WHERE filter_id IN \
             (SELECT filter_id FROM link_frame_filter WHERE frame_id = ?) \
             ORDER BY filter_make COLLATE NOCASE, filter_model COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let filters = stmt
            .query_map([frame_id], |row| filter_from_row(row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(filters)
    }

    // ==================== Import ====================

    /// Replace the store with another database file
    ///
    /// The current file is copied to a `.bak` sibling before the candidate
    /// is swapped in. A candidate that fails to open, fails the consistency
    /// check, cannot be upgraded, or does not match the expected schema is
    /// rolled back; the previous store is restored and stays usable. On
    /// success the backup is left on disk.
    pub fn import_file(&mut self, source: &Path) -> DatabaseResult<()> {
        let live = match &self.path {
            Some(path) => path.clone(),
            None => return Err(DatabaseError::InMemoryImport),
        };
        let backup = import::backup_path(&live);
        info!("Importing database file '{}'", source.display());

        self.close_connection()?;

        if let Err(stage_err) = import::stage(&live, &backup, source) {
            // The live file was not replaced; just reopen
            self.conn = open_connection(&live)?;
            return Err(stage_err);
        }

        match open_verified(&live, source) {
            Ok(conn) => {
                self.conn = conn;
                info!("Import complete; backup kept at '{}'", backup.display());
                Ok(())
            }
            Err(err) => {
                warn!("Import of '{}' rejected: {}", source.display(), err);
                import::restore(&live, &backup)?;
                self.conn = open_connection(&live)?;
                Err(err)
            }
        }
    }

    /// Close the owned connection, parking a transient one in its place
    fn close_connection(&mut self) -> DatabaseResult<()> {
        let conn = mem::replace(&mut self.conn, Connection::open_in_memory()?);
        if let Err((conn, err)) = conn.close() {
            self.conn = conn;
            return Err(err.into());
        }
        Ok(())
    }
}

// ==================== Connection helpers ====================

fn open_connection(path: &Path) -> DatabaseResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Open an imported candidate and verify it end to end
///
/// `reported` is the path named in errors: the file the user handed us,
/// not the live path it was staged to.
fn open_verified(live: &Path, reported: &Path) -> DatabaseResult<Connection> {
    let mut conn = open_connection(live)?;

    let version =
        schema_version(&conn).map_err(|e| classify_candidate_error(e, reported))?;
    if !integrity::quick_check_ok(&conn).map_err(|e| classify_candidate_error(e, reported))? {
        return Err(DatabaseError::CorruptImport {
            path: reported.to_path_buf(),
            details: "consistency check failed".to_string(),
        });
    }
    if version > DATABASE_VERSION {
        return Err(DatabaseError::NewerSchema {
            found: version,
            supported: DATABASE_VERSION,
        });
    }
    if version < BASE_VERSION {
        return Err(DatabaseError::IncompatibleImport {
            path: reported.to_path_buf(),
            details: format!("schema version {version} predates the supported baseline"),
        });
    }
    if version < DATABASE_VERSION {
        if let Err(e) = run_migrations(&mut conn, version) {
            return Err(if import::is_corruption(&e) {
                DatabaseError::CorruptImport {
                    path: reported.to_path_buf(),
                    details: e.to_string(),
                }
            } else {
                DatabaseError::IncompatibleImport {
                    path: reported.to_path_buf(),
                    details: format!("upgrade failed: {e}"),
                }
            });
        }
    }
    if !integrity::verify_schema(&conn).map_err(|e| classify_candidate_error(e, reported))? {
        return Err(DatabaseError::IncompatibleImport {
            path: reported.to_path_buf(),
            details: "schema does not match the expected table structure".to_string(),
        });
    }
    Ok(conn)
}

fn classify_candidate_error(error: rusqlite::Error, reported: &Path) -> DatabaseError {
    if import::is_corruption(&error) {
        DatabaseError::CorruptImport {
            path: reported.to_path_buf(),
            details: error.to_string(),
        }
    } else {
        error.into()
    }
}

// ==================== Row helpers ====================

fn id_set(conn: &Connection, sql: &str, id: i64) -> DatabaseResult<HashSet<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<Result<HashSet<i64>, rusqlite::Error>>()?;
    Ok(ids)
}

fn insert_frame_filters(
    conn: &Connection,
    frame_id: i64,
    filter_ids: &HashSet<i64>,
) -> rusqlite::Result<()> {
    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO link_frame_filter (frame_id, filter_id) VALUES (?1, ?2)")?;
    for filter_id in filter_ids {
        stmt.execute(params![frame_id, filter_id])?;
    }
    Ok(())
}

fn insert_lens(conn: &Connection, lens: &Lens) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO lenses (lens_make, lens_model, lens_serial_no, lens_min_aperture, \
         lens_max_aperture, lens_min_focal_length, lens_max_focal_length, \
         lens_aperture_increments, lens_custom_aperture_values) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            lens.make,
            lens.model,
            lens.serial_number,
            lens.min_aperture,
            lens.max_aperture,
            lens.min_focal_length,
            lens.max_focal_length,
            lens.aperture_increments.code(),
            encode_aperture_values(&lens.custom_aperture_values),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_lens_row(conn: &Connection, lens: &Lens) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE lenses SET lens_make = ?1, lens_model = ?2, lens_serial_no = ?3, \
         lens_min_aperture = ?4, lens_max_aperture = ?5, lens_min_focal_length = ?6, \
         lens_max_focal_length = ?7, lens_aperture_increments = ?8, \
         lens_custom_aperture_values = ?9 WHERE lens_id = ?10",
        params![
            lens.make,
            lens.model,
            lens.serial_number,
            lens.min_aperture,
            lens.max_aperture,
            lens.min_focal_length,
            lens.max_focal_length,
            lens.aperture_increments.code(),
            encode_aperture_values(&lens.custom_aperture_values),
            lens.id,
        ],
    )
}

/// Update the lens row if it exists, insert it otherwise
///
/// A lens carrying a stale id from another store gets a fresh one.
fn upsert_lens_row(conn: &Connection, lens: &mut Lens) -> rusqlite::Result<UpsertOutcome> {
    if lens.id > 0 && update_lens_row(conn, lens)? > 0 {
        return Ok(UpsertOutcome::Updated);
    }
    lens.id = insert_lens(conn, lens)?;
    Ok(UpsertOutcome::Inserted)
}

fn fixed_lens_id(conn: &Connection, camera_id: i64) -> rusqlite::Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT lens_id FROM cameras WHERE camera_id = ?",
            [camera_id],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?;
    Ok(id.flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilmFormat, FilmProcess, FilmType, Increments, LightSource, Location};
    use crate::storage::migrations::testutil;
    use crate::storage::seed::{parse_catalog, CATALOG};
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::TempDir;

    fn memory_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn date(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn test_date() -> NaiveDateTime {
        date(2024, 5, 12, 14, 30)
    }

    // ==================== Opening ====================

    #[test]
    fn test_fresh_store_is_seeded() {
        let db = memory_db();
        assert_eq!(db.version().unwrap(), DATABASE_VERSION);

        let stocks = db.get_film_stocks().unwrap();
        let catalog = parse_catalog(CATALOG);
        assert_eq!(stocks.len(), catalog.records.len());
        assert!(stocks.len() >= 40);
        assert!(stocks.iter().all(|s| s.is_preadded));
    }

    #[test]
    fn test_open_at_creates_file_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("filmlog.db");

        {
            let mut db = Database::open_at(&path).unwrap();
            assert_eq!(db.path(), Some(path.as_path()));
            let mut roll = Roll::new("persisted", test_date());
            db.add_roll(&mut roll).unwrap();
        }
        assert!(path.exists());

        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.version().unwrap(), DATABASE_VERSION);
        let rolls = db.get_rolls(RollFilter::All).unwrap();
        assert_eq!(rolls.len(), 1);
        assert_eq!(rolls[0].name, "persisted");

        // Reopening does not duplicate the seeded catalog
        let catalog = parse_catalog(CATALOG);
        assert_eq!(db.get_film_stocks().unwrap().len(), catalog.records.len());
    }

    #[test]
    fn test_open_from_config() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            database_file: None,
        };

        let db = Database::open(&config).unwrap();
        assert_eq!(db.version().unwrap(), DATABASE_VERSION);
        assert!(dir.path().join("filmlog.db").exists());
    }

    #[test]
    fn test_open_rejects_newer_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 99).unwrap();
        }

        let err = Database::open_at(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::NewerSchema { found: 99, .. }));
    }

    #[test]
    fn test_open_rejects_pre_baseline_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ancient.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE rolls (roll_id INTEGER PRIMARY KEY)", [])
                .unwrap();
            conn.pragma_update(None, "user_version", 5).unwrap();
        }

        let err = Database::open_at(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::UnsupportedSchema { found: 5 }));
    }

    #[test]
    fn test_open_migrates_old_file_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            testutil::create_v13_store(&conn);
            testutil::populate_v13_store(&conn);
        }

        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.version().unwrap(), DATABASE_VERSION);
        let rolls = db.get_rolls(RollFilter::All).unwrap();
        assert_eq!(rolls.len(), 2);
    }

    // ==================== Rolls ====================

    #[test]
    fn test_add_roll_assigns_ids() {
        let mut db = memory_db();
        let mut first = Roll::new("one", test_date());
        let mut second = Roll::new("two", test_date());

        let first_id = db.add_roll(&mut first).unwrap();
        let second_id = db.add_roll(&mut second).unwrap();

        assert!(first_id > 0);
        assert_eq!(first.id, first_id);
        assert_ne!(first_id, second_id);
    }

    #[test]
    fn test_roll_round_trip() {
        let mut db = memory_db();
        let mut camera = Camera::new("Leica", "M6");
        db.add_camera(&mut camera).unwrap();
        let mut stock = FilmStock::new("Kodak", "Portra 160", 160);
        db.add_film_stock(&mut stock).unwrap();

        let mut roll = Roll::new("Paris", date(2024, 6, 1, 8, 0));
        roll.note = Some("pushed one stop".to_string());
        roll.iso = 320;
        roll.push_pull = Some("+1".to_string());
        roll.format = FilmFormat::Format120;
        roll.unloaded = Some(date(2024, 6, 10, 17, 0));
        roll.developed = Some(date(2024, 6, 15, 12, 0));
        roll.camera_id = Some(camera.id);
        roll.film_stock_id = Some(stock.id);
        db.add_roll(&mut roll).unwrap();

        let fetched = db.get_roll(roll.id).unwrap().unwrap();
        assert_eq!(fetched, roll);
    }

    #[test]
    fn test_get_rolls_filters_and_orders() {
        let mut db = memory_db();
        let mut january = Roll::new("january", date(2024, 1, 1, 10, 0));
        let mut february = Roll::new("february", date(2024, 2, 1, 10, 0));
        let mut march = Roll::new("march", date(2024, 3, 1, 10, 0));
        march.archived = true;
        db.add_roll(&mut january).unwrap();
        db.add_roll(&mut february).unwrap();
        db.add_roll(&mut march).unwrap();

        let active: Vec<String> = db
            .get_rolls(RollFilter::Active)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(active, ["february", "january"]);

        let archived: Vec<String> = db
            .get_rolls(RollFilter::Archived)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(archived, ["march"]);

        let all: Vec<String> = db
            .get_rolls(RollFilter::All)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(all, ["march", "february", "january"]);
    }

    #[test]
    fn test_update_roll_affected_rows() {
        let mut db = memory_db();
        let mut roll = Roll::new("before", test_date());
        db.add_roll(&mut roll).unwrap();

        roll.name = "after".to_string();
        roll.archived = true;
        assert_eq!(db.update_roll(&roll).unwrap(), 1);

        let fetched = db.get_roll(roll.id).unwrap().unwrap();
        assert_eq!(fetched.name, "after");
        assert!(fetched.archived);

        let mut missing = Roll::new("ghost", test_date());
        missing.id = 9999;
        assert_eq!(db.update_roll(&missing).unwrap(), 0);
    }

    #[test]
    fn test_delete_roll_cascades_to_frames() {
        let mut db = memory_db();
        let mut roll = Roll::new("doomed", test_date());
        db.add_roll(&mut roll).unwrap();
        for count in 1..=3 {
            let mut frame = Frame::new(roll.id, count, test_date());
            db.add_frame(&mut frame).unwrap();
        }
        assert_eq!(db.get_frame_count(roll.id).unwrap(), 3);

        assert_eq!(db.delete_roll(roll.id).unwrap(), 1);
        assert!(db.get_roll(roll.id).unwrap().is_none());
        assert_eq!(db.get_frame_count(roll.id).unwrap(), 0);
        assert!(db.get_frames(roll.id).unwrap().is_empty());

        assert_eq!(db.delete_roll(roll.id).unwrap(), 0);
    }

    // ==================== Frames ====================

    #[test]
    fn test_frame_round_trip() {
        let mut db = memory_db();
        let mut roll = Roll::new("detail", test_date());
        db.add_roll(&mut roll).unwrap();
        let mut lens = Lens::new("Canon", "FD 50mm f/1.4");
        db.add_lens(&mut lens).unwrap();
        let mut filter = Filter::new("Hoya", "Yellow K2");
        db.add_filter(&mut filter).unwrap();

        let mut frame = Frame::new(roll.id, 1, date(2024, 5, 12, 15, 45));
        frame.shutter = Some("1/60".to_string());
        frame.aperture = Some("8".to_string());
        frame.note = Some("backlit portrait".to_string());
        frame.location = Some(Location::new(60.1699, 24.9384));
        frame.formatted_address = Some("Helsinki".to_string());
        frame.focal_length = 50;
        frame.exposure_comp = Some("-2/3".to_string());
        frame.no_of_exposures = 2;
        frame.flash_used = true;
        frame.flash_power = Some("1/2".to_string());
        frame.flash_comp = Some("+1".to_string());
        frame.metering_mode = 1;
        frame.light_source = LightSource::Tungsten;
        frame.picture_filename = Some("scan_0001.jpg".to_string());
        frame.lens_id = Some(lens.id);
        frame.filter_ids.insert(filter.id);
        db.add_frame(&mut frame).unwrap();
        assert!(frame.id > 0);

        let frames = db.get_frames(roll.id).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], frame);

        let filters = db.get_frame_filters(frame.id).unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].model, "Yellow K2");
    }

    #[test]
    fn test_frames_ordered_by_count() {
        let mut db = memory_db();
        let mut roll = Roll::new("order", test_date());
        db.add_roll(&mut roll).unwrap();
        for count in [3, 1, 2] {
            let mut frame = Frame::new(roll.id, count, test_date());
            db.add_frame(&mut frame).unwrap();
        }

        let counts: Vec<i32> = db
            .get_frames(roll.id)
            .unwrap()
            .into_iter()
            .map(|f| f.count)
            .collect();
        assert_eq!(counts, [1, 2, 3]);
    }

    #[test]
    fn test_update_frame_rewrites_filter_links() {
        let mut db = memory_db();
        let mut roll = Roll::new("filters", test_date());
        db.add_roll(&mut roll).unwrap();
        let mut yellow = Filter::new("Hoya", "Yellow K2");
        let mut red = Filter::new("Hoya", "Red 25A");
        db.add_filter(&mut yellow).unwrap();
        db.add_filter(&mut red).unwrap();

        let mut frame = Frame::new(roll.id, 1, test_date());
        frame.filter_ids.insert(yellow.id);
        db.add_frame(&mut frame).unwrap();

        frame.filter_ids.clear();
        frame.filter_ids.insert(red.id);
        assert_eq!(db.update_frame(&frame).unwrap(), 1);

        let filters = db.get_frame_filters(frame.id).unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].model, "Red 25A");
    }

    #[test]
    fn test_delete_frame() {
        let mut db = memory_db();
        let mut roll = Roll::new("r", test_date());
        db.add_roll(&mut roll).unwrap();
        let mut frame = Frame::new(roll.id, 1, test_date());
        db.add_frame(&mut frame).unwrap();

        assert_eq!(db.delete_frame(frame.id).unwrap(), 1);
        assert!(db.get_frames(roll.id).unwrap().is_empty());
        assert_eq!(db.delete_frame(frame.id).unwrap(), 0);
    }

    #[test]
    fn test_deleting_lens_clears_frame_reference() {
        let mut db = memory_db();
        let mut roll = Roll::new("r", test_date());
        db.add_roll(&mut roll).unwrap();
        let mut lens = Lens::new("Canon", "FD 50mm");
        db.add_lens(&mut lens).unwrap();
        let mut frame = Frame::new(roll.id, 1, test_date());
        frame.lens_id = Some(lens.id);
        db.add_frame(&mut frame).unwrap();

        assert_eq!(db.delete_lens(lens.id).unwrap(), 1);

        let frames = db.get_frames(roll.id).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].lens_id.is_none());
    }

    #[test]
    fn test_deleting_filter_clears_frame_links() {
        let mut db = memory_db();
        let mut roll = Roll::new("r", test_date());
        db.add_roll(&mut roll).unwrap();
        let mut filter = Filter::new("B+W", "ND 3.0");
        db.add_filter(&mut filter).unwrap();
        let mut frame = Frame::new(roll.id, 1, test_date());
        frame.filter_ids.insert(filter.id);
        db.add_frame(&mut frame).unwrap();

        assert_eq!(db.delete_filter(filter.id).unwrap(), 1);

        let frames = db.get_frames(roll.id).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].filter_ids.is_empty());
    }

    // ==================== Lenses ====================

    #[test]
    fn test_lens_round_trip() {
        let mut db = memory_db();
        let mut lens = Lens::new("Nikon", "Nikkor 105mm f/2.5");
        lens.serial_number = Some("870412".to_string());
        lens.min_aperture = Some("2.5".to_string());
        lens.max_aperture = Some("22".to_string());
        lens.min_focal_length = 105;
        lens.max_focal_length = 105;
        lens.aperture_increments = Increments::Half;
        lens.custom_aperture_values = vec![2.5, 3.4, 4.8];
        db.add_lens(&mut lens).unwrap();

        let fetched = db.get_lens(lens.id).unwrap().unwrap();
        assert_eq!(fetched, lens);
    }

    #[test]
    fn test_update_lens_affected_rows() {
        let mut db = memory_db();
        let mut lens = Lens::new("Nikon", "50mm f/1.8");
        db.add_lens(&mut lens).unwrap();

        lens.serial_number = Some("123".to_string());
        assert_eq!(db.update_lens(&lens).unwrap(), 1);
        assert_eq!(
            db.get_lens(lens.id)
                .unwrap()
                .unwrap()
                .serial_number
                .as_deref(),
            Some("123")
        );

        let mut missing = Lens::new("none", "none");
        missing.id = 9999;
        assert_eq!(db.update_lens(&missing).unwrap(), 0);
    }

    #[test]
    fn test_upsert_lens_outcomes() {
        let mut db = memory_db();
        let mut lens = Lens::new("Nikon", "50mm f/1.8");

        assert_eq!(db.upsert_lens(&mut lens).unwrap(), UpsertOutcome::Inserted);
        assert!(lens.id > 0);

        lens.min_aperture = Some("1.8".to_string());
        assert_eq!(db.upsert_lens(&mut lens).unwrap(), UpsertOutcome::Updated);
        assert_eq!(
            db.get_lens(lens.id).unwrap().unwrap().min_aperture.as_deref(),
            Some("1.8")
        );

        // A stale id from elsewhere falls back to insert with a fresh id
        let mut stale = Lens::new("Zeiss", "Planar 50mm");
        stale.id = 9999;
        assert_eq!(db.upsert_lens(&mut stale).unwrap(), UpsertOutcome::Inserted);
        assert_ne!(stale.id, 9999);
        assert!(db.get_lens(stale.id).unwrap().is_some());
    }

    #[test]
    fn test_get_lenses_sorted_case_insensitively() {
        let mut db = memory_db();
        for (make, model) in [("nikon", "b"), ("Canon", "a"), ("NIKON", "a")] {
            let mut lens = Lens::new(make, model);
            db.add_lens(&mut lens).unwrap();
        }

        let makes: Vec<String> = db
            .get_lenses()
            .unwrap()
            .into_iter()
            .map(|l| format!("{} {}", l.make, l.model))
            .collect();
        assert_eq!(makes, ["Canon a", "NIKON a", "nikon b"]);
    }

    #[test]
    fn test_lens_hydrates_link_sets() {
        let mut db = memory_db();
        let mut lens = Lens::new("Canon", "FD 50mm");
        db.add_lens(&mut lens).unwrap();
        let mut camera = Camera::new("Canon", "AE-1");
        db.add_camera(&mut camera).unwrap();
        let mut filter = Filter::new("Hoya", "UV");
        db.add_filter(&mut filter).unwrap();

        db.add_camera_lens_link(camera.id, lens.id).unwrap();
        db.add_lens_filter_link(lens.id, filter.id).unwrap();

        let fetched = db.get_lens(lens.id).unwrap().unwrap();
        assert!(fetched.camera_ids.contains(&camera.id));
        assert!(fetched.filter_ids.contains(&filter.id));
    }

    // ==================== Cameras ====================

    #[test]
    fn test_camera_round_trip() {
        let mut db = memory_db();
        let mut camera = Camera::new("Nikon", "FM2");
        camera.serial_number = Some("N8008".to_string());
        camera.min_shutter = Some("1".to_string());
        camera.max_shutter = Some("1/4000".to_string());
        camera.shutter_increments = Increments::Full;
        camera.format = FilmFormat::Format135;
        db.add_camera(&mut camera).unwrap();

        let fetched = db.get_camera(camera.id).unwrap().unwrap();
        assert_eq!(fetched, camera);
    }

    #[test]
    fn test_camera_delete_clears_roll_reference() {
        let mut db = memory_db();
        let mut camera = Camera::new("Nikon", "FM2");
        db.add_camera(&mut camera).unwrap();
        let mut roll = Roll::new("FM2 roll", test_date());
        roll.camera_id = Some(camera.id);
        db.add_roll(&mut roll).unwrap();

        assert_eq!(db.delete_camera(camera.id).unwrap(), 1);

        let fetched = db.get_roll(roll.id).unwrap().unwrap();
        assert!(fetched.camera_id.is_none());
        assert!(db.get_camera(camera.id).unwrap().is_none());
    }

    #[test]
    fn test_fixed_lens_camera_add_and_get() {
        let mut db = memory_db();
        let mut camera = Camera::new("Contax", "T2");
        camera.lens = Some(Lens::new("Contax", "Sonnar 38mm f/2.8"));
        db.add_camera(&mut camera).unwrap();

        let lens_id = camera.lens.as_ref().unwrap().id;
        assert!(lens_id > 0);

        let fetched = db.get_camera(camera.id).unwrap().unwrap();
        let fixed = fetched.lens.as_ref().unwrap();
        assert_eq!(fixed.id, lens_id);
        assert_eq!(fixed.model, "Sonnar 38mm f/2.8");

        // The fixed lens is not listed among standalone lenses
        assert!(db.get_lenses().unwrap().iter().all(|l| l.id != lens_id));
    }

    #[test]
    fn test_setting_fixed_lens_purges_mountable_links() {
        let mut db = memory_db();
        let mut camera = Camera::new("Mamiya", "RB67");
        db.add_camera(&mut camera).unwrap();
        let mut lens = Lens::new("Mamiya", "Sekor 90mm");
        db.add_lens(&mut lens).unwrap();
        db.add_camera_lens_link(camera.id, lens.id).unwrap();
        assert_eq!(db.get_camera_lenses(camera.id).unwrap().len(), 1);

        camera.lens = Some(Lens::new("Mamiya", "built-in test lens"));
        assert_eq!(db.update_camera(&mut camera).unwrap(), 1);

        assert!(db.get_camera_lenses(camera.id).unwrap().is_empty());
        // The formerly mountable lens still exists on its own
        assert!(db.get_lens(lens.id).unwrap().is_some());
    }

    #[test]
    fn test_clearing_fixed_lens_deletes_orphan_row() {
        let mut db = memory_db();
        let mut camera = Camera::new("Contax", "T2");
        camera.lens = Some(Lens::new("Contax", "Sonnar 38mm f/2.8"));
        db.add_camera(&mut camera).unwrap();
        let lens_id = camera.lens.as_ref().unwrap().id;

        camera.lens = None;
        assert_eq!(db.update_camera(&mut camera).unwrap(), 1);

        assert!(db.get_lens(lens_id).unwrap().is_none());
        assert!(db.get_camera(camera.id).unwrap().unwrap().lens.is_none());
    }

    #[test]
    fn test_delete_camera_removes_fixed_lens() {
        let mut db = memory_db();
        let mut camera = Camera::new("Olympus", "XA");
        camera.lens = Some(Lens::new("Olympus", "F.Zuiko 35mm f/2.8"));
        db.add_camera(&mut camera).unwrap();
        let lens_id = camera.lens.as_ref().unwrap().id;

        assert_eq!(db.delete_camera(camera.id).unwrap(), 1);
        assert!(db.get_lens(lens_id).unwrap().is_none());
    }

    // ==================== Film stocks and filters ====================

    #[test]
    fn test_film_stock_round_trip() {
        let mut db = memory_db();
        let mut stock = FilmStock::new("Fuji", "Acros II", 100);
        stock.film_type = FilmType::BwNegative;
        stock.process = FilmProcess::Bw;
        db.add_film_stock(&mut stock).unwrap();

        let fetched = db.get_film_stock(stock.id).unwrap().unwrap();
        assert_eq!(fetched, stock);
        assert!(!fetched.is_preadded);

        stock.iso = 200;
        assert_eq!(db.update_film_stock(&stock).unwrap(), 1);
        assert_eq!(db.get_film_stock(stock.id).unwrap().unwrap().iso, 200);

        assert_eq!(db.delete_film_stock(stock.id).unwrap(), 1);
        assert!(db.get_film_stock(stock.id).unwrap().is_none());
    }

    #[test]
    fn test_deleting_film_stock_clears_roll_reference() {
        let mut db = memory_db();
        let mut stock = FilmStock::new("Kodak", "Gold 200", 200);
        db.add_film_stock(&mut stock).unwrap();
        let mut roll = Roll::new("gold", test_date());
        roll.film_stock_id = Some(stock.id);
        db.add_roll(&mut roll).unwrap();

        db.delete_film_stock(stock.id).unwrap();

        let fetched = db.get_roll(roll.id).unwrap().unwrap();
        assert!(fetched.film_stock_id.is_none());
    }

    #[test]
    fn test_filter_round_trip() {
        let mut db = memory_db();
        let mut filter = Filter::new("B+W", "ND 3.0");
        db.add_filter(&mut filter).unwrap();

        let fetched = db.get_filter(filter.id).unwrap().unwrap();
        assert_eq!(fetched, filter);

        filter.model = "ND 1.8".to_string();
        assert_eq!(db.update_filter(&filter).unwrap(), 1);
        assert_eq!(db.get_filters().unwrap()[0].model, "ND 1.8");

        assert_eq!(db.delete_filter(filter.id).unwrap(), 1);
        assert!(db.get_filters().unwrap().is_empty());
    }

    #[test]
    fn test_in_use_predicates() {
        let mut db = memory_db();
        let mut camera = Camera::new("Nikon", "F3");
        db.add_camera(&mut camera).unwrap();
        let mut lens = Lens::new("Nikon", "50mm");
        db.add_lens(&mut lens).unwrap();
        let mut stock = FilmStock::new("Kodak", "Tri-X 320", 320);
        db.add_film_stock(&mut stock).unwrap();
        let mut filter = Filter::new("Hoya", "Orange G");
        db.add_filter(&mut filter).unwrap();

        assert!(!db.is_camera_in_use(camera.id).unwrap());
        assert!(!db.is_lens_in_use(lens.id).unwrap());
        assert!(!db.is_film_stock_in_use(stock.id).unwrap());
        assert!(!db.is_filter_in_use(filter.id).unwrap());

        let mut roll = Roll::new("r", test_date());
        roll.camera_id = Some(camera.id);
        roll.film_stock_id = Some(stock.id);
        db.add_roll(&mut roll).unwrap();
        let mut frame = Frame::new(roll.id, 1, test_date());
        frame.lens_id = Some(lens.id);
        frame.filter_ids.insert(filter.id);
        db.add_frame(&mut frame).unwrap();

        assert!(db.is_camera_in_use(camera.id).unwrap());
        assert!(db.is_lens_in_use(lens.id).unwrap());
        assert!(db.is_film_stock_in_use(stock.id).unwrap());
        assert!(db.is_filter_in_use(filter.id).unwrap());
    }

    // ==================== Links ====================

    #[test]
    fn test_camera_lens_links_idempotent() {
        let mut db = memory_db();
        let mut camera = Camera::new("Canon", "A-1");
        db.add_camera(&mut camera).unwrap();
        let mut lens = Lens::new("Canon", "FD 35mm");
        db.add_lens(&mut lens).unwrap();

        db.add_camera_lens_link(camera.id, lens.id).unwrap();
        db.add_camera_lens_link(camera.id, lens.id).unwrap();

        assert_eq!(db.get_camera_lenses(camera.id).unwrap().len(), 1);
        assert_eq!(db.get_lens_cameras(lens.id).unwrap().len(), 1);

        assert_eq!(db.delete_camera_lens_link(camera.id, lens.id).unwrap(), 1);
        assert_eq!(db.delete_camera_lens_link(camera.id, lens.id).unwrap(), 0);
        assert!(db.get_camera_lenses(camera.id).unwrap().is_empty());
    }

    #[test]
    fn test_lens_filter_links_both_directions() {
        let mut db = memory_db();
        let mut lens = Lens::new("Pentax", "SMC 50mm");
        db.add_lens(&mut lens).unwrap();
        let mut filter = Filter::new("Marumi", "CPL");
        db.add_filter(&mut filter).unwrap();

        db.add_lens_filter_link(lens.id, filter.id).unwrap();

        let filters = db.get_lens_filters(lens.id).unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].id, filter.id);

        let lenses = db.get_filter_lenses(filter.id).unwrap();
        assert_eq!(lenses.len(), 1);
        assert_eq!(lenses[0].id, lens.id);

        assert_eq!(db.delete_lens_filter_link(lens.id, filter.id).unwrap(), 1);
        assert!(db.get_lens_filters(lens.id).unwrap().is_empty());
    }

    #[test]
    fn test_frame_filter_links_direct() {
        let mut db = memory_db();
        let mut roll = Roll::new("r", test_date());
        db.add_roll(&mut roll).unwrap();
        let mut frame = Frame::new(roll.id, 1, test_date());
        db.add_frame(&mut frame).unwrap();
        let mut filter = Filter::new("Hoya", "Green X1");
        db.add_filter(&mut filter).unwrap();

        db.add_frame_filter_link(frame.id, filter.id).unwrap();
        db.add_frame_filter_link(frame.id, filter.id).unwrap();
        assert_eq!(db.get_frame_filters(frame.id).unwrap().len(), 1);

        assert_eq!(db.delete_frame_filter_link(frame.id, filter.id).unwrap(), 1);
        assert!(db.get_frame_filters(frame.id).unwrap().is_empty());
    }

    #[test]
    fn test_deleting_camera_cascades_links() {
        let mut db = memory_db();
        let mut camera = Camera::new("Canon", "AE-1");
        db.add_camera(&mut camera).unwrap();
        let mut lens = Lens::new("Canon", "FD 50mm");
        db.add_lens(&mut lens).unwrap();
        db.add_camera_lens_link(camera.id, lens.id).unwrap();

        db.delete_camera(camera.id).unwrap();

        let fetched = db.get_lens(lens.id).unwrap().unwrap();
        assert!(fetched.camera_ids.is_empty());
    }

    // ==================== Scenario coverage ====================

    #[test]
    fn test_roll_with_film_stock_and_single_frame() {
        let mut db = memory_db();

        let stocks = db.get_film_stocks().unwrap();
        let tri_x = stocks
            .iter()
            .find(|s| s.make == "Kodak" && s.model == "Tri-X 400")
            .unwrap();
        assert!(tri_x.is_preadded);

        let mut camera = Camera::new("Nikon", "FM2");
        db.add_camera(&mut camera).unwrap();

        let mut roll = Roll::new("Tri-X Test", test_date());
        roll.camera_id = Some(camera.id);
        roll.film_stock_id = Some(tri_x.id);
        roll.iso = 400;
        db.add_roll(&mut roll).unwrap();

        let mut frame = Frame::new(roll.id, 1, test_date());
        frame.shutter = Some("1/125".to_string());
        frame.aperture = Some("5.6".to_string());
        db.add_frame(&mut frame).unwrap();

        let rolls = db.get_rolls(RollFilter::Active).unwrap();
        let found = rolls.iter().find(|r| r.name == "Tri-X Test").unwrap();
        assert_eq!(found.film_stock_id, Some(tri_x.id));
        assert_eq!(db.get_frame_count(found.id).unwrap(), 1);

        let frames = db.get_frames(found.id).unwrap();
        assert_eq!(frames[0].shutter.as_deref(), Some("1/125"));
        assert_eq!(frames[0].aperture.as_deref(), Some("5.6"));
    }

    // ==================== Import ====================

    fn file_db_with_roll(dir: &TempDir, file: &str, roll_name: &str) -> (PathBuf, Database) {
        let path = dir.path().join(file);
        let mut db = Database::open_at(&path).unwrap();
        let mut roll = Roll::new(roll_name, test_date());
        db.add_roll(&mut roll).unwrap();
        (path, db)
    }

    #[test]
    fn test_import_replaces_store_and_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let (live_path, mut db) = file_db_with_roll(&dir, "live.db", "Original");
        let (source_path, source_db) = file_db_with_roll(&dir, "incoming.db", "Imported");
        drop(source_db);

        db.import_file(&source_path).unwrap();

        let names: Vec<String> = db
            .get_rolls(RollFilter::All)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["Imported"]);

        // The pre-import store survives as the backup
        let backup = import::backup_path(&live_path);
        assert!(backup.exists());
        let backup_conn = Connection::open(&backup).unwrap();
        let name: String = backup_conn
            .query_row("SELECT roll_name FROM rolls", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Original");
    }

    #[test]
    fn test_import_corrupt_file_restores_previous() {
        let dir = TempDir::new().unwrap();
        let (_, mut db) = file_db_with_roll(&dir, "live.db", "Original");
        let garbage = dir.path().join("garbage.db");
        std::fs::write(&garbage, b"this is certainly not a database file").unwrap();

        let err = db.import_file(&garbage).unwrap_err();
        assert!(matches!(err, DatabaseError::CorruptImport { .. }));
        assert!(err.is_recoverable());

        // Previous store intact and usable through the same handle
        let rolls = db.get_rolls(RollFilter::All).unwrap();
        assert_eq!(rolls.len(), 1);
        assert_eq!(rolls[0].name, "Original");
    }

    #[test]
    fn test_import_foreign_schema_restores_previous() {
        let dir = TempDir::new().unwrap();
        let (_, mut db) = file_db_with_roll(&dir, "live.db", "Original");

        let foreign = dir.path().join("foreign.db");
        {
            let conn = Connection::open(&foreign).unwrap();
            conn.execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", [])
                .unwrap();
            conn.pragma_update(None, "user_version", DATABASE_VERSION).unwrap();
        }

        let err = db.import_file(&foreign).unwrap_err();
        assert!(matches!(err, DatabaseError::IncompatibleImport { .. }));

        let rolls = db.get_rolls(RollFilter::All).unwrap();
        assert_eq!(rolls[0].name, "Original");
    }

    #[test]
    fn test_import_newer_version_restores_previous() {
        let dir = TempDir::new().unwrap();
        let (_, mut db) = file_db_with_roll(&dir, "live.db", "Original");

        let future = dir.path().join("future.db");
        {
            let conn = Connection::open(&future).unwrap();
            conn.execute("CREATE TABLE rolls (roll_id INTEGER PRIMARY KEY)", [])
                .unwrap();
            conn.pragma_update(None, "user_version", 99).unwrap();
        }

        let err = db.import_file(&future).unwrap_err();
        assert!(matches!(err, DatabaseError::NewerSchema { found: 99, .. }));

        let rolls = db.get_rolls(RollFilter::All).unwrap();
        assert_eq!(rolls[0].name, "Original");
    }

    #[test]
    fn test_import_pre_baseline_version_restores_previous() {
        let dir = TempDir::new().unwrap();
        let (_, mut db) = file_db_with_roll(&dir, "live.db", "Original");

        let empty = dir.path().join("empty.db");
        {
            let conn = Connection::open(&empty).unwrap();
            conn.execute("CREATE TABLE placeholder (id INTEGER)", []).unwrap();
        }

        let err = db.import_file(&empty).unwrap_err();
        assert!(matches!(err, DatabaseError::IncompatibleImport { .. }));

        let rolls = db.get_rolls(RollFilter::All).unwrap();
        assert_eq!(rolls[0].name, "Original");
    }

    #[test]
    fn test_import_missing_source_keeps_store() {
        let dir = TempDir::new().unwrap();
        let (_, mut db) = file_db_with_roll(&dir, "live.db", "Original");

        let err = db.import_file(&dir.path().join("no-such.db")).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));

        let rolls = db.get_rolls(RollFilter::All).unwrap();
        assert_eq!(rolls[0].name, "Original");
    }

    #[test]
    fn test_import_upgrades_old_file() {
        let dir = TempDir::new().unwrap();
        let (_, mut db) = file_db_with_roll(&dir, "live.db", "Original");

        let old = dir.path().join("old-release.db");
        {
            let conn = Connection::open(&old).unwrap();
            testutil::create_v13_store(&conn);
            testutil::populate_v13_store(&conn);
        }

        db.import_file(&old).unwrap();
        assert_eq!(db.version().unwrap(), DATABASE_VERSION);

        let rolls = db.get_rolls(RollFilter::All).unwrap();
        let names: Vec<&str> = rolls.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"First roll"));
        assert!(names.contains(&"Orphan camera"));

        // The upgrade repaired the legacy shutter encoding on the way in
        let first = rolls.iter().find(|r| r.name == "First roll").unwrap();
        let frames = db.get_frames(first.id).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].shutter.as_deref(), Some("1\""));
        assert_eq!(
            frames[0].location,
            Some(Location::new(60.1699, 24.9384))
        );

        // Upgrading also seeded the catalog
        assert!(db.get_film_stocks().unwrap().len() >= 40);
    }

    #[test]
    fn test_import_rejected_for_in_memory_store() {
        let mut db = memory_db();
        let err = db.import_file(Path::new("/tmp/anything.db")).unwrap_err();
        assert!(matches!(err, DatabaseError::InMemoryImport));
    }
}
