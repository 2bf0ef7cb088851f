//! SQLite schema for the film log store
//!
//! Holds the current-version table definitions and the schema version
//! constants. The schema version is tracked in the database file itself
//! via `PRAGMA user_version`, so files exported from older releases carry
//! their version with them.
//!
//! Foreign keys are declared without an explicit target column; they bind
//! to the parent table's primary key. Tables are created in dependency
//! order, referenced tables first.

use rusqlite::{Connection, Result};

/// Current schema version; incremented with every additive or structural change
pub const DATABASE_VERSION: i32 = 24;

/// Oldest schema version the migration history can upgrade from
pub const BASE_VERSION: i32 = 13;

pub(crate) const CREATE_LENSES: &str = "
    CREATE TABLE lenses (
        lens_id INTEGER PRIMARY KEY AUTOINCREMENT,
        lens_make TEXT NOT NULL,
        lens_model TEXT NOT NULL,
        lens_serial_no TEXT,
        lens_min_aperture TEXT,
        lens_max_aperture TEXT,
        lens_min_focal_length INTEGER,
        lens_max_focal_length INTEGER,
        lens_aperture_increments INTEGER NOT NULL DEFAULT 0,
        lens_custom_aperture_values TEXT
    )";

pub(crate) const CREATE_CAMERAS: &str = "
    CREATE TABLE cameras (
        camera_id INTEGER PRIMARY KEY AUTOINCREMENT,
        camera_make TEXT NOT NULL,
        camera_model TEXT NOT NULL,
        camera_serial_no TEXT,
        camera_min_shutter TEXT,
        camera_max_shutter TEXT,
        camera_shutter_increments INTEGER NOT NULL DEFAULT 0,
        camera_exposure_comp_increments INTEGER NOT NULL DEFAULT 0,
        camera_format INTEGER,
        lens_id INTEGER REFERENCES lenses ON DELETE SET NULL
    )";

pub(crate) const CREATE_FILTERS: &str = "
    CREATE TABLE filters (
        filter_id INTEGER PRIMARY KEY AUTOINCREMENT,
        filter_make TEXT NOT NULL,
        filter_model TEXT NOT NULL
    )";

pub(crate) const CREATE_FILM_STOCKS: &str = "
    CREATE TABLE film_stocks (
        film_stock_id INTEGER PRIMARY KEY AUTOINCREMENT,
        film_stock_make TEXT NOT NULL,
        film_stock_model TEXT NOT NULL,
        film_iso INTEGER,
        film_type INTEGER,
        film_process INTEGER,
        film_is_preadded INTEGER NOT NULL DEFAULT 0
    )";

pub(crate) const CREATE_ROLLS: &str = "
    CREATE TABLE rolls (
        roll_id INTEGER PRIMARY KEY AUTOINCREMENT,
        roll_name TEXT NOT NULL,
        roll_date TEXT NOT NULL,
        roll_note TEXT,
        roll_iso INTEGER,
        roll_push_pull TEXT,
        roll_format INTEGER,
        roll_archived INTEGER NOT NULL DEFAULT 0,
        roll_unloaded TEXT,
        roll_developed TEXT,
        camera_id INTEGER REFERENCES cameras ON DELETE SET NULL,
        film_stock_id INTEGER REFERENCES film_stocks ON DELETE SET NULL
    )";

pub(crate) const CREATE_FRAMES: &str = "
    CREATE TABLE frames (
        frame_id INTEGER PRIMARY KEY AUTOINCREMENT,
        roll_id INTEGER NOT NULL REFERENCES rolls ON DELETE CASCADE,
        count INTEGER NOT NULL,
        date TEXT NOT NULL,
        shutter TEXT,
        aperture TEXT,
        frame_note TEXT,
        location TEXT,
        formatted_address TEXT,
        focal_length INTEGER,
        exposure_comp TEXT,
        no_of_exposures INTEGER,
        flash_used INTEGER,
        flash_power TEXT,
        flash_comp TEXT,
        metering_mode INTEGER,
        light_source INTEGER,
        picture_filename TEXT,
        lens_id INTEGER REFERENCES lenses ON DELETE SET NULL
    )";

pub(crate) const CREATE_LINK_CAMERA_LENS: &str = "
    CREATE TABLE link_camera_lens (
        camera_id INTEGER NOT NULL REFERENCES cameras ON DELETE CASCADE,
        lens_id INTEGER NOT NULL REFERENCES lenses ON DELETE CASCADE,
        PRIMARY KEY (camera_id, lens_id)
    )";

pub(crate) const CREATE_LINK_LENS_FILTER: &str = "
    CREATE TABLE link_lens_filter (
        lens_id INTEGER NOT NULL REFERENCES lenses ON DELETE CASCADE,
        filter_id INTEGER NOT NULL REFERENCES filters ON DELETE CASCADE,
        PRIMARY KEY (lens_id, filter_id)
    )";

pub(crate) const CREATE_LINK_FRAME_FILTER: &str = "
    CREATE TABLE link_frame_filter (
        frame_id INTEGER NOT NULL REFERENCES frames ON DELETE CASCADE,
        filter_id INTEGER NOT NULL REFERENCES filters ON DELETE CASCADE,
        PRIMARY KEY (frame_id, filter_id)
    )";

/// All current-version tables in dependency order
pub(crate) const CREATE_TABLES: &[&str] = &[
    CREATE_LENSES,
    CREATE_CAMERAS,
    CREATE_FILTERS,
    CREATE_FILM_STOCKS,
    CREATE_ROLLS,
    CREATE_FRAMES,
    CREATE_LINK_CAMERA_LENS,
    CREATE_LINK_LENS_FILTER,
    CREATE_LINK_FRAME_FILTER,
];

/// Create all tables at the current version and stamp the version
///
/// Used for fresh stores only; existing stores go through the migration
/// history instead.
pub fn create_schema(conn: &Connection) -> Result<()> {
    for sql in CREATE_TABLES {
        conn.execute(sql, [])?;
    }
    set_schema_version(conn, DATABASE_VERSION)?;
    Ok(())
}

/// Read the schema version recorded in the database file
pub fn schema_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Record the schema version in the database file
pub(crate) fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.pragma_update(None, "user_version", version)
}

/// Check whether the store has been created
pub fn schema_exists(conn: &Connection) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'rolls'")?;
    stmt.exists([])
}
