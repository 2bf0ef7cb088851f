//! Versioned schema migrations
//!
//! An ordered list of upgrade steps, one per schema version, applied by a
//! runner that checks the list covers every version from the baseline to
//! the current one with no gaps. Each step runs in its own transaction and
//! commits its version stamp atomically with its statements, so an aborted
//! step leaves the store at the previous version.
//!
//! Foreign key enforcement is switched off for the duration of a migration
//! run: several steps rebuild tables with the rename-create-copy-drop
//! pattern, and enforcement during the intermediate states would reject
//! valid data. The restructuring steps null out references whose parent
//! row no longer exists, so the data is consistent when enforcement comes
//! back on.
//!
//! The baseline (version 13) schema had no foreign keys, stored roll names
//! in a `rollname` column, and encoded the `"` character in shutter speeds
//! as `q` because of an escaping defect in the original writer. Step 21
//! repairs all of that.

use rusqlite::{Connection, Result, Transaction};
use tracing::info;

use crate::storage::schema::{self, set_schema_version, BASE_VERSION, DATABASE_VERSION};
use crate::storage::seed;

/// One schema upgrade step
pub struct Migration {
    /// Version this step upgrades the store to
    pub version: i32,
    pub description: &'static str,
    apply: fn(&Transaction) -> Result<()>,
}

/// Every upgrade step, in order, from `BASE_VERSION + 1` to `DATABASE_VERSION`
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 14,
        description: "filters, gear metadata, frame exposure details",
        apply: migrate_v14,
    },
    Migration {
        version: 15,
        description: "complementary picture filenames",
        apply: migrate_v15,
    },
    Migration {
        version: 16,
        description: "roll archiving",
        apply: migrate_v16,
    },
    Migration {
        version: 17,
        description: "exposure compensation increments",
        apply: migrate_v17,
    },
    Migration {
        version: 18,
        description: "frame light source",
        apply: migrate_v18,
    },
    Migration {
        version: 19,
        description: "film stocks and bundled catalog",
        apply: migrate_v19,
    },
    Migration {
        version: 20,
        description: "roll unload and develop dates",
        apply: migrate_v20,
    },
    Migration {
        version: 21,
        description: "foreign key constraints, link tables, legacy data repair",
        apply: migrate_v21,
    },
    Migration {
        version: 22,
        description: "frame-filter link table",
        apply: migrate_v22,
    },
    Migration {
        version: 23,
        description: "fixed lenses",
        apply: migrate_v23,
    },
    Migration {
        version: 24,
        description: "custom aperture values, camera format",
        apply: migrate_v24,
    },
];

/// Apply every migration newer than `from_version`
///
/// The caller has already established that `from_version` is within the
/// supported range.
pub fn run_migrations(conn: &mut Connection, from_version: i32) -> Result<()> {
    debug_assert!(
        covers_every_version(),
        "migration list must step from {} to {} without gaps",
        BASE_VERSION + 1,
        DATABASE_VERSION
    );

    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    let result = apply_pending(conn, from_version);
    let restore = conn.execute_batch("PRAGMA foreign_keys = ON;");
    result.and(restore)
}

fn apply_pending(conn: &mut Connection, from_version: i32) -> Result<()> {
    for migration in MIGRATIONS.iter().filter(|m| m.version > from_version) {
        info!(
            "Applying schema migration {}: {}",
            migration.version, migration.description
        );
        let tx = conn.transaction()?;
        (migration.apply)(&tx)?;
        set_schema_version(&tx, migration.version)?;
        tx.commit()?;
    }
    Ok(())
}

fn covers_every_version() -> bool {
    let mut expected = BASE_VERSION + 1;
    for migration in MIGRATIONS {
        if migration.version != expected {
            return false;
        }
        expected += 1;
    }
    expected == DATABASE_VERSION + 1
}

fn migrate_v14(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        "CREATE TABLE filters (
            filter_id INTEGER PRIMARY KEY AUTOINCREMENT,
            filter_make TEXT NOT NULL,
            filter_model TEXT NOT NULL
        );
        CREATE TABLE mountable_filters_lenses (
            lens_id INTEGER NOT NULL,
            filter_id INTEGER NOT NULL
        );
        ALTER TABLE frames ADD COLUMN focal_length INTEGER;
        ALTER TABLE frames ADD COLUMN exposure_comp TEXT;
        ALTER TABLE frames ADD COLUMN no_of_exposures INTEGER;
        ALTER TABLE frames ADD COLUMN flash_used INTEGER;
        ALTER TABLE frames ADD COLUMN flash_power TEXT;
        ALTER TABLE frames ADD COLUMN flash_comp TEXT;
        ALTER TABLE frames ADD COLUMN metering_mode INTEGER;
        ALTER TABLE frames ADD COLUMN formatted_address TEXT;
        ALTER TABLE frames ADD COLUMN filter_id INTEGER;
        ALTER TABLE lenses ADD COLUMN lens_serial_no TEXT;
        ALTER TABLE lenses ADD COLUMN lens_min_aperture TEXT;
        ALTER TABLE lenses ADD COLUMN lens_max_aperture TEXT;
        ALTER TABLE lenses ADD COLUMN lens_min_focal_length INTEGER;
        ALTER TABLE lenses ADD COLUMN lens_max_focal_length INTEGER;
        ALTER TABLE lenses ADD COLUMN lens_aperture_increments INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE cameras ADD COLUMN camera_serial_no TEXT;
        ALTER TABLE cameras ADD COLUMN camera_min_shutter TEXT;
        ALTER TABLE cameras ADD COLUMN camera_max_shutter TEXT;
        ALTER TABLE cameras ADD COLUMN camera_shutter_increments INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE rolls ADD COLUMN roll_iso INTEGER;
        ALTER TABLE rolls ADD COLUMN roll_push_pull TEXT;
        ALTER TABLE rolls ADD COLUMN roll_format INTEGER;",
    )
}

fn migrate_v15(tx: &Transaction) -> Result<()> {
    tx.execute_batch("ALTER TABLE frames ADD COLUMN picture_filename TEXT;")
}

fn migrate_v16(tx: &Transaction) -> Result<()> {
    tx.execute_batch("ALTER TABLE rolls ADD COLUMN roll_archived INTEGER NOT NULL DEFAULT 0;")
}

fn migrate_v17(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        "ALTER TABLE cameras ADD COLUMN camera_exposure_comp_increments INTEGER NOT NULL DEFAULT 0;",
    )
}

fn migrate_v18(tx: &Transaction) -> Result<()> {
    tx.execute_batch("ALTER TABLE frames ADD COLUMN light_source INTEGER;")
}

fn migrate_v19(tx: &Transaction) -> Result<()> {
    tx.execute_batch(&format!(
        "{create_film_stocks};
        ALTER TABLE rolls ADD COLUMN film_stock_id INTEGER REFERENCES film_stocks ON DELETE SET NULL;",
        create_film_stocks = schema::CREATE_FILM_STOCKS,
    ))?;
    seed::populate(tx)?;
    Ok(())
}

fn migrate_v20(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        "ALTER TABLE rolls ADD COLUMN roll_unloaded TEXT;
        ALTER TABLE rolls ADD COLUMN roll_developed TEXT;",
    )
}

/// Frames as rebuilt by step 21; step 22 moves `filter_id` into a link table
const CREATE_FRAMES_V21: &str = "
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
        lens_id INTEGER REFERENCES lenses ON DELETE SET NULL,
        filter_id INTEGER REFERENCES filters ON DELETE SET NULL
    )";

fn migrate_v21(tx: &Transaction) -> Result<()> {
    // Rebuilds rolls and frames with declared constraints, replaces the two
    // loose mountable tables with composite-key link tables, renames
    // `rollname` to roll_name, restores the `"` character in shutter speeds,
    // and nulls references whose parent row is gone. Frames of already
    // deleted rolls are not copied; the new roll_id column is NOT NULL.
    tx.execute_batch(&format!(
        r#"ALTER TABLE rolls RENAME TO rolls_old;
        {create_rolls};
        INSERT INTO rolls (roll_id, roll_name, roll_date, roll_note, roll_iso, roll_push_pull,
                           roll_format, roll_archived, roll_unloaded, roll_developed, camera_id,
                           film_stock_id)
        SELECT r.roll_id, r.rollname, r.roll_date, r.roll_note, r.roll_iso, r.roll_push_pull,
               r.roll_format, r.roll_archived, r.roll_unloaded, r.roll_developed,
               CASE WHEN EXISTS (SELECT 1 FROM cameras c WHERE c.camera_id = r.camera_id)
                    THEN r.camera_id END,
               CASE WHEN EXISTS (SELECT 1 FROM film_stocks s WHERE s.film_stock_id = r.film_stock_id)
                    THEN r.film_stock_id END
        FROM rolls_old r;
        DROP TABLE rolls_old;

        ALTER TABLE frames RENAME TO frames_old;
        {create_frames};
        INSERT INTO frames (frame_id, roll_id, count, date, shutter, aperture, frame_note,
                            location, formatted_address, focal_length, exposure_comp,
                            no_of_exposures, flash_used, flash_power, flash_comp, metering_mode,
                            light_source, picture_filename, lens_id, filter_id)
        SELECT f.frame_id, f.roll_id, f.count, f.date,
               REPLACE(f.shutter, 'q', '"'),
               f.aperture, f.frame_note, f.location, f.formatted_address, f.focal_length,
               f.exposure_comp, f.no_of_exposures, f.flash_used, f.flash_power, f.flash_comp,
               f.metering_mode, f.light_source, f.picture_filename,
               CASE WHEN EXISTS (SELECT 1 FROM lenses l WHERE l.lens_id = f.lens_id)
                    THEN f.lens_id END,
               CASE WHEN EXISTS (SELECT 1 FROM filters ft WHERE ft.filter_id = f.filter_id)
                    THEN f.filter_id END
        FROM frames_old f
        WHERE EXISTS (SELECT 1 FROM rolls r WHERE r.roll_id = f.roll_id);
        DROP TABLE frames_old;

        {create_link_camera_lens};
        INSERT OR IGNORE INTO link_camera_lens (camera_id, lens_id)
        SELECT m.camera_id, m.lens_id
        FROM mountables m
        WHERE EXISTS (SELECT 1 FROM cameras c WHERE c.camera_id = m.camera_id)
          AND EXISTS (SELECT 1 FROM lenses l WHERE l.lens_id = m.lens_id);
        DROP TABLE mountables;

        {create_link_lens_filter};
        INSERT OR IGNORE INTO link_lens_filter (lens_id, filter_id)
        SELECT x.lens_id, x.filter_id
        FROM mountable_filters_lenses x
        WHERE EXISTS (SELECT 1 FROM lenses l WHERE l.lens_id = x.lens_id)
          AND EXISTS (SELECT 1 FROM filters ft WHERE ft.filter_id = x.filter_id);
        DROP TABLE mountable_filters_lenses;"#,
        create_rolls = schema::CREATE_ROLLS,
        create_frames = CREATE_FRAMES_V21,
        create_link_camera_lens = schema::CREATE_LINK_CAMERA_LENS,
        create_link_lens_filter = schema::CREATE_LINK_LENS_FILTER,
    ))
}

fn migrate_v22(tx: &Transaction) -> Result<()> {
    // Rename first: link_frame_filter must not exist while frames is being
    // renamed, or the rename would retarget the link table's foreign key to
    // frames_old.
    tx.execute_batch(&format!(
        "ALTER TABLE frames RENAME TO frames_old;
        {create_frames};
        {create_link_frame_filter};
        INSERT INTO frames (frame_id, roll_id, count, date, shutter, aperture, frame_note,
                            location, formatted_address, focal_length, exposure_comp,
                            no_of_exposures, flash_used, flash_power, flash_comp, metering_mode,
                            light_source, picture_filename, lens_id)
        SELECT frame_id, roll_id, count, date, shutter, aperture, frame_note, location,
               formatted_address, focal_length, exposure_comp, no_of_exposures, flash_used,
               flash_power, flash_comp, metering_mode, light_source, picture_filename, lens_id
        FROM frames_old;
        INSERT OR IGNORE INTO link_frame_filter (frame_id, filter_id)
        SELECT frame_id, filter_id FROM frames_old WHERE filter_id IS NOT NULL;
        DROP TABLE frames_old;",
        create_frames = schema::CREATE_FRAMES,
        create_link_frame_filter = schema::CREATE_LINK_FRAME_FILTER,
    ))
}

fn migrate_v23(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        "ALTER TABLE cameras ADD COLUMN lens_id INTEGER REFERENCES lenses ON DELETE SET NULL;",
    )
}

fn migrate_v24(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        "ALTER TABLE lenses ADD COLUMN lens_custom_aperture_values TEXT;
        ALTER TABLE cameras ADD COLUMN camera_format INTEGER;",
    )
}
