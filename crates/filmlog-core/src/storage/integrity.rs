//! Structural schema verification
//!
//! Checks an open database against the expected current-version schema,
//! column by column: declared type prefix, not-null flag, primary key
//! position, autoincrement presence, and for foreign key columns the
//! parent table and delete action reported by the engine's own metadata.
//! Used by the import path to reject files produced by an incompatible
//! or tampered build before they replace the live store.
//!
//! The verdict is the AND of every individual check; each mismatch is
//! logged before the verdict is returned, so a failed import explains
//! itself in the log.

use rusqlite::{Connection, OptionalExtension, Result};
use tracing::warn;

const INTEGER: &str = "INTEGER";
const TEXT: &str = "TEXT";
const CASCADE: &str = "CASCADE";
const SET_NULL: &str = "SET NULL";

struct ExpectedFk {
    parent: &'static str,
    on_delete: &'static str,
}

struct ExpectedColumn {
    name: &'static str,
    col_type: &'static str,
    not_null: bool,
    /// Position in the primary key, 0 when not part of it
    pk: i32,
    fk: Option<ExpectedFk>,
}

struct ExpectedTable {
    name: &'static str,
    autoincrement: bool,
    columns: &'static [ExpectedColumn],
}

const fn col(name: &'static str, col_type: &'static str, not_null: bool) -> ExpectedColumn {
    ExpectedColumn {
        name,
        col_type,
        not_null,
        pk: 0,
        fk: None,
    }
}

/// A single-column `INTEGER PRIMARY KEY AUTOINCREMENT` id
const fn id(name: &'static str) -> ExpectedColumn {
    ExpectedColumn {
        name,
        col_type: INTEGER,
        not_null: false,
        pk: 1,
        fk: None,
    }
}

const fn fk(
    name: &'static str,
    parent: &'static str,
    on_delete: &'static str,
    not_null: bool,
) -> ExpectedColumn {
    ExpectedColumn {
        name,
        col_type: INTEGER,
        not_null,
        pk: 0,
        fk: Some(ExpectedFk { parent, on_delete }),
    }
}

/// A link table column: part of the composite key, cascade-deleted
const fn link(name: &'static str, parent: &'static str, pk: i32) -> ExpectedColumn {
    ExpectedColumn {
        name,
        col_type: INTEGER,
        not_null: true,
        pk,
        fk: Some(ExpectedFk {
            parent,
            on_delete: CASCADE,
        }),
    }
}

const EXPECTED: &[ExpectedTable] = &[
    ExpectedTable {
        name: "lenses",
        autoincrement: true,
        columns: &[
            id("lens_id"),
            col("lens_make", TEXT, true),
            col("lens_model", TEXT, true),
            col("lens_serial_no", TEXT, false),
            col("lens_min_aperture", TEXT, false),
            col("lens_max_aperture", TEXT, false),
            col("lens_min_focal_length", INTEGER, false),
            col("lens_max_focal_length", INTEGER, false),
            col("lens_aperture_increments", INTEGER, true),
            col("lens_custom_aperture_values", TEXT, false),
        ],
    },
    ExpectedTable {
        name: "cameras",
        autoincrement: true,
        columns: &[
            id("camera_id"),
            col("camera_make", TEXT, true),
            col("camera_model", TEXT, true),
            col("camera_serial_no", TEXT, false),
            col("camera_min_shutter", TEXT, false),
            col("camera_max_shutter", TEXT, false),
            col("camera_shutter_increments", INTEGER, true),
            col("camera_exposure_comp_increments", INTEGER, true),
            col("camera_format", INTEGER, false),
            fk("lens_id", "lenses", SET_NULL, false),
        ],
    },
    ExpectedTable {
        name: "filters",
        autoincrement: true,
        columns: &[
            id("filter_id"),
            col("filter_make", TEXT, true),
            col("filter_model", TEXT, true),
        ],
    },
    ExpectedTable {
        name: "film_stocks",
        autoincrement: true,
        columns: &[
            id("film_stock_id"),
            col("film_stock_make", TEXT, true),
            col("film_stock_model", TEXT, true),
            col("film_iso", INTEGER, false),
            col("film_type", INTEGER, false),
            col("film_process", INTEGER, false),
            col("film_is_preadded", INTEGER, true),
        ],
    },
    ExpectedTable {
        name: "rolls",
        autoincrement: true,
        columns: &[
            id("roll_id"),
            col("roll_name", TEXT, true),
            col("roll_date", TEXT, true),
            col("roll_note", TEXT, false),
            col("roll_iso", INTEGER, false),
            col("roll_push_pull", TEXT, false),
            col("roll_format", INTEGER, false),
            col("roll_archived", INTEGER, true),
            col("roll_unloaded", TEXT, false),
            col("roll_developed", TEXT, false),
            fk("camera_id", "cameras", SET_NULL, false),
            fk("film_stock_id", "film_stocks", SET_NULL, false),
        ],
    },
    ExpectedTable {
        name: "frames",
        autoincrement: true,
        columns: &[
            id("frame_id"),
            fk("roll_id", "rolls", CASCADE, true),
            col("count", INTEGER, true),
            col("date", TEXT, true),
            col("shutter", TEXT, false),
            col("aperture", TEXT, false),
            col("frame_note", TEXT, false),
            col("location", TEXT, false),
            col("formatted_address", TEXT, false),
            col("focal_length", INTEGER, false),
            col("exposure_comp", TEXT, false),
            col("no_of_exposures", INTEGER, false),
            col("flash_used", INTEGER, false),
            col("flash_power", TEXT, false),
            col("flash_comp", TEXT, false),
            col("metering_mode", INTEGER, false),
            col("light_source", INTEGER, false),
            col("picture_filename", TEXT, false),
            fk("lens_id", "lenses", SET_NULL, false),
        ],
    },
    ExpectedTable {
        name: "link_camera_lens",
        autoincrement: false,
        columns: &[link("camera_id", "cameras", 1), link("lens_id", "lenses", 2)],
    },
    ExpectedTable {
        name: "link_lens_filter",
        autoincrement: false,
        columns: &[link("lens_id", "lenses", 1), link("filter_id", "filters", 2)],
    },
    ExpectedTable {
        name: "link_frame_filter",
        autoincrement: false,
        columns: &[link("frame_id", "frames", 1), link("filter_id", "filters", 2)],
    },
];

struct ColumnInfo {
    name: String,
    col_type: String,
    not_null: bool,
    pk: i32,
}

struct FkInfo {
    parent: String,
    from: String,
    to: Option<String>,
    on_delete: String,
}

/// Verify every table and column of the current-version schema
///
/// Returns true only if every check passes. Mismatches are logged.
pub fn verify_schema(conn: &Connection) -> Result<bool> {
    let mut ok = true;
    for table in EXPECTED {
        if !verify_table(conn, table)? {
            ok = false;
        }
    }
    Ok(ok)
}

/// Run the engine's own page-level consistency check
pub(crate) fn quick_check_ok(conn: &Connection) -> Result<bool> {
    let verdict: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
    Ok(verdict == "ok")
}

fn verify_table(conn: &Connection, expected: &ExpectedTable) -> Result<bool> {
    let columns = read_columns(conn, expected.name)?;
    if columns.is_empty() {
        warn!("Schema check: table '{}' is missing", expected.name);
        return Ok(false);
    }

    let fks = read_foreign_keys(conn, expected.name)?;
    let mut ok = true;

    if columns.len() != expected.columns.len() {
        warn!(
            "Schema check: table '{}' has {} columns, expected {}",
            expected.name,
            columns.len(),
            expected.columns.len()
        );
        ok = false;
    }

    for exp in expected.columns {
        let Some(actual) = columns.iter().find(|c| c.name == exp.name) else {
            warn!(
                "Schema check: table '{}' is missing column '{}'",
                expected.name, exp.name
            );
            ok = false;
            continue;
        };
        if !actual
            .col_type
            .to_uppercase()
            .starts_with(exp.col_type)
        {
            warn!(
                "Schema check: column '{}.{}' has type '{}', expected {}",
                expected.name, exp.name, actual.col_type, exp.col_type
            );
            ok = false;
        }
        if actual.not_null != exp.not_null {
            warn!(
                "Schema check: column '{}.{}' not-null flag is {}, expected {}",
                expected.name, exp.name, actual.not_null, exp.not_null
            );
            ok = false;
        }
        if actual.pk != exp.pk {
            warn!(
                "Schema check: column '{}.{}' primary key position is {}, expected {}",
                expected.name, exp.name, actual.pk, exp.pk
            );
            ok = false;
        }
        if !verify_column_fk(expected.name, exp, &fks) {
            ok = false;
        }
    }

    let expected_fks = expected.columns.iter().filter(|c| c.fk.is_some()).count();
    if fks.len() != expected_fks {
        warn!(
            "Schema check: table '{}' declares {} foreign keys, expected {}",
            expected.name,
            fks.len(),
            expected_fks
        );
        ok = false;
    }

    let autoincrement = table_has_autoincrement(conn, expected.name)?;
    if autoincrement != expected.autoincrement {
        warn!(
            "Schema check: table '{}' autoincrement is {}, expected {}",
            expected.name, autoincrement, expected.autoincrement
        );
        ok = false;
    }

    Ok(ok)
}

fn verify_column_fk(table: &str, exp: &ExpectedColumn, fks: &[FkInfo]) -> bool {
    let actual = fks.iter().find(|f| f.from == exp.name);
    match (&exp.fk, actual) {
        (None, None) => true,
        (None, Some(_)) => {
            warn!(
                "Schema check: column '{}.{}' has an unexpected foreign key",
                table, exp.name
            );
            false
        }
        (Some(_), None) => {
            warn!(
                "Schema check: column '{}.{}' is missing its foreign key",
                table, exp.name
            );
            false
        }
        (Some(expected), Some(actual)) => {
            let mut ok = true;
            if actual.parent != expected.parent {
                warn!(
                    "Schema check: column '{}.{}' references '{}', expected '{}'",
                    table, exp.name, actual.parent, expected.parent
                );
                ok = false;
            }
            // The reference must bind to the parent's primary key implicitly
            if actual.to.is_some() {
                warn!(
                    "Schema check: column '{}.{}' overrides the foreign key target column",
                    table, exp.name
                );
                ok = false;
            }
            if !actual.on_delete.eq_ignore_ascii_case(expected.on_delete) {
                warn!(
                    "Schema check: column '{}.{}' delete action is '{}', expected '{}'",
                    table, exp.name, actual.on_delete, expected.on_delete
                );
                ok = false;
            }
            ok
        }
    }
}

fn read_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            name: row.get("name")?,
            col_type: row.get("type")?,
            not_null: row.get::<_, i32>("notnull")? != 0,
            pk: row.get("pk")?,
        })
    })?;
    rows.collect()
}

fn read_foreign_keys(conn: &Connection, table: &str) -> Result<Vec<FkInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({table})"))?;
    let rows = stmt.query_map([], |row| {
        Ok(FkInfo {
            parent: row.get("table")?,
            from: row.get("from")?,
            to: row.get("to")?,
            on_delete: row.get("on_delete")?,
        })
    })?;
    rows.collect()
}

fn table_has_autoincrement(conn: &Connection, table: &str) -> Result<bool> {
    let sql: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(sql
        .map(|s| s.to_uppercase().contains("AUTOINCREMENT"))
        .unwrap_or(false))
}
