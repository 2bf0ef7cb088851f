//! Film stock seed catalog
//!
//! A comma-delimited catalog of common film stocks is bundled into the
//! binary and inserted on store creation and on the upgrade step that
//! introduced the film_stocks table. Population is idempotent: records
//! whose make+model already exist are skipped, so re-running it against
//! a populated store adds nothing and user edits survive.

use rusqlite::{params, Connection, Result};
use tracing::{debug, warn};

use crate::models::{FilmProcess, FilmType};

/// Bundled catalog, one `make,model,iso,type,process` record per line
pub const CATALOG: &str = include_str!("../../data/film_stocks.csv");

/// One valid catalog record
#[derive(Debug, Clone, PartialEq)]
pub struct SeedRecord {
    pub make: String,
    pub model: String,
    pub iso: i32,
    pub film_type: FilmType,
    pub process: FilmProcess,
}

/// Result of parsing a catalog
#[derive(Debug)]
pub struct ParsedCatalog {
    pub records: Vec<SeedRecord>,
    /// Number of lines that could not be parsed
    pub skipped: usize,
}

/// Outcome of populating the film_stocks table
#[derive(Debug, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    /// Records skipped because a matching make+model already existed
    pub skipped_existing: usize,
    /// Catalog lines skipped as malformed
    pub skipped_malformed: usize,
}

/// Parse a comma-delimited catalog, skipping malformed lines
///
/// A line is malformed if it does not have exactly five fields, its make
/// or model is empty, or a numeric field does not parse.
pub fn parse_catalog(data: &str) -> ParsedCatalog {
    let mut records = Vec::new();
    let mut skipped = 0;

    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(record) => records.push(record),
            None => {
                warn!("Skipping malformed film stock record: {}", line);
                skipped += 1;
            }
        }
    }

    ParsedCatalog { records, skipped }
}

fn parse_line(line: &str) -> Option<SeedRecord> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 5 {
        return None;
    }
    let make = fields[0].trim();
    let model = fields[1].trim();
    if make.is_empty() || model.is_empty() {
        return None;
    }
    let iso: i32 = fields[2].trim().parse().ok()?;
    let type_code: i32 = fields[3].trim().parse().ok()?;
    let process_code: i32 = fields[4].trim().parse().ok()?;

    Some(SeedRecord {
        make: make.to_string(),
        model: model.to_string(),
        iso,
        film_type: FilmType::from_code(type_code),
        process: FilmProcess::from_code(process_code),
    })
}

/// Insert the bundled catalog into film_stocks, skipping existing records
pub fn populate(conn: &Connection) -> Result<SeedReport> {
    let parsed = parse_catalog(CATALOG);
    let mut inserted = 0;
    let mut skipped_existing = 0;

    let mut stmt = conn.prepare(
        "INSERT INTO film_stocks (film_stock_make, film_stock_model, film_iso, film_type, \
         film_process, film_is_preadded)
         SELECT ?1, ?2, ?3, ?4, ?5, 1
         WHERE NOT EXISTS (SELECT 1 FROM film_stocks \
             WHERE film_stock_make = ?1 AND film_stock_model = ?2)",
    )?;
    for record in &parsed.records {
        let affected = stmt.execute(params![
            record.make,
            record.model,
            record.iso,
            record.film_type.code(),
            record.process.code(),
        ])?;
        if affected == 0 {
            skipped_existing += 1;
        } else {
            inserted += 1;
        }
    }

    if parsed.skipped > 0 {
        warn!(
            "Skipped {} malformed film stock catalog lines",
            parsed.skipped
        );
    }
    debug!(
        "Film stock catalog populated: {} inserted, {} already present",
        inserted, skipped_existing
    );

    Ok(SeedReport {
        inserted,
        skipped_existing,
        skipped_malformed: parsed.skipped,
    })
}
