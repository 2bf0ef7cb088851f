//! Filmlog Core Library
//!
//! This crate provides the storage engine for filmlog, a log for film
//! photographers: rolls of film, the frames exposed on them, and the gear
//! they were shot with.
//!
//! # Architecture
//!
//! - **SQLite**: Single-file store; the schema version travels inside the
//!   file, so databases exported from old releases upgrade on open
//!
//! All reads and writes go through the [`Database`] façade.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut db = Database::open(&config)?;
//!
//! // Load a roll into a camera
//! let mut roll = Roll::new("Summer trip", loaded_at);
//! db.add_roll(&mut roll)?;
//!
//! // Expose a frame
//! let mut frame = Frame::new(roll.id, 1, shot_at);
//! frame.shutter = Some("1/125".to_string());
//! db.add_frame(&mut frame)?;
//!
//! // Query rolls
//! let rolls = db.get_rolls(RollFilter::Active)?;
//! ```
//!
//! # Modules
//!
//! - `database`: Unified storage interface (main entry point)
//! - `models`: Data structures for rolls, frames, and gear
//! - `storage`: Schema, migrations, integrity checking, and import
//! - `config`: Application configuration

pub mod config;
pub mod database;
pub mod models;
pub mod storage;

pub use config::Config;
pub use database::{Database, RollFilter, UpsertOutcome};
pub use models::{
    Camera, CompIncrements, FilmFormat, FilmProcess, FilmStock, FilmType, Filter, Frame,
    Increments, Lens, LightSource, Location, Roll,
};
pub use storage::{DatabaseError, DatabaseResult, BASE_VERSION, DATABASE_VERSION};
