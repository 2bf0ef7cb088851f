//! Storage layer
//!
//! Schema definition and migration, row mapping, seed data, and the
//! import machinery behind the [`Database`](crate::database::Database)
//! façade.
//!
//! ## Architecture
//!
//! - `schema`: current-version DDL and the version constants
//! - `migrations`: ordered upgrade steps from every historical version
//! - `mappers`: typed row-to-entity decoding
//! - `seed`: bundled film stock catalog
//! - `integrity`: structural verification of imported files
//! - `import`: file swap, backup, and rollback plumbing

pub mod error;
pub(crate) mod import;
pub mod integrity;
pub(crate) mod mappers;
pub mod migrations;
pub mod schema;
pub mod seed;

pub use error::{DatabaseError, DatabaseResult};
pub use schema::{schema_version, BASE_VERSION, DATABASE_VERSION};
