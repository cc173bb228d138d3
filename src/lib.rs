//! Import GeoJSON into SQLite.
//!
//! ## Overview
//!
//! - [`FeatureReader`] parses one input source (a whole GeoJSON document or a
//!   newline-delimited feature stream) into a lazy sequence of features.
//! - [`import_features`] projects each feature onto a flat row and drives the
//!   table store: primary-key inference from a leading sample, schema
//!   creation, idempotent upserts, and optional SpatiaLite geometry
//!   conversion and spatial indexing.
//! - [`Database`] wraps the underlying rusqlite connection with the
//!   schema-on-write helpers the pipeline needs.
//!
//! ## Short usage
//!
//! ```no_run
//! use geojson_to_sqlite::{Database, FeatureReader, ImportOptions, import_features};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let db = Database::open("places.db")?;
//! let input = BufReader::new(File::open("places.geojson")?);
//! let features = FeatureReader::from_document(input)?;
//! let count = import_features(&db, "places", features, &ImportOptions::default())?;
//! println!("imported {count} features");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Re-importing the same data with a primary key (explicit, or inferred when
//! every sampled feature carries an `id`) updates existing rows instead of
//! duplicating them. With spatial mode active, geometries are stored as
//! SpatiaLite geometries built from their well-known-text form rather than
//! as JSON text.

mod error;
mod pipeline;
mod reader;
mod spatialite;
mod store;
mod types;

pub use error::{ImportError, Result};
pub use pipeline::{ImportOptions, import_features};
pub use reader::FeatureReader;
pub use spatialite::{SPATIALITE_PATHS, find_spatialite};
pub use store::{Conversions, Database};
pub use types::{ColumnSpec, ColumnType, Row};
