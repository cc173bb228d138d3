use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::types::ColumnType;

/// Crate error type for import operations.
#[derive(Debug)]
pub enum ImportError {
    /// Wraps errors returned by `rusqlite`.
    Sql(rusqlite::Error),
    /// Wraps I/O errors from reading an input stream.
    Io(std::io::Error),
    /// Input that is not valid JSON at all.
    Json(serde_json::Error),
    /// Whole-document input whose root is not a JSON object.
    MalformedRoot,
    /// Whole-document input whose root `type` is neither `Feature` nor
    /// `FeatureCollection`.
    NotGeoJson,
    /// A newline-delimited line that could not be parsed as a Feature.
    MalformedLine { line: String },
    /// A document element that should be a Feature but is not.
    InvalidFeature(String),
    /// A geometry object that could not be converted to well-known text.
    Geometry(String),
    /// Spatial mode was requested but no SpatiaLite module could be located.
    SpatialExtensionUnavailable { configured: Option<PathBuf> },
    /// A sampled column saw two value kinds that cannot share one column.
    ColumnTypeConflict {
        column: String,
        existing: ColumnType,
        inferred: ColumnType,
    },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "invalid JSON: {err}"),
            Self::MalformedRoot => write!(f, "GeoJSON root must be an object"),
            Self::NotGeoJson => {
                write!(f, "GeoJSON must be a Feature or a FeatureCollection")
            }
            Self::MalformedLine { line } => {
                write!(f, "could not parse line as a GeoJSON Feature: {line}")
            }
            Self::InvalidFeature(message) => {
                write!(f, "not a valid GeoJSON Feature: {message}")
            }
            Self::Geometry(message) => {
                write!(f, "could not convert geometry: {message}")
            }
            Self::SpatialExtensionUnavailable {
                configured: Some(path),
            } => {
                write!(f, "SpatiaLite module not found at {}", path.display())
            }
            Self::SpatialExtensionUnavailable { configured: None } => {
                write!(
                    f,
                    "could not find SpatiaLite module, set an explicit path with --spatialite_mod"
                )
            }
            Self::ColumnTypeConflict {
                column,
                existing,
                inferred,
            } => {
                write!(
                    f,
                    "column '{column}' cannot hold both {existing} and {inferred} values"
                )
            }
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sql(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sql(err)
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
