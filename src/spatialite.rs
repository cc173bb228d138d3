use std::path::{Path, PathBuf};

use crate::error::{ImportError, Result};
use crate::store::Database;

/// Well-known SpatiaLite module locations, probed in order.
pub const SPATIALITE_PATHS: &[&str] = &[
    "/usr/lib/x86_64-linux-gnu/mod_spatialite.so",
    "/usr/lib/aarch64-linux-gnu/mod_spatialite.so",
    "/usr/lib/mod_spatialite.so",
    "/usr/lib/mod_spatialite.dylib",
    "/usr/local/lib/mod_spatialite.so",
    "/usr/local/lib/mod_spatialite.dylib",
    "/opt/homebrew/lib/mod_spatialite.dylib",
];

/// First existing well-known module path, if any.
pub fn find_spatialite() -> Option<PathBuf> {
    SPATIALITE_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// Resolve the module to load. An explicit override always wins and must
/// exist; otherwise fall back to auto-discovery.
pub(crate) fn resolve_module(configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        Some(path) => Err(ImportError::SpatialExtensionUnavailable {
            configured: Some(path.to_path_buf()),
        }),
        None => find_spatialite().ok_or(ImportError::SpatialExtensionUnavailable {
            configured: None,
        }),
    }
}

impl Database {
    /// Load the SpatiaLite extension and initialize its metadata tables.
    ///
    /// Loading happens once per connection; metadata initialization is
    /// skipped when the database already carries `spatial_ref_sys`.
    pub fn init_spatialite(&self, module: &Path) -> Result<()> {
        if !self.spatialite_loaded.get() {
            unsafe {
                let _guard = rusqlite::LoadExtensionGuard::new(&self.conn)?;
                self.conn.load_extension(module, None::<&str>)?;
            }
            self.spatialite_loaded.set(true);
        }
        if !self.table_exists("spatial_ref_sys")? {
            self.conn
                .query_row("SELECT InitSpatialMetadata(1)", [], |_| Ok(()))?;
        }
        Ok(())
    }

    /// Add a spatial geometry column unless the table already has one by
    /// that name.
    pub fn ensure_geometry_column(&self, table: &str, column: &str) -> Result<()> {
        if self.column_names(table)?.iter().any(|name| name == column) {
            return Ok(());
        }
        self.conn.query_row(
            "SELECT AddGeometryColumn(?1, ?2, 4326, 'GEOMETRY', 2)",
            rusqlite::params![table, column],
            |_| Ok(()),
        )?;
        Ok(())
    }

    /// Build a spatial index over `column`. Safe to call again once built.
    pub fn create_spatial_index(&self, table: &str, column: &str) -> Result<()> {
        let index_table = format!("idx_{table}_{column}");
        if self.table_exists(&index_table)? {
            return Ok(());
        }
        self.conn.query_row(
            "SELECT CreateSpatialIndex(?1, ?2)",
            rusqlite::params![table, column],
            |_| Ok(()),
        )?;
        Ok(())
    }
}
