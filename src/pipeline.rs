use std::path::PathBuf;

use geojson::Feature;
use geojson::feature::Id;
use rusqlite::types::Value;

use crate::error::{ImportError, Result};
use crate::spatialite;
use crate::store::{Conversions, Database};
use crate::types::{ColumnSpec, ColumnType, Row, infer_column_types};

/// Column every projected row carries its geometry in.
const GEOMETRY_COLUMN: &str = "geometry";

/// How many leading features inform the primary-key and schema decisions.
const SAMPLE_SIZE: usize = 100;

/// Per-invocation import settings.
#[derive(Clone, Debug, Default)]
pub struct ImportOptions {
    /// Explicit primary-key column; inferred from sampled ids when unset.
    pub pk: Option<String>,
    /// Permit adding missing columns on write.
    pub alter: bool,
    /// Bundle all properties into one JSON column of this name instead of
    /// flattening them.
    pub properties: Option<String>,
    /// Convert geometries to SpatiaLite geometries.
    pub spatialite: bool,
    /// Additionally build a spatial index over the geometry column.
    pub spatial_index: bool,
    /// Explicit SpatiaLite module path, overriding auto-discovery.
    pub spatialite_mod: Option<PathBuf>,
}

impl ImportOptions {
    /// Spatial conversion is active when requested explicitly or implied by
    /// an index request or an explicit module path.
    fn spatial(&self) -> bool {
        self.spatialite || self.spatial_index || self.spatialite_mod.is_some()
    }
}

/// Import one input's features into `table`, creating or extending the table
/// as needed. Returns the number of rows written.
///
/// Repeated calls against the same table are idempotent when a primary key
/// is in play (explicit, or inferred because every sampled feature carries
/// an id); without one, every call appends fresh rows.
pub fn import_features<I>(
    db: &Database,
    table: &str,
    features: I,
    options: &ImportOptions,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<Feature>>,
{
    let spatial = options.spatial();
    if spatial {
        let module = spatialite::resolve_module(options.spatialite_mod.as_deref())?;
        db.init_spatialite(&module)?;
    }

    let mut source = features.into_iter();
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    for feature in source.by_ref().take(SAMPLE_SIZE) {
        sample.push(feature?);
    }

    let pk = options.pk.clone().or_else(|| infer_primary_key(&sample));
    if options.pk.is_none() && pk.is_some() {
        tracing::debug!("using feature ids as primary key for {table}");
    }

    let sample_rows = sample
        .iter()
        .map(|feature| project_feature(feature, options, spatial))
        .collect::<Result<Vec<Row>>>()?;

    if !sample_rows.is_empty() && !db.table_exists(table)? {
        create_table_from_sample(db, table, &sample_rows, pk.as_deref(), spatial)?;
        tracing::debug!("created table {table}");
    }

    let mut conversions = Conversions::new();
    if spatial {
        conversions.insert(
            GEOMETRY_COLUMN.to_string(),
            "GeomFromText(?, 4326)".to_string(),
        );
    }

    // Replay the sampled rows in front of the lazily-projected remainder so
    // nothing is dropped or reordered.
    let rows = sample_rows.into_iter().map(Ok).chain(
        source.map(|feature| feature.and_then(|feature| project_feature(&feature, options, spatial))),
    );
    let count = match pk.as_deref() {
        Some(pk) => db.upsert_all(table, rows, pk, options.alter, &conversions)?,
        None => db.insert_all(table, rows, options.alter, &conversions)?,
    };
    tracing::debug!("wrote {count} rows to {table}");

    if options.spatial_index && db.table_exists(table)? {
        db.create_spatial_index(table, GEOMETRY_COLUMN)?;
    }
    Ok(count)
}

/// Use `id` as the key when every sampled feature carries one.
fn infer_primary_key(sample: &[Feature]) -> Option<String> {
    (!sample.is_empty() && sample.iter().all(|feature| feature.id.is_some()))
        .then(|| "id".to_string())
}

fn create_table_from_sample(
    db: &Database,
    table: &str,
    rows: &[Row],
    pk: Option<&str>,
    spatial: bool,
) -> Result<()> {
    if !spatial {
        let columns = infer_column_types(rows, None)?;
        return db.create_table(table, &columns, pk);
    }

    // The geometry column is excluded here: it is added as a spatial column
    // after creation, not declared as a plain one.
    let mut columns = infer_column_types(rows, Some(GEOMETRY_COLUMN))?;
    let placeholder = columns.is_empty();
    if placeholder {
        columns.push(ColumnSpec {
            name: "placeholder".to_string(),
            column_type: ColumnType::Text,
        });
    }
    db.create_table(table, &columns, pk)?;
    db.ensure_geometry_column(table, GEOMETRY_COLUMN)?;
    if placeholder {
        // SQLite cannot drop a table's last column, so the geometry column
        // must land before the placeholder goes.
        db.drop_column(table, "placeholder")?;
    }
    Ok(())
}

/// Project one feature onto a flat row: `id` first, then bundled or
/// flattened properties (flattened properties overwrite `id` on a name
/// collision), then the geometry.
fn project_feature(feature: &Feature, options: &ImportOptions, spatial: bool) -> Result<Row> {
    let mut row = Row::new();

    if let Some(id) = &feature.id {
        row.insert("id", id_value(id));
    }

    match &options.properties {
        Some(bundle) => {
            let properties = feature.properties.clone().unwrap_or_default();
            row.insert(bundle.clone(), Value::Text(serde_json::to_string(&properties)?));
        }
        None => {
            if let Some(properties) = &feature.properties {
                for (name, value) in properties {
                    row.insert(name.clone(), sql_value(value)?);
                }
            }
        }
    }

    let geometry = match &feature.geometry {
        Some(geometry) if spatial => Value::Text(geometry_to_wkt(geometry)?),
        Some(geometry) => Value::Text(serde_json::to_string(geometry)?),
        None => Value::Null,
    };
    row.insert(GEOMETRY_COLUMN, geometry);
    Ok(row)
}

fn id_value(id: &Id) -> Value {
    match id {
        Id::String(id) => Value::Text(id.clone()),
        Id::Number(id) => number_value(id),
    }
}

fn number_value(number: &serde_json::Number) -> Value {
    match number.as_i64() {
        Some(value) => Value::Integer(value),
        None => Value::Real(number.as_f64().unwrap_or(f64::NAN)),
    }
}

/// Map one JSON property value onto a SQLite storage value. Nested
/// structures are stored as JSON text.
fn sql_value(value: &serde_json::Value) -> Result<Value> {
    Ok(match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(value) => Value::Integer(i64::from(*value)),
        serde_json::Value::Number(value) => number_value(value),
        serde_json::Value::String(value) => Value::Text(value.clone()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            Value::Text(serde_json::to_string(value)?)
        }
    })
}

/// Convert a GeoJSON geometry object into well-known text.
fn geometry_to_wkt(geometry: &geojson::Geometry) -> Result<String> {
    let geometry = geo_types::Geometry::<f64>::try_from(geometry)
        .map_err(|err| ImportError::Geometry(err.to_string()))?;
    write_wkt(&geometry)
}

fn write_wkt<G: geo_traits::GeometryTrait<T = f64>>(geometry: &G) -> Result<String> {
    let mut wkt = String::new();
    wkt::to_wkt::write_geometry(&mut wkt, geometry)
        .map_err(|err| ImportError::Geometry(err.to_string()))?;
    Ok(wkt)
}
