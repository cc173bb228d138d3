use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;

use rusqlite::params_from_iter;

use crate::error::Result;
use crate::types::{ColumnSpec, ColumnType, Row};

/// Per-column SQL expressions applied in place of a plain placeholder when
/// writing, e.g. `geometry -> GeomFromText(?, 4326)`. Each expression must
/// contain exactly one `?`.
pub type Conversions = HashMap<String, String>;

#[derive(Debug)]
/// SQLite connection wrapper with the schema-on-write helpers the import
/// pipeline drives: table creation from column specs, column addition, and
/// batched insert/upsert of dynamic rows.
pub struct Database {
    pub(crate) conn: rusqlite::Connection,
    pub(crate) spatialite_loaded: Cell<bool>,
}

impl Database {
    /// Open or create a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_connection(rusqlite::Connection::open(path)?))
    }

    /// Create a transient in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(
            rusqlite::Connection::open_in_memory()?,
        ))
    }

    fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            conn,
            spatialite_loaded: Cell::new(false),
        }
    }

    pub(crate) fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }

    /// Names of the user tables.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Resolve the table's columns from SQLite metadata, in table order.
    pub fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT name FROM pragma_table_info('{table}')");
        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Create a table from column specs; `pk` marks that column PRIMARY KEY.
    pub fn create_table(
        &self,
        table: &str,
        columns: &[ColumnSpec],
        pk: Option<&str>,
    ) -> Result<()> {
        let defs = columns
            .iter()
            .map(|spec| {
                let mut def = format!(r#""{}" {}"#, spec.name, spec.column_type.as_sql());
                if pk == Some(spec.name.as_str()) {
                    def.push_str(" PRIMARY KEY");
                }
                def
            })
            .collect::<Vec<String>>()
            .join(", ");
        let sql = format!(r#"CREATE TABLE "{table}" ({defs})"#);
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    pub fn add_column(&self, table: &str, column: &str, column_type: ColumnType) -> Result<()> {
        let sql = format!(
            r#"ALTER TABLE "{table}" ADD COLUMN "{column}" {}"#,
            column_type.as_sql()
        );
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    pub fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        let sql = format!(r#"ALTER TABLE "{table}" DROP COLUMN "{column}""#);
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    /// Insert every row. Repeated calls accumulate new rows.
    pub fn insert_all<I>(
        &self,
        table: &str,
        rows: I,
        alter: bool,
        conversions: &Conversions,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Row>>,
    {
        self.write_all(table, rows, None, alter, conversions)
    }

    /// Insert-or-update every row, keyed on `pk`.
    pub fn upsert_all<I>(
        &self,
        table: &str,
        rows: I,
        pk: &str,
        alter: bool,
        conversions: &Conversions,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Row>>,
    {
        self.write_all(table, rows, Some(pk), alter, conversions)
    }

    /// One transaction per call: an error from the row sequence or from
    /// SQLite rolls the whole batch back.
    fn write_all<I>(
        &self,
        table: &str,
        rows: I,
        pk: Option<&str>,
        alter: bool,
        conversions: &Conversions,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Row>>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let mut known_columns = self.column_names(table)?;
        let mut count = 0;
        for row in rows {
            let row = row?;
            if alter {
                for (name, value) in row.iter() {
                    if !known_columns.iter().any(|column| column == name) {
                        let column_type = ColumnType::of(value).unwrap_or(ColumnType::Text);
                        self.add_column(table, name, column_type)?;
                        known_columns.push(name.to_string());
                    }
                }
            }
            let sql = build_write_sql(table, &row, pk, conversions);
            let mut stmt = self.conn.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(row.values()))?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }
}

fn build_write_sql(table: &str, row: &Row, pk: Option<&str>, conversions: &Conversions) -> String {
    let columns = row
        .column_names()
        .map(|name| format!(r#""{name}""#))
        .collect::<Vec<String>>()
        .join(", ");
    let values = row
        .column_names()
        .map(|name| {
            conversions
                .get(name)
                .cloned()
                .unwrap_or_else(|| "?".to_string())
        })
        .collect::<Vec<String>>()
        .join(", ");
    let insert = format!(r#"INSERT INTO "{table}" ({columns}) VALUES ({values})"#);

    let Some(pk) = pk else {
        return insert;
    };

    let assignments = row
        .column_names()
        .filter(|name| *name != pk)
        .map(|name| format!(r#""{name}" = excluded."{name}""#))
        .collect::<Vec<String>>()
        .join(", ");
    if assignments.is_empty() {
        format!(r#"{insert} ON CONFLICT("{pk}") DO NOTHING"#)
    } else {
        format!(r#"{insert} ON CONFLICT("{pk}") DO UPDATE SET {assignments}"#)
    }
}
