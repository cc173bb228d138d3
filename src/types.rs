use std::fmt;

use rusqlite::types::Value;

use crate::error::{ImportError, Result};

/// SQLite storage class assigned to an inferred column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Blob,
}

impl ColumnType {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }

    /// The storage class of a concrete value, `None` for NULL.
    pub(crate) fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Integer(_) => Some(Self::Integer),
            Value::Real(_) => Some(Self::Float),
            Value::Text(_) => Some(Self::Text),
            Value::Blob(_) => Some(Self::Blob),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Blob => "blob",
        })
    }
}

/// A named column with its storage class.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

/// One projected row. Columns keep first-seen order; re-inserting a name
/// overwrites the value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self
            .columns
            .iter_mut()
            .find(|(existing, _)| *existing == name)
        {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, value)| value)
    }
}

/// Infer one column spec per distinct column name across `rows`, in
/// first-seen order, widening over heterogeneous samples.
pub(crate) fn infer_column_types<'a, I>(rows: I, exclude: Option<&str>) -> Result<Vec<ColumnSpec>>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut inferred: Vec<(String, Option<ColumnType>)> = Vec::new();
    for row in rows {
        for (name, value) in row.iter() {
            if exclude == Some(name) {
                continue;
            }
            let seen = ColumnType::of(value);
            match inferred.iter_mut().find(|(existing, _)| existing == name) {
                Some((_, current)) => *current = widen(name, *current, seen)?,
                None => inferred.push((name.to_string(), seen)),
            }
        }
    }
    Ok(inferred
        .into_iter()
        .map(|(name, column_type)| ColumnSpec {
            name,
            // An all-NULL column still needs a declared type.
            column_type: column_type.unwrap_or(ColumnType::Text),
        })
        .collect())
}

fn widen(
    column: &str,
    current: Option<ColumnType>,
    seen: Option<ColumnType>,
) -> Result<Option<ColumnType>> {
    use ColumnType::{Float, Integer, Text};

    let (a, b) = match (current, seen) {
        (None, other) | (other, None) => return Ok(other),
        (Some(a), Some(b)) => (a, b),
    };
    match (a, b) {
        _ if a == b => Ok(Some(a)),
        (Integer, Float) | (Float, Integer) => Ok(Some(Float)),
        (Integer | Float, Text) | (Text, Integer | Float) => Ok(Some(Text)),
        _ => Err(ImportError::ColumnTypeConflict {
            column: column.to_string(),
            existing: a,
            inferred: b,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: Vec<(&str, Value)>) -> Row {
        let mut row = Row::new();
        for (name, value) in pairs {
            row.insert(name, value);
        }
        row
    }

    #[test]
    fn insert_overwrites_in_place() {
        let mut row = row(vec![
            ("a", Value::Integer(1)),
            ("b", Value::Integer(2)),
        ]);
        row.insert("a", Value::Text("one".to_string()));

        let names: Vec<&str> = row.column_names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(row.get("a"), Some(&Value::Text("one".to_string())));
    }

    #[test]
    fn infers_columns_in_first_seen_order() {
        let rows = vec![
            row(vec![("id", Value::Integer(1)), ("name", Value::Text("a".into()))]),
            row(vec![
                ("id", Value::Integer(2)),
                ("score", Value::Real(0.5)),
                ("name", Value::Text("b".into())),
            ]),
        ];
        let specs = infer_column_types(&rows, None).expect("infer");
        let names: Vec<&str> = specs.iter().map(|spec| spec.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "score"]);
        assert_eq!(specs[0].column_type, ColumnType::Integer);
        assert_eq!(specs[2].column_type, ColumnType::Float);
    }

    #[test]
    fn excluded_column_is_skipped() {
        let rows = vec![row(vec![
            ("name", Value::Text("a".into())),
            ("geometry", Value::Text("{}".into())),
        ])];
        let specs = infer_column_types(&rows, Some("geometry")).expect("infer");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "name");
    }

    #[test]
    fn widens_integer_to_float_to_text() {
        let rows = vec![
            row(vec![("v", Value::Integer(1))]),
            row(vec![("v", Value::Real(2.5))]),
        ];
        let specs = infer_column_types(&rows, None).expect("infer");
        assert_eq!(specs[0].column_type, ColumnType::Float);

        let rows = vec![
            row(vec![("v", Value::Real(2.5))]),
            row(vec![("v", Value::Text("x".into()))]),
        ];
        let specs = infer_column_types(&rows, None).expect("infer");
        assert_eq!(specs[0].column_type, ColumnType::Text);
    }

    #[test]
    fn all_null_column_defaults_to_text() {
        let rows = vec![row(vec![("v", Value::Null)]), row(vec![("v", Value::Null)])];
        let specs = infer_column_types(&rows, None).expect("infer");
        assert_eq!(specs[0].column_type, ColumnType::Text);
    }

    #[test]
    fn null_does_not_narrow_an_inferred_type() {
        let rows = vec![
            row(vec![("v", Value::Integer(1))]),
            row(vec![("v", Value::Null)]),
        ];
        let specs = infer_column_types(&rows, None).expect("infer");
        assert_eq!(specs[0].column_type, ColumnType::Integer);
    }

    #[test]
    fn blob_against_text_is_a_conflict() {
        let rows = vec![
            row(vec![("v", Value::Text("x".into()))]),
            row(vec![("v", Value::Blob(vec![1, 2]))]),
        ];
        let err = infer_column_types(&rows, None).expect_err("conflict");
        match err {
            ImportError::ColumnTypeConflict { column, .. } => assert_eq!(column, "v"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
