use std::io::BufRead;

use geojson::Feature;
use serde_json::Value;

use crate::error::{ImportError, Result};

/// Lazy, single-pass sequence of features parsed from one input source.
///
/// Whole documents are parsed up front (the root must be inspected anyway);
/// newline-delimited input is parsed one line at a time as the iterator is
/// driven. Either way the sequence can be consumed exactly once.
#[derive(Debug)]
pub struct FeatureReader<R: BufRead> {
    source: Source<R>,
}

#[derive(Debug)]
enum Source<R> {
    Document(std::vec::IntoIter<Feature>),
    Lines(std::io::Lines<R>),
}

impl<R: BufRead> FeatureReader<R> {
    /// Parse a whole GeoJSON document: a single Feature or a
    /// FeatureCollection.
    pub fn from_document(reader: R) -> Result<Self> {
        let root: Value = serde_json::from_reader(reader)?;
        let Value::Object(mut root) = root else {
            return Err(ImportError::MalformedRoot);
        };
        let geojson_type = root.get("type").and_then(Value::as_str).map(str::to_owned);
        let features = match geojson_type.as_deref() {
            Some("Feature") => vec![feature_from_value(Value::Object(root))?],
            Some("FeatureCollection") => match root.remove("features") {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .map(feature_from_value)
                    .collect::<Result<Vec<Feature>>>()?,
                Some(Value::Null) | None => Vec::new(),
                Some(_) => {
                    return Err(ImportError::InvalidFeature(
                        "\"features\" must be an array".to_string(),
                    ));
                }
            },
            _ => return Err(ImportError::NotGeoJson),
        };
        Ok(Self {
            source: Source::Document(features.into_iter()),
        })
    }

    /// One feature per non-blank line of newline-delimited input.
    pub fn from_lines(reader: R) -> Self {
        Self {
            source: Source::Lines(reader.lines()),
        }
    }
}

impl<R: BufRead> Iterator for FeatureReader<R> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Document(features) => features.next().map(Ok),
            Source::Lines(lines) => loop {
                match lines.next()? {
                    Err(err) => return Some(Err(err.into())),
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => {
                        let feature = serde_json::from_str::<Value>(&line)
                            .ok()
                            .and_then(|value| feature_from_value(value).ok());
                        return Some(match feature {
                            Some(feature) => Ok(feature),
                            None => Err(ImportError::MalformedLine { line }),
                        });
                    }
                }
            },
        }
    }
}

/// Deserialize one JSON value as a Feature. A literal `null` id is dropped
/// first: the `geojson` crate rejects it, while GeoJSON treats it as absent.
fn feature_from_value(mut value: Value) -> Result<Feature> {
    if let Value::Object(object) = &mut value {
        if matches!(object.get("id"), Some(Value::Null)) {
            object.remove("id");
        }
    }
    serde_json::from_value(value).map_err(|err| ImportError::InvalidFeature(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn document(input: &str) -> Result<Vec<Feature>> {
        FeatureReader::from_document(Cursor::new(input.to_string()))?.collect()
    }

    #[test]
    fn reads_a_single_feature_document() {
        let features = document(
            r#"{"type": "Feature", "properties": {"name": "a"}, "geometry": null}"#,
        )
        .expect("read");
        assert_eq!(features.len(), 1);
        assert!(features[0].geometry.is_none());
    }

    #[test]
    fn reads_a_feature_collection_in_order() {
        let features = document(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"n": 1}, "geometry": null},
                {"type": "Feature", "properties": {"n": 2}, "geometry": null}
            ]}"#,
        )
        .expect("read");
        assert_eq!(features.len(), 2);
        let first = features[0].properties.as_ref().expect("properties");
        assert_eq!(first["n"], serde_json::json!(1));
    }

    #[test]
    fn collection_without_features_is_empty() {
        let features = document(r#"{"type": "FeatureCollection"}"#).expect("read");
        assert!(features.is_empty());
    }

    #[test]
    fn array_root_is_malformed() {
        let err = document(r#"[1, 2, 3]"#).expect_err("array root");
        assert!(matches!(err, ImportError::MalformedRoot));
        assert_eq!(err.to_string(), "GeoJSON root must be an object");
    }

    #[test]
    fn bare_geometry_root_is_not_geojson() {
        let err = document(r#"{"type": "Polygon", "coordinates": []}"#).expect_err("polygon root");
        assert!(matches!(err, ImportError::NotGeoJson));
        assert_eq!(
            err.to_string(),
            "GeoJSON must be a Feature or a FeatureCollection"
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = document("{not json").expect_err("invalid json");
        assert!(matches!(err, ImportError::Json(_)));
    }

    #[test]
    fn null_id_is_treated_as_absent() {
        let features = document(
            r#"{"type": "Feature", "id": null, "properties": {}, "geometry": null}"#,
        )
        .expect("read");
        assert!(features[0].id.is_none());
    }

    #[test]
    fn lines_skip_blanks() {
        let input = concat!(
            r#"{"type": "Feature", "properties": {"n": 1}, "geometry": null}"#,
            "\n\n   \n",
            r#"{"type": "Feature", "properties": {"n": 2}, "geometry": null}"#,
            "\n",
        );
        let features: Result<Vec<Feature>> =
            FeatureReader::from_lines(Cursor::new(input.to_string())).collect();
        assert_eq!(features.expect("read").len(), 2);
    }

    #[test]
    fn corrupt_line_fails_with_its_content() {
        let input = concat!(
            r#"{"type": "Feature", "properties": {}, "geometry": null}"#,
            "\n{broken\n",
        );
        let mut reader = FeatureReader::from_lines(Cursor::new(input.to_string()));
        assert!(reader.next().expect("first").is_ok());
        let err = reader.next().expect("second").expect_err("corrupt line");
        match err {
            ImportError::MalformedLine { line } => assert_eq!(line, "{broken"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn line_that_is_not_a_feature_fails() {
        let input = "{\"type\": \"Polygon\", \"coordinates\": []}\n";
        let mut reader = FeatureReader::from_lines(Cursor::new(input.to_string()));
        let err = reader.next().expect("line").expect_err("not a feature");
        assert!(matches!(err, ImportError::MalformedLine { .. }));
    }
}
