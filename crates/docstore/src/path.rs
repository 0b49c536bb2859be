//! Document paths and dotted field paths

use crate::error::StoreError;
use crate::Document;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Location of a single document: `collection/id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    /// Create a path from its two segments
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Collection name
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Document id within the collection
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((collection, id))
                if !collection.is_empty() && !id.is_empty() && !id.contains('/') =>
            {
                Ok(Self::new(collection, id))
            }
            _ => Err(StoreError::InvalidPath(s.to_string())),
        }
    }
}

fn segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(StoreError::InvalidFieldPath(path.to_string()));
    }
    Ok(parts)
}

/// Look up a (possibly nested) field by dotted path, e.g. `"hallLight.status"`
#[must_use]
pub fn get_field<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Set a field by dotted path, creating intermediate maps as needed.
///
/// Non-map values found along the path are replaced by maps, matching the
/// merge semantics of hosted document databases.
pub fn set_field(document: &mut Document, path: &str, value: Value) -> Result<(), StoreError> {
    let parts = segments(path)?;
    let Some((last, parents)) = parts.split_last() else {
        return Err(StoreError::InvalidFieldPath(path.to_string()));
    };

    let mut current = document;
    for part in parents {
        let entry = current
            .entry((*part).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(map) = entry else {
            unreachable!("entry was just replaced by an object");
        };
        current = map;
    }
    current.insert((*last).to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_doc_path() {
        let path: DocPath = "devices/status".parse().unwrap();
        assert_eq!(path.collection(), "devices");
        assert_eq!(path.id(), "status");
        assert_eq!(path.to_string(), "devices/status");

        assert!("devices".parse::<DocPath>().is_err());
        assert!("devices/".parse::<DocPath>().is_err());
        assert!("a/b/c".parse::<DocPath>().is_err());
    }

    #[test]
    fn test_get_nested_field() {
        let d = doc(json!({"hallLight": {"status": true, "brightness": 40}}));
        assert_eq!(get_field(&d, "hallLight.status"), Some(&json!(true)));
        assert_eq!(get_field(&d, "hallLight.color"), None);
        assert_eq!(get_field(&d, "hallLight.status.deeper"), None);
    }

    #[test]
    fn test_set_field_leaves_siblings_untouched() {
        let mut d = doc(json!({"hallLight": {"status": false, "brightness": 100}}));
        set_field(&mut d, "hallLight.status", json!(true)).unwrap();
        assert_eq!(d, doc(json!({"hallLight": {"status": true, "brightness": 100}})));
    }

    #[test]
    fn test_set_field_creates_intermediate_maps() {
        let mut d = Document::new();
        set_field(&mut d, "garageLight.status", json!(true)).unwrap();
        assert_eq!(d, doc(json!({"garageLight": {"status": true}})));
    }

    #[test]
    fn test_set_field_rejects_empty_segment() {
        let mut d = Document::new();
        assert!(matches!(
            set_field(&mut d, "hallLight..status", json!(true)),
            Err(StoreError::InvalidFieldPath(_))
        ));
        assert!(d.is_empty());
    }
}
