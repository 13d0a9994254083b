//! # Index Specifications

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sort direction of one index key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexDirection {
    Ascending,
    Descending,
}

impl IndexDirection {
    fn suffix(&self) -> &'static str {
        match self {
            IndexDirection::Ascending => "1",
            IndexDirection::Descending => "-1",
        }
    }
}

/// An index declared by a document class on its backing collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<(String, IndexDirection)>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self::compound(vec![(field.into(), IndexDirection::Ascending)])
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::compound(vec![(field.into(), IndexDirection::Descending)])
    }

    pub fn compound(keys: Vec<(String, IndexDirection)>) -> Self {
        Self {
            keys,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Index name derived from its keys, e.g. `label_1_score_-1`
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, direction)| format!("{}_{}", field, direction.suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Extracts the key tuple of a document for uniqueness checks.
    ///
    /// Returns `None` when any key field is missing; such documents are
    /// not constrained by the index.
    pub fn key_of(&self, document: &Value) -> Option<Vec<Value>> {
        self.keys
            .iter()
            .map(|(field, _)| document.get(field).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_names() {
        assert_eq!(IndexSpec::ascending("name").name(), "name_1");
        assert_eq!(
            IndexSpec::compound(vec![
                ("label".into(), IndexDirection::Ascending),
                ("score".into(), IndexDirection::Descending),
            ])
            .name(),
            "label_1_score_-1"
        );
    }

    #[test]
    fn test_key_of() {
        let index = IndexSpec::ascending("name").unique();
        assert_eq!(index.key_of(&json!({"name": "a"})), Some(vec![json!("a")]));
        assert_eq!(index.key_of(&json!({"other": 1})), None);
        assert!(index.unique);
    }
}
