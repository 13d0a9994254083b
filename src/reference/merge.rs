//! Path-set delta between two schemas
//!
//! Commit diffs the schema a reference was loaded with against its edited
//! schema and replays the delta onto the latest persisted schema. Changed
//! types are replayed without conflict detection: the last committer wins.

use std::collections::{BTreeMap, BTreeSet};

use crate::schema::{Field, Schema};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDelta {
    pub added: BTreeMap<String, Field>,
    pub changed: BTreeMap<String, Field>,
    pub removed: BTreeSet<String>,
}

impl SchemaDelta {
    pub fn diff(original: &Schema, edited: &Schema) -> Self {
        let mut delta = SchemaDelta::default();

        for (path, field) in edited {
            match original.get(path) {
                None => {
                    delta.added.insert(path.clone(), field.clone());
                }
                Some(before) if before.field_type != field.field_type => {
                    delta.changed.insert(path.clone(), field.clone());
                }
                Some(_) => {}
            }
        }

        delta.removed = original
            .keys()
            .filter(|path| !edited.contains_key(*path))
            .cloned()
            .collect();

        delta
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    pub fn apply(&self, latest: &mut Schema) {
        for (path, field) in self.added.iter().chain(&self.changed) {
            latest.insert(path.clone(), field.clone());
        }
        for path in &self.removed {
            latest.remove(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn schema(fields: &[(&str, FieldType)]) -> Schema {
        fields
            .iter()
            .map(|(path, ty)| (path.to_string(), Field::new(*path, ty.clone())))
            .collect()
    }

    #[test]
    fn test_diff_classifies_paths() {
        let original = schema(&[("a", FieldType::int()), ("b", FieldType::int())]);
        let edited = schema(&[("a", FieldType::string()), ("c", FieldType::bool())]);

        let delta = SchemaDelta::diff(&original, &edited);
        assert_eq!(delta.added.keys().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(delta.changed.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(delta.removed.iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_unchanged_schema_has_empty_delta() {
        let original = schema(&[("a", FieldType::int())]);
        assert!(SchemaDelta::diff(&original, &original.clone()).is_empty());
    }

    #[test]
    fn test_apply_keeps_concurrent_additions() {
        let original = schema(&[("a", FieldType::int())]);
        let edited = schema(&[("a", FieldType::int()), ("mine", FieldType::int())]);
        let mut latest = schema(&[("a", FieldType::int()), ("theirs", FieldType::int())]);

        SchemaDelta::diff(&original, &edited).apply(&mut latest);
        assert_eq!(
            latest.keys().collect::<Vec<_>>(),
            vec!["a", "mine", "theirs"]
        );
    }

    #[test]
    fn test_apply_changed_type_overwrites_latest() {
        let original = schema(&[("a", FieldType::int())]);
        let edited = schema(&[("a", FieldType::float())]);
        let mut latest = schema(&[("a", FieldType::string())]);

        SchemaDelta::diff(&original, &edited).apply(&mut latest);
        assert_eq!(latest["a"].field_type(), Some(&FieldType::float()));
    }

    #[test]
    fn test_apply_removal() {
        let original = schema(&[("a", FieldType::int()), ("b", FieldType::int())]);
        let edited = schema(&[("a", FieldType::int())]);
        let mut latest = original.clone();

        SchemaDelta::diff(&original, &edited).apply(&mut latest);
        assert!(!latest.contains_key("b"));
    }
}
