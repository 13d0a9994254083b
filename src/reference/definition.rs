//! Persisted dataset definitions
//!
//! One definition document per dataset lives in the definitions collection,
//! keyed by an immutable `_id` and a unique `name`. Field definitions are
//! kept sorted by path.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{SchemaError, SchemaResult, TypeDescriptor};
use crate::store::{StoreError, StoreResult};
use crate::validator::Collections;

/// Kind of media a dataset's samples hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Group,
    PointCloud,
    ThreeD,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Group => "group",
            MediaType::PointCloud => "point_cloud",
            MediaType::ThreeD => "three_d",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "group" => Ok(MediaType::Group),
            "point_cloud" => Ok(MediaType::PointCloud),
            "three_d" => Ok(MediaType::ThreeD),
            other => Err(SchemaError::InvalidKey(format!("unknown media type '{}'", other))),
        }
    }
}

/// Persisted definition of one schema path.
///
/// `collection` is set only for document-typed paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub path: String,
    #[serde(rename = "type")]
    pub descriptor: TypeDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl FieldDefinition {
    pub fn is_document(&self) -> bool {
        self.collection.is_some()
    }
}

/// Persisted root aggregate of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDefinition {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_loaded_at: DateTime<Utc>,
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub media_type: Option<MediaType>,
    pub persistent: bool,
    pub root: bool,
    pub version: String,
    /// Collections of document paths removed from the schema. They keep
    /// their data until the dataset is deleted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retired_collections: Vec<String>,
}

impl DatasetDefinition {
    pub fn new(
        name: impl Into<String>,
        mut fields: Vec<FieldDefinition>,
        media_type: Option<MediaType>,
        persistent: bool,
        version: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        fields.sort_by(|a, b| a.path.cmp(&b.path));

        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            last_loaded_at: now,
            fields,
            media_type,
            persistent,
            root: true,
            version: version.into(),
            retired_collections: Vec::new(),
        }
    }

    /// Id as stored in `_id`
    pub fn key(&self) -> String {
        self.id.to_string()
    }

    /// Replaces the field definitions, keeping them sorted by path
    pub fn set_fields(&mut self, mut fields: Vec<FieldDefinition>) {
        fields.sort_by(|a, b| a.path.cmp(&b.path));
        self.fields = fields;
    }

    /// Records `names` as retired unless a path in `live` still uses them.
    ///
    /// Retired names that became live again are dropped from the list.
    pub fn retire(&mut self, names: impl IntoIterator<Item = String>, live: &Collections) {
        let live: BTreeSet<&String> = live.values().collect();
        let mut retired: BTreeSet<String> = self.retired_collections.drain(..).collect();
        retired.extend(names);
        retired.retain(|name| !live.contains(name));
        self.retired_collections = retired.into_iter().collect();
    }

    pub fn to_document(&self) -> StoreResult<Value> {
        serde_json::to_value(self).map_err(StoreError::from)
    }

    pub fn from_document(document: Value) -> SchemaResult<Self> {
        serde_json::from_value(document)
            .map_err(|e| SchemaError::Store(StoreError::Serialization(e.to_string())))
    }
}

/// How a dataset is looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetKey {
    Name(String),
    Id(Uuid),
}

impl DatasetKey {
    /// Field and value to match in the definitions collection
    pub fn filter(&self) -> (&'static str, Value) {
        match self {
            DatasetKey::Name(name) => ("name", Value::from(name.as_str())),
            DatasetKey::Id(id) => ("_id", Value::from(id.to_string())),
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKey::Name(name) => f.write_str(name),
            DatasetKey::Id(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for DatasetKey {
    fn from(name: &str) -> Self {
        DatasetKey::Name(name.to_string())
    }
}

impl From<String> for DatasetKey {
    fn from(name: String) -> Self {
        DatasetKey::Name(name)
    }
}

impl From<Uuid> for DatasetKey {
    fn from(id: Uuid) -> Self {
        DatasetKey::Id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarKind;

    fn field(path: &str) -> FieldDefinition {
        FieldDefinition {
            path: path.into(),
            descriptor: TypeDescriptor::scalar(ScalarKind::String),
            collection: None,
        }
    }

    #[test]
    fn test_new_sorts_fields() {
        let def = DatasetDefinition::new("ds1", vec![field("b"), field("a")], None, false, "0.1.0");
        let paths: Vec<&str> = def.fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);
        assert!(def.root);
        assert_eq!(def.created_at, def.last_loaded_at);
    }

    #[test]
    fn test_document_shape() {
        let mut def = DatasetDefinition::new("ds1", vec![field("label")], None, true, "0.1.0");
        def.media_type = Some(MediaType::PointCloud);
        let doc = def.to_document().unwrap();

        assert_eq!(doc["_id"], Value::from(def.key()));
        assert_eq!(doc["name"], "ds1");
        assert_eq!(doc["media_type"], "point_cloud");
        assert_eq!(doc["fields"][0]["path"], "label");
        assert_eq!(doc["fields"][0]["type"]["kind"], "scalar");
        assert!(doc["fields"][0].get("collection").is_none());

        assert_eq!(DatasetDefinition::from_document(doc).unwrap(), def);
    }

    #[test]
    fn test_retire_skips_live_names() {
        let mut def = DatasetDefinition::new("ds1", vec![field("label")], None, false, "0.1.0");
        def.retired_collections = vec!["meta.1".into(), "tags.1".into()];

        let mut live = Collections::new();
        live.insert("".into(), "sample.1".into());
        live.insert("tags".into(), "tags.1".into());
        def.retire(vec!["sample.1".to_string(), "other.1".to_string()], &live);

        assert_eq!(def.retired_collections, vec!["meta.1", "other.1"]);
        let doc = def.to_document().unwrap();
        assert_eq!(DatasetDefinition::from_document(doc).unwrap(), def);
    }

    #[test]
    fn test_from_malformed_document() {
        let err = DatasetDefinition::from_document(serde_json::json!({"name": 3})).unwrap_err();
        assert_eq!(err.code(), "AERO_STORE_SERIALIZATION_ERROR");
    }

    #[test]
    fn test_media_type_parse() {
        assert_eq!("video".parse::<MediaType>().unwrap(), MediaType::Video);
        assert!("audio".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_key_filter() {
        let id = Uuid::new_v4();
        assert_eq!(DatasetKey::from("ds1").filter(), ("name", Value::from("ds1")));
        assert_eq!(DatasetKey::from(id).filter(), ("_id", Value::from(id.to_string())));
    }
}
