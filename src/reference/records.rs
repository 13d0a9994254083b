//! Root-document records and their stored form
//!
//! A record holds the top-level values of one root document. Values are
//! checked against the live schema on assignment; list and dict values
//! become validating containers.
//!
//! Stored form:
//! - datetimes as `{"$date": "<rfc3339>"}`
//! - nested documents are written to the backing collection of the path
//!   they appear under and replaced by `{"$oid": "<id>"}`

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as Json};
use uuid::Uuid;

use crate::containers::{validate_field, ValidatingDict, ValidatingList, Validated};
use crate::schema::{
    join_path, Document, DocumentClass, FieldType, ScalarKind, Schema, SchemaError, SchemaHandle,
    SchemaResult, Value,
};
use crate::store::{Session, StoreError};
use crate::validator::Collections;

/// One root document of a dataset
#[derive(Debug, Clone)]
pub struct Record {
    id: Uuid,
    class: DocumentClass,
    schema: SchemaHandle,
    fields: BTreeMap<String, Validated>,
}

impl Record {
    pub(crate) fn new(class: DocumentClass, schema: SchemaHandle) -> Self {
        Self::with_id(Uuid::new_v4(), class, schema)
    }

    fn with_id(id: Uuid, class: DocumentClass, schema: SchemaHandle) -> Self {
        Self {
            id,
            class,
            schema,
            fields: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn class(&self) -> &DocumentClass {
        &self.class
    }

    /// Assigns a top-level field after validating it.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> SchemaResult<()> {
        if name.is_empty() || name.contains('.') {
            return Err(SchemaError::InvalidKey(format!(
                "'{}' is not a top-level field name",
                name
            )));
        }
        let validated = validate_field(name, &self.schema, value.into())?;
        self.fields.insert(name.to_string(), validated);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Validated> {
        self.fields.get(name)
    }

    pub fn list_mut(&mut self, name: &str) -> Option<&mut ValidatingList> {
        match self.fields.get_mut(name) {
            Some(Validated::List(list)) => Some(list),
            _ => None,
        }
    }

    pub fn dict_mut(&mut self, name: &str) -> Option<&mut ValidatingDict> {
        match self.fields.get_mut(name) {
            Some(Validated::Dict(dict)) => Some(dict),
            _ => None,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Validated> {
        self.fields.remove(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn to_values(&self) -> BTreeMap<String, Value> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_value()))
            .collect()
    }
}

/// Encodes and decodes records against a dataset's collections
pub(crate) struct RecordCodec<'a> {
    schema: &'a Schema,
    collections: &'a Collections,
}

impl<'a> RecordCodec<'a> {
    pub(crate) fn new(schema: &'a Schema, collections: &'a Collections) -> Self {
        Self {
            schema,
            collections,
        }
    }

    /// Collection holding the root documents
    pub(crate) fn root_collection(&self) -> SchemaResult<&'a str> {
        self.collection_for("")
    }

    fn collection_for(&self, path: &str) -> SchemaResult<&'a str> {
        self.collections
            .get(path)
            .map(String::as_str)
            .ok_or_else(|| SchemaError::unresolvable(path, "no backing collection for document value"))
    }

    /// Writes the record and every document nested in it.
    pub(crate) fn save(&self, session: &dyn Session, record: &Record) -> SchemaResult<()> {
        let root = self.root_collection()?;
        let mut pending = Vec::new();

        let mut stored = Map::new();
        stored.insert("_id".into(), Json::from(record.id.to_string()));
        for (name, value) in record.to_values() {
            let encoded = encode_value(&value, &name, &mut pending);
            stored.insert(name, encoded);
        }

        while let Some((path, document)) = pending.pop() {
            let collection = self.collection_for(&path)?;
            let mut nested = Map::new();
            nested.insert("_id".into(), Json::from(document.id().to_string()));
            for (name, value) in document.fields() {
                let encoded = encode_value(value, &join_path(&path, name), &mut pending);
                nested.insert(name.clone(), encoded);
            }
            session.replace_one(
                collection,
                &document.id().to_string(),
                Json::Object(nested),
                true,
            )?;
        }

        session.replace_one(root, &record.id.to_string(), Json::Object(stored), true)?;
        Ok(())
    }

    /// Rebuilds a record from its stored root document.
    pub(crate) fn load(
        &self,
        session: &dyn Session,
        class: &DocumentClass,
        handle: &SchemaHandle,
        stored: &Json,
    ) -> SchemaResult<Record> {
        let object = stored
            .as_object()
            .ok_or_else(|| SchemaError::type_mismatch("", "document", json_kind(stored)))?;
        let id = parse_id("", object)?;

        let mut record = Record::with_id(id, class.clone(), handle.clone());
        for (name, value) in object.iter().filter(|(k, _)| k.as_str() != "_id") {
            // Values of fields removed from the schema are left behind
            let Some(field) = self.schema.get(name) else {
                continue;
            };
            let field_type = field.require_type(name)?;
            let decoded = self.decode(session, value, field_type, name)?;
            if !decoded.is_null() {
                record.set(name, decoded)?;
            }
        }
        Ok(record)
    }

    fn decode(
        &self,
        session: &dyn Session,
        json: &Json,
        expected: &FieldType,
        path: &str,
    ) -> SchemaResult<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        let mismatch = || SchemaError::type_mismatch(path, expected.type_name(), json_kind(json));

        match expected {
            FieldType::Scalar(ScalarKind::Any) => Ok(decode_any(json)),
            FieldType::Scalar(ScalarKind::Bool) => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
            FieldType::Scalar(ScalarKind::Int) => json.as_i64().map(Value::Int).ok_or_else(mismatch),
            FieldType::Scalar(ScalarKind::Float) => {
                json.as_f64().map(Value::Float).ok_or_else(mismatch)
            }
            FieldType::Scalar(ScalarKind::String) => json
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(mismatch),
            FieldType::Scalar(ScalarKind::Datetime) => {
                decode_date(json).map(Value::Datetime).ok_or_else(mismatch)
            }
            FieldType::List(element) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                Ok(Value::List(
                    items
                        .iter()
                        .map(|item| self.decode(session, item, element, path))
                        .collect::<SchemaResult<Vec<_>>>()?,
                ))
            }
            FieldType::Dict(value_type) => {
                let entries = json.as_object().ok_or_else(mismatch)?;
                Ok(Value::Dict(
                    entries
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), self.decode(session, v, value_type, path)?)))
                        .collect::<SchemaResult<BTreeMap<_, _>>>()?,
                ))
            }
            FieldType::Tuple(types) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                if items.len() != types.len() {
                    return Err(mismatch());
                }
                Ok(Value::Tuple(
                    items
                        .iter()
                        .zip(types)
                        .map(|(item, ty)| self.decode(session, item, ty, path))
                        .collect::<SchemaResult<Vec<_>>>()?,
                ))
            }
            FieldType::Document(class) => {
                let id = json
                    .get("$oid")
                    .and_then(Json::as_str)
                    .ok_or_else(mismatch)?;
                let collection = self.collection_for(path)?;
                let stored = session
                    .find_one(collection, "_id", &Json::from(id))?
                    .ok_or_else(|| StoreError::DocumentNotFound {
                        collection: collection.to_string(),
                        id: id.to_string(),
                    })?;
                self.decode_document(session, class, path, &stored)
            }
        }
    }

    fn decode_document(
        &self,
        session: &dyn Session,
        class: &DocumentClass,
        path: &str,
        stored: &Json,
    ) -> SchemaResult<Value> {
        let object = stored
            .as_object()
            .ok_or_else(|| SchemaError::type_mismatch(path, "document", json_kind(stored)))?;
        let mut document = Document::with_id(class, parse_id(path, object)?);

        for (name, value) in object.iter().filter(|(k, _)| k.as_str() != "_id") {
            let nested_path = join_path(path, name);
            let field_type = self
                .schema
                .get(&nested_path)
                .and_then(|field| field.field_type())
                .cloned()
                .unwrap_or_else(FieldType::any);
            let decoded = self.decode(session, value, &field_type, &nested_path)?;
            document.set(name.clone(), decoded);
        }
        Ok(Value::Document(document))
    }
}

fn encode_value(value: &Value, path: &str, pending: &mut Vec<(String, Document)>) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::String(s) => Json::from(s.as_str()),
        Value::Datetime(dt) => {
            let mut date = Map::new();
            date.insert(
                "$date".into(),
                Json::from(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            );
            Json::Object(date)
        }
        Value::List(items) | Value::Tuple(items) => Json::Array(
            items
                .iter()
                .map(|item| encode_value(item, path, pending))
                .collect(),
        ),
        Value::Dict(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v, path, pending)))
                .collect(),
        ),
        Value::Document(document) => {
            let mut reference = Map::new();
            reference.insert("$oid".into(), Json::from(document.id().to_string()));
            pending.push((path.to_string(), document.clone()));
            Json::Object(reference)
        }
    }
}

fn decode_any(json: &Json) -> Value {
    if let Some(dt) = decode_date(json) {
        return Value::Datetime(dt);
    }
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or_default())),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(decode_any).collect()),
        Json::Object(entries) => Value::Dict(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), decode_any(v)))
                .collect(),
        ),
    }
}

fn decode_date(json: &Json) -> Option<DateTime<Utc>> {
    let object = json.as_object()?;
    if object.len() != 1 {
        return None;
    }
    let raw = object.get("$date")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_id(path: &str, object: &Map<String, Json>) -> SchemaResult<Uuid> {
    object
        .get("_id")
        .and_then(Json::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| SchemaError::InvalidKey(format!("document at '{}' has no valid _id", path)))
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
