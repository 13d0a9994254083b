//! Document classes and document instances
//!
//! A document class exposes its own static schema (name -> field) and the
//! indexes its backing collection must carry. Classes are immutable once
//! built and cheap to clone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::errors::{SchemaError, SchemaResult};
use super::types::{join_path, Field, FieldType, Schema};
use super::value::Value;
use crate::store::IndexSpec;

#[derive(Debug)]
struct ClassInner {
    name: String,
    schema: BTreeMap<String, Field>,
    indexes: Vec<IndexSpec>,
}

/// A document type whose instances live in a backing collection
#[derive(Clone)]
pub struct DocumentClass(Arc<ClassInner>);

impl DocumentClass {
    pub fn builder(name: impl Into<String>) -> DocumentClassBuilder {
        DocumentClassBuilder {
            name: name.into(),
            schema: BTreeMap::new(),
            indexes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Static schema declared by the class
    pub fn schema(&self) -> &BTreeMap<String, Field> {
        &self.0.schema
    }

    /// Indexes required on the class's backing collection
    pub fn indexes(&self) -> &[IndexSpec] {
        &self.0.indexes
    }

    /// Creates an empty instance with a fresh id
    pub fn new_document(&self) -> Document {
        Document::new(self)
    }

    /// Static schema of this class and of every class nested under its
    /// document-typed fields, keyed by path below `prefix`.
    pub fn expanded_schema(&self, prefix: &str) -> Schema {
        let mut schema = Schema::new();
        self.expand_into(prefix, &mut schema);
        schema
    }

    /// Schema of a dataset whose root documents are of this class
    pub fn root_schema(&self) -> Schema {
        let mut schema = self.expanded_schema("");
        schema.insert(String::new(), Field::new("", FieldType::document(self)));
        schema
    }

    fn expand_into(&self, prefix: &str, schema: &mut Schema) {
        for (name, field) in self.schema() {
            let path = join_path(prefix, name);
            if let Some(nested) = field.field_type().and_then(|t| t.document_class()) {
                nested.expand_into(&path, schema);
            }
            schema.insert(path, field.clone());
        }
    }
}

impl PartialEq for DocumentClass {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl fmt::Debug for DocumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentClass")
            .field("name", &self.0.name)
            .field("fields", &self.0.schema.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for document classes
#[derive(Debug)]
pub struct DocumentClassBuilder {
    name: String,
    schema: BTreeMap<String, Field>,
    indexes: Vec<IndexSpec>,
}

impl DocumentClassBuilder {
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        self.schema.insert(name.clone(), Field::new(name, field_type));
        self
    }

    /// Declares a field without a type; schema definition will reject it
    pub fn untyped_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.schema.insert(name.clone(), Field::untyped(name));
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn build(self) -> DocumentClass {
        DocumentClass(Arc::new(ClassInner {
            name: self.name,
            schema: self.schema,
            indexes: self.indexes,
        }))
    }
}

/// Resolves document class names found in persisted descriptors.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, DocumentClass>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class and every class reachable from its fields.
    pub fn register(&mut self, class: &DocumentClass) {
        if self.classes.contains_key(class.name()) {
            return;
        }
        self.classes.insert(class.name().to_string(), class.clone());

        for field in class.schema().values() {
            if let Some(nested) = field.field_type().and_then(|t| t.document_class()) {
                self.register(nested);
            }
        }
    }

    pub fn with(mut self, class: &DocumentClass) -> Self {
        self.register(class);
        self
    }

    pub fn get(&self, name: &str) -> Option<&DocumentClass> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Resolves a class name, failing with `UnresolvableDescriptor`
    pub fn resolve(&self, path: &str, name: &str) -> SchemaResult<DocumentClass> {
        self.classes.get(name).cloned().ok_or_else(|| {
            SchemaError::unresolvable(path, format!("document class '{}' is not registered", name))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// An instance of a document class
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: Uuid,
    class: DocumentClass,
    fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(class: &DocumentClass) -> Self {
        Self::with_id(class, Uuid::new_v4())
    }

    pub fn with_id(class: &DocumentClass, id: Uuid) -> Self {
        Self {
            id,
            class: class.clone(),
            fields: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn class(&self) -> &DocumentClass {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style `set`
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}
