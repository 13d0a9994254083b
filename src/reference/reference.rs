//! Schema reference
//!
//! In-memory aggregate binding a dataset's definition, live schema,
//! validators and collection map. References are cheap and disposable; all
//! cross-process consistency comes from store transactions.
//!
//! State machine:
//! - `Detached`: no definition (fresh clone, or never created)
//! - `Draft`: live schema edited ahead of the persisted definition
//! - `Attached`: definition persisted and schema synchronized
//! - `Deleted`: terminal
//!
//! `commit` replays the edits made since load onto the latest persisted
//! schema inside one transaction. Added and removed paths merge cleanly;
//! a path whose type two writers both changed keeps the last committer's
//! type.

use chrono::Utc;
use uuid::Uuid;

use crate::containers::{validate_field, ValidatingDict, ValidatingList, Validated};
use crate::observability::{Event, Logger, ObservationScope};
use crate::schema::{
    get_type_definition, leaf_name, resolve_document_class, DocumentClass, Field, FieldType,
    Schema, SchemaError, SchemaHandle, SchemaResult, Value,
};
use crate::store::{run_in_transaction, Session};
use crate::validator::{collection_paths, load_validators, to_schema, Collections, Validators};

use super::connection::Connection;
use super::definition::{DatasetDefinition, DatasetKey, MediaType};
use super::merge::SchemaDelta;
use super::provision::provision;
use super::records::{Record, RecordCodec};

/// Lifecycle state of a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceState {
    Detached,
    Draft,
    Attached,
    Deleted,
}

/// Aggregate root over one dataset's schema
#[derive(Debug)]
pub struct SchemaReference {
    conn: Connection,
    definition: Option<DatasetDefinition>,
    validators: Option<Validators>,
    collections: Option<Collections>,
    schema: SchemaHandle,
    state: ReferenceState,
}

impl SchemaReference {
    /// Creates a dataset whose root documents are of class `root`.
    pub fn create(
        conn: &Connection,
        name: &str,
        root: &DocumentClass,
        media_type: Option<MediaType>,
        persistent: bool,
    ) -> SchemaResult<Self> {
        Self::create_with_schema(conn, name, root.root_schema(), media_type, persistent)
    }

    /// Creates a dataset from a ready-made schema, e.g. one taken from
    /// [`SchemaReference::clone_schema`].
    ///
    /// The schema must type its root path `""` as a document.
    pub fn create_with_schema(
        conn: &Connection,
        name: &str,
        schema: Schema,
        media_type: Option<MediaType>,
        persistent: bool,
    ) -> SchemaResult<Self> {
        root_class(&schema)?;
        if Self::exists(conn, name)? {
            return Err(SchemaError::AlreadyExists(name.to_string()));
        }

        let scope = ObservationScope::with_fields("DATASET_CREATE", &[("dataset", name)]);
        let result: SchemaResult<_> = run_in_transaction(conn.store().as_ref(), |tx| {
            conn.ensure_definitions(tx)?;
            if tx
                .find_one(conn.definitions(), "name", &serde_json::Value::from(name))?
                .is_some()
            {
                return Err(SchemaError::AlreadyExists(name.to_string()));
            }

            let provisioned = provision(tx, &schema, &Collections::new())?;
            let schema = to_schema(
                &provisioned.field_definitions,
                &provisioned.validators,
                conn.classes(),
            )?;
            let definition = DatasetDefinition::new(
                name,
                provisioned.field_definitions,
                media_type,
                persistent,
                conn.settings().version.as_str(),
            );
            tx.insert_one(conn.definitions(), definition.to_document()?)?;

            Ok((definition, provisioned.collections, provisioned.validators, schema))
        });

        let (definition, collections, validators, schema) = match result {
            Ok(created) => created,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e);
            }
        };

        let id = definition.key();
        let collection_count = collections.len().to_string();
        scope.complete_with_fields(&[("id", id.as_str())]);
        Logger::info(
            Event::DatasetCreated.as_str(),
            &[
                ("dataset", name),
                ("id", id.as_str()),
                ("collections", collection_count.as_str()),
            ],
        );

        Ok(Self {
            conn: conn.clone(),
            definition: Some(definition),
            validators: Some(validators),
            collections: Some(collections),
            schema: SchemaHandle::new(schema),
            state: ReferenceState::Attached,
        })
    }

    /// Loads a dataset by name.
    ///
    /// Runs the migration hook first, then stamps `last_loaded_at` and
    /// commits it. Ids are only accepted by [`SchemaReference::from_db_virtual`].
    pub fn from_db(conn: &Connection, key: impl Into<DatasetKey>) -> SchemaResult<Self> {
        let name = match key.into() {
            DatasetKey::Name(name) => name,
            DatasetKey::Id(id) => {
                return Err(SchemaError::InvalidKey(format!(
                    "dataset id {} can only be loaded virtually",
                    id
                )))
            }
        };

        conn.migrator()
            .migrate_if_necessary(conn.store().as_ref(), &name)?;
        Logger::trace(Event::MigrationInvoked.as_str(), &[("dataset", name.as_str())]);

        let mut reference = Self::load(
            conn,
            conn.store().as_session(),
            &DatasetKey::Name(name.clone()),
        )?;
        if let Some(definition) = reference.definition.as_mut() {
            definition.last_loaded_at = Utc::now();
        }
        reference.commit()?;

        Logger::info(Event::DatasetLoaded.as_str(), &[("dataset", name.as_str())]);
        Ok(reference)
    }

    /// Read-only load by name or id: no migration and no write-back.
    pub fn from_db_virtual(conn: &Connection, key: impl Into<DatasetKey>) -> SchemaResult<Self> {
        Self::load(conn, conn.store().as_session(), &key.into())
    }

    fn load(conn: &Connection, session: &dyn Session, key: &DatasetKey) -> SchemaResult<Self> {
        let (field, value) = key.filter();
        let document = session
            .find_one(conn.definitions(), field, &value)?
            .ok_or_else(|| SchemaError::DatasetNotFound(key.to_string()))?;

        let definition = DatasetDefinition::from_document(document)?;
        let collections = collection_paths(&definition.fields);
        let validators = load_validators(session, &collections)?;
        let schema = to_schema(&definition.fields, &validators, conn.classes())?;

        Ok(Self {
            conn: conn.clone(),
            definition: Some(definition),
            validators: Some(validators),
            collections: Some(collections),
            schema: SchemaHandle::new(schema),
            state: ReferenceState::Attached,
        })
    }

    /// Merges local schema edits into the persisted dataset.
    pub fn commit(&mut self) -> SchemaResult<()> {
        let definition = self.definition.as_ref().ok_or(SchemaError::NotAttached)?;
        let validators = self.validators.as_ref().ok_or(SchemaError::NotAttached)?;

        let scope = ObservationScope::with_fields("SCHEMA_COMMIT", &[("dataset", definition.name.as_str())]);
        let conn = &self.conn;
        let edited = self.schema.snapshot();
        let own_collections = self.collections.clone().unwrap_or_default();

        let result: SchemaResult<_> = run_in_transaction(conn.store().as_ref(), |tx| {
            let latest = Self::load(conn, tx, &DatasetKey::Id(definition.id))?;

            let original = to_schema(&definition.fields, validators, conn.classes())?;
            let delta = SchemaDelta::diff(&original, &edited);
            let added = delta.added.len().to_string();
            let changed = delta.changed.len().to_string();
            let removed = delta.removed.len().to_string();
            Logger::trace(
                Event::MergeComputed.as_str(),
                &[
                    ("dataset", definition.name.as_str()),
                    ("added", added.as_str()),
                    ("changed", changed.as_str()),
                    ("removed", removed.as_str()),
                ],
            );

            let mut merged = latest.schema.snapshot();
            delta.apply(&mut merged);

            let mut known = own_collections;
            known.extend(latest.collections.clone().unwrap_or_default());
            let provisioned = provision(tx, &merged, &known)?;

            // Must load back the way the next reader will see it
            let merged = to_schema(
                &provisioned.field_definitions,
                &provisioned.validators,
                conn.classes(),
            )?;

            let mut next = definition.clone();
            next.retired_collections = latest
                .definition
                .as_ref()
                .map(|d| d.retired_collections.clone())
                .unwrap_or_default();
            next.retire(known.into_values(), &provisioned.collections);
            next.set_fields(provisioned.field_definitions);
            let replaced =
                tx.replace_one(conn.definitions(), &next.key(), next.to_document()?, false)?;
            if !replaced {
                return Err(SchemaError::DatasetNotFound(next.name.clone()));
            }

            Ok((next, provisioned.collections, provisioned.validators, merged))
        });

        match result {
            Ok((next, collections, validators, merged)) => {
                let fields = next.fields.len().to_string();
                Logger::info(
                    Event::SchemaCommitted.as_str(),
                    &[("dataset", next.name.as_str()), ("fields", fields.as_str())],
                );
                scope.complete();

                self.definition = Some(next);
                self.collections = Some(collections);
                self.validators = Some(validators);
                self.schema.replace(merged);
                self.state = ReferenceState::Attached;
                Ok(())
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Drops every backing collection and the definition document.
    pub fn delete(&mut self) -> SchemaResult<()> {
        let definition = self.definition.as_ref().ok_or(SchemaError::NotAttached)?;
        let collections = self.collections.as_ref().ok_or(SchemaError::NotAttached)?;
        let conn = &self.conn;

        run_in_transaction(conn.store().as_ref(), |tx| {
            for (path, name) in collections {
                if tx.drop_collection(name)? {
                    Logger::info(
                        Event::CollectionDropped.as_str(),
                        &[("path", path.as_str()), ("collection", name.as_str())],
                    );
                }
            }

            // Another writer may have retired collections since this load
            let retired = match tx.find_one(
                conn.definitions(),
                "_id",
                &serde_json::Value::from(definition.key()),
            )? {
                Some(stored) => DatasetDefinition::from_document(stored)?.retired_collections,
                None => definition.retired_collections.clone(),
            };
            for name in &retired {
                if tx.drop_collection(name)? {
                    Logger::info(
                        Event::CollectionDropped.as_str(),
                        &[("collection", name.as_str()), ("retired", "true")],
                    );
                }
            }
            tx.delete_one(conn.definitions(), &definition.key())?;
            Ok::<_, SchemaError>(())
        })?;

        Logger::info(
            Event::DatasetDeleted.as_str(),
            &[("dataset", definition.name.as_str())],
        );
        self.definition = None;
        self.validators = None;
        self.collections = None;
        self.state = ReferenceState::Deleted;
        Ok(())
    }

    /// True if a dataset called `name` exists
    pub fn exists(conn: &Connection, name: &str) -> SchemaResult<bool> {
        Ok(conn
            .store()
            .find_one(conn.definitions(), "name", &serde_json::Value::from(name))?
            .is_some())
    }

    /// Names of every dataset, sorted
    pub fn list_names(conn: &Connection) -> SchemaResult<Vec<String>> {
        let store = conn.store();
        if store
            .list_collections(&[conn.definitions().to_string()])?
            .is_empty()
        {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = store
            .find_all(conn.definitions())?
            .iter()
            .filter_map(|doc| doc.get("name").and_then(|n| n.as_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Detached copy of the live schema.
    ///
    /// Holds no definition and shares nothing with this reference; data and
    /// backing collections are never copied. Materialize it with
    /// [`SchemaReference::create_with_schema`].
    pub fn clone_schema(&self) -> SchemaReference {
        SchemaReference {
            conn: self.conn.clone(),
            definition: None,
            validators: None,
            collections: None,
            schema: SchemaHandle::new(self.schema.snapshot()),
            state: ReferenceState::Detached,
        }
    }

    /// Adds a field, expanding nested document classes below it.
    ///
    /// Existing paths are replaced. Re-typing a path drops every path below
    /// it before the new class is expanded. Every document class reached
    /// must be registered on the connection.
    pub fn add_field(&mut self, path: &str, field_type: FieldType) -> SchemaResult<()> {
        self.check_editable(path)?;

        let nested = field_type
            .document_class()
            .map(|class| class.expanded_schema(path));
        self.check_registered(path, &field_type)?;
        for (nested_path, field) in nested.iter().flatten() {
            if let Some(nested_type) = field.field_type() {
                self.check_registered(nested_path, nested_type)?;
            }
        }

        let prefix = format!("{}.", path);
        self.schema.update(|schema| {
            let retyped = schema.get(path).and_then(|f| f.field_type()) != Some(&field_type);
            if retyped {
                schema.retain(|p, _| !p.starts_with(&prefix));
            }
            if let Some(nested) = nested {
                for (nested_path, field) in nested {
                    schema.entry(nested_path).or_insert(field);
                }
            }
            schema.insert(path.to_string(), Field::new(leaf_name(path), field_type));
        });
        self.mark_edited();
        Ok(())
    }

    fn check_registered(&self, path: &str, field_type: &FieldType) -> SchemaResult<()> {
        resolve_document_class(path, &get_type_definition(field_type), self.conn.classes())
            .map(|_| ())
    }

    /// Removes a field and every path below it.
    pub fn remove_field(&mut self, path: &str) -> SchemaResult<()> {
        self.check_editable(path)?;

        let prefix = format!("{}.", path);
        let removed = self.schema.update(|schema| {
            if schema.remove(path).is_none() {
                return false;
            }
            schema.retain(|p, _| !p.starts_with(&prefix));
            true
        });
        if !removed {
            return Err(SchemaError::UnknownField(path.to_string()));
        }
        self.mark_edited();
        Ok(())
    }

    fn check_editable(&self, path: &str) -> SchemaResult<()> {
        if self.state == ReferenceState::Deleted {
            return Err(SchemaError::NotAttached);
        }
        if path.is_empty() {
            return Err(SchemaError::InvalidKey("the root path cannot be edited".into()));
        }
        Ok(())
    }

    fn mark_edited(&mut self) {
        if self.state == ReferenceState::Attached {
            self.state = ReferenceState::Draft;
        }
    }

    pub fn field(&self, path: &str) -> Option<Field> {
        self.schema.field(path)
    }

    /// Snapshot of the live schema
    pub fn schema(&self) -> Schema {
        self.schema.snapshot()
    }

    /// Shared handle on the live schema
    pub fn schema_handle(&self) -> &SchemaHandle {
        &self.schema
    }

    /// True if the live schema holds more paths than the persisted definition
    pub fn expanded(&self) -> SchemaResult<bool> {
        let definition = self.definition.as_ref().ok_or(SchemaError::NotAttached)?;
        Ok(self.schema.len() > definition.fields.len())
    }

    pub fn in_db(&self) -> bool {
        self.definition.is_some()
    }

    pub fn state(&self) -> ReferenceState {
        self.state
    }

    pub fn name(&self) -> Option<&str> {
        self.definition.as_ref().map(|d| d.name.as_str())
    }

    pub fn definition(&self) -> Option<&DatasetDefinition> {
        self.definition.as_ref()
    }

    pub fn collections(&self) -> Option<&Collections> {
        self.collections.as_ref()
    }

    pub fn validators(&self) -> Option<&Validators> {
        self.validators.as_ref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Validating list bound to the list field at `path`
    pub fn list(&self, path: &str, items: Vec<Value>) -> SchemaResult<ValidatingList> {
        match validate_field(path, &self.schema, Value::List(items))? {
            Validated::List(list) => Ok(list),
            other => Err(SchemaError::type_mismatch(
                path,
                "list",
                other.to_value().kind_name(),
            )),
        }
    }

    /// Validating dict bound to the dict field at `path`
    pub fn dict(
        &self,
        path: &str,
        entries: impl IntoIterator<Item = (String, Value)>,
    ) -> SchemaResult<ValidatingDict> {
        match validate_field(path, &self.schema, Value::Dict(entries.into_iter().collect()))? {
            Validated::Dict(dict) => Ok(dict),
            other => Err(SchemaError::type_mismatch(
                path,
                "dict",
                other.to_value().kind_name(),
            )),
        }
    }

    /// Empty root document bound to the live schema
    pub fn new_record(&self) -> SchemaResult<Record> {
        let class = root_class(&self.schema.snapshot())?;
        Ok(Record::new(class, self.schema.clone()))
    }

    /// Writes a record and its nested documents in one transaction.
    pub fn save_record(&self, record: &Record) -> SchemaResult<()> {
        let collections = self.collections.as_ref().ok_or(SchemaError::NotAttached)?;
        let schema = self.schema.snapshot();
        let codec = RecordCodec::new(&schema, collections);

        run_in_transaction(self.conn.store().as_ref(), |tx| codec.save(tx, record))?;

        let id = record.id().to_string();
        Logger::trace(
            Event::RecordSaved.as_str(),
            &[("dataset", self.name().unwrap_or_default()), ("id", id.as_str())],
        );
        Ok(())
    }

    pub fn load_record(&self, id: Uuid) -> SchemaResult<Option<Record>> {
        let collections = self.collections.as_ref().ok_or(SchemaError::NotAttached)?;
        let schema = self.schema.snapshot();
        let class = root_class(&schema)?;
        let codec = RecordCodec::new(&schema, collections);
        let session = self.conn.store().as_session();

        session
            .find_one(codec.root_collection()?, "_id", &serde_json::Value::from(id.to_string()))?
            .map(|stored| codec.load(session, &class, &self.schema, &stored))
            .transpose()
    }

    pub fn load_records(&self) -> SchemaResult<Vec<Record>> {
        let collections = self.collections.as_ref().ok_or(SchemaError::NotAttached)?;
        let schema = self.schema.snapshot();
        let class = root_class(&schema)?;
        let codec = RecordCodec::new(&schema, collections);
        let session = self.conn.store().as_session();

        session
            .find_all(codec.root_collection()?)?
            .iter()
            .map(|stored| codec.load(session, &class, &self.schema, stored))
            .collect()
    }
}

fn root_class(schema: &Schema) -> SchemaResult<DocumentClass> {
    let field = schema
        .get("")
        .ok_or_else(|| SchemaError::UnknownField(String::new()))?;
    match field.require_type("")? {
        FieldType::Document(class) => Ok(class.clone()),
        other => Err(SchemaError::type_mismatch("", "document", other.type_name())),
    }
}
