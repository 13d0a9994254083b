//! CLI command implementations
//!
//! Each command opens the store named by the configuration, runs one schema
//! operation and writes one JSON response. Read-only commands load datasets
//! virtually so that they never write back.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::config::Config;
use crate::reference::{Connection, SchemaReference};
use crate::schema::ClassRegistry;

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Run a command against a connection and return its response data
pub fn run_command(command: Command, config: &Config, conn: &Connection) -> CliResult<Value> {
    match command {
        Command::List => list(conn),
        Command::Exists { name } => exists(conn, &name),
        Command::Inspect { name } => inspect(conn, &name),
        Command::Delete { name } => delete(conn, &name),
        Command::Create {
            name,
            root,
            media_type,
            persistent,
        } => {
            let root = conn.classes().get(&root).cloned().ok_or_else(|| {
                CliError::classes_error(format!("Root class '{}' is not declared", root))
            })?;
            let persistent = persistent || config.default_persistent;
            let reference = SchemaReference::create(conn, &name, &root, media_type, persistent)?;
            Ok(describe(&reference))
        }
    }
}

/// Connect using a configuration and a class registry
pub fn connect(config: &Config, classes: ClassRegistry) -> CliResult<Connection> {
    Ok(config.connect(classes)?)
}

pub fn list(conn: &Connection) -> CliResult<Value> {
    Ok(json!({ "datasets": SchemaReference::list_names(conn)? }))
}

pub fn exists(conn: &Connection, name: &str) -> CliResult<Value> {
    Ok(json!({ "name": name, "exists": SchemaReference::exists(conn, name)? }))
}

pub fn inspect(conn: &Connection, name: &str) -> CliResult<Value> {
    let reference = SchemaReference::from_db_virtual(conn, name)?;
    Ok(describe(&reference))
}

pub fn delete(conn: &Connection, name: &str) -> CliResult<Value> {
    let mut reference = SchemaReference::from_db_virtual(conn, name)?;
    let dropped: Vec<String> = reference
        .collections()
        .map(|c| c.values().cloned().collect())
        .unwrap_or_default();
    reference.delete()?;

    Ok(json!({ "name": name, "dropped_collections": dropped }))
}

fn describe(reference: &SchemaReference) -> Value {
    let validators: BTreeMap<&str, Value> = reference
        .validators()
        .map(|v| {
            v.iter()
                .map(|(name, spec)| (name.as_str(), spec.to_validator_document()))
                .collect()
        })
        .unwrap_or_default();
    let schema: BTreeMap<String, String> = reference
        .schema()
        .into_iter()
        .map(|(path, field)| {
            let type_name = field
                .field_type()
                .map(|t| t.type_name())
                .unwrap_or_else(|| "untyped".to_string());
            (path, type_name)
        })
        .collect();

    json!({
        "definition": reference.definition(),
        "collections": reference.collections(),
        "validators": validators,
        "schema": schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::classes::parse_classes;

    fn setup() -> (Config, Connection) {
        let classes = parse_classes(
            r#"{"classes": [
                {"name": "TagDoc", "fields": {"name": {"kind": "scalar", "scalar": "string"}}},
                {"name": "Sample", "fields": {
                    "label": {"kind": "scalar", "scalar": "string"},
                    "tags": {"kind": "list", "element": {"kind": "document", "class": "TagDoc"}}
                }}
            ]}"#,
        )
        .unwrap();
        let config = Config::in_memory();
        let conn = connect(&config, classes).unwrap();
        (config, conn)
    }

    fn create(config: &Config, conn: &Connection, name: &str) -> Value {
        run_command(
            Command::Create {
                name: name.into(),
                root: "Sample".into(),
                media_type: None,
                persistent: false,
            },
            config,
            conn,
        )
        .unwrap()
    }

    #[test]
    fn test_create_then_inspect() {
        let (config, conn) = setup();
        let created = create(&config, &conn, "ds1");
        assert_eq!(created["definition"]["name"], "ds1");
        assert_eq!(created["schema"]["tags"], "list<document<TagDoc>>");

        let inspected = run_command(Command::Inspect { name: "ds1".into() }, &config, &conn).unwrap();
        assert_eq!(inspected["collections"], created["collections"]);
        assert_eq!(inspected["validators"], created["validators"]);
    }

    #[test]
    fn test_list_exists_delete() {
        let (config, conn) = setup();
        create(&config, &conn, "ds1");

        let listed = run_command(Command::List, &config, &conn).unwrap();
        assert_eq!(listed["datasets"], json!(["ds1"]));

        let deleted = run_command(Command::Delete { name: "ds1".into() }, &config, &conn).unwrap();
        assert_eq!(deleted["dropped_collections"].as_array().unwrap().len(), 2);

        let exists = run_command(Command::Exists { name: "ds1".into() }, &config, &conn).unwrap();
        assert_eq!(exists["exists"], false);
    }

    #[test]
    fn test_unknown_root_class() {
        let (config, conn) = setup();
        let err = run_command(
            Command::Create {
                name: "ds1".into(),
                root: "Missing".into(),
                media_type: None,
                persistent: false,
            },
            &config,
            &conn,
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_CLASSES_ERROR");
    }

    #[test]
    fn test_default_persistent_applies() {
        let (mut config, conn) = setup();
        config.default_persistent = true;
        let created = create(&config, &conn, "ds1");
        assert_eq!(created["definition"]["persistent"], true);
    }
}
