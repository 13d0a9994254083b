//! Document class declarations for the CLI
//!
//! The classes file is a JSON object listing classes in dependency order: a
//! class may only refer to classes declared before it.
//!
//! ```json
//! {
//!   "classes": [
//!     {"name": "TagDoc",
//!      "fields": {"name": {"kind": "scalar", "scalar": "string"}},
//!      "indexes": [{"keys": [["name", "ascending"]]}]},
//!     {"name": "Sample",
//!      "fields": {"tags": {"kind": "list",
//!                          "element": {"kind": "document", "class": "TagDoc"}}}}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::schema::{ClassRegistry, DocumentClass, TypeDescriptor};
use crate::store::IndexSpec;

use super::errors::{CliError, CliResult};

#[derive(Debug, Deserialize)]
struct ClassFile {
    classes: Vec<ClassDecl>,
}

#[derive(Debug, Deserialize)]
struct ClassDecl {
    name: String,
    #[serde(default)]
    fields: BTreeMap<String, TypeDescriptor>,
    #[serde(default)]
    indexes: Vec<IndexSpec>,
}

/// Load class declarations from a file
pub fn load_classes(path: &Path) -> CliResult<ClassRegistry> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::classes_error(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_classes(&content)
}

/// Parse class declarations into a registry
pub fn parse_classes(content: &str) -> CliResult<ClassRegistry> {
    let file: ClassFile = serde_json::from_str(content)
        .map_err(|e| CliError::classes_error(format!("Invalid classes JSON: {}", e)))?;

    let mut registry = ClassRegistry::new();
    for decl in file.classes {
        if registry.contains(&decl.name) {
            return Err(CliError::classes_error(format!(
                "Class '{}' declared twice",
                decl.name
            )));
        }

        let mut builder = DocumentClass::builder(decl.name.as_str());
        for (field, descriptor) in &decl.fields {
            let path = format!("{}.{}", decl.name, field);
            let field_type = descriptor
                .to_field_type(&path, &registry)
                .map_err(|e| CliError::classes_error(e.to_string()))?;
            builder = builder.field(field.as_str(), field_type);
        }
        for index in decl.indexes {
            builder = builder.index(index);
        }

        registry.register(&builder.build());
    }

    Ok(registry)
}
