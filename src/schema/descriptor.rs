//! Persisted type descriptors
//!
//! A descriptor is the serializable mirror of a [`FieldType`]. Document
//! leaves are stored by class name and resolved through a [`ClassRegistry`]
//! when a schema is rebuilt from storage.

use serde::{Deserialize, Serialize};

use super::document::{ClassRegistry, DocumentClass};
use super::errors::SchemaResult;
use super::types::{FieldType, ScalarKind};

/// Recursive, persisted description of a field's type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDescriptor {
    Scalar { scalar: ScalarKind },
    List { element: Box<TypeDescriptor> },
    Dict { value: Box<TypeDescriptor> },
    Tuple { items: Vec<TypeDescriptor> },
    Document { class: String },
}

impl TypeDescriptor {
    pub fn scalar(kind: ScalarKind) -> Self {
        TypeDescriptor::Scalar { scalar: kind }
    }

    pub fn any() -> Self {
        Self::scalar(ScalarKind::Any)
    }

    /// Name of the document class nested inside a list/dict chain, if any
    pub fn document_class_name(&self) -> Option<&str> {
        let mut check = self;
        loop {
            match check {
                TypeDescriptor::List { element: inner } | TypeDescriptor::Dict { value: inner } => {
                    check = inner.as_ref()
                }
                TypeDescriptor::Document { class } => return Some(class),
                TypeDescriptor::Tuple { .. } | TypeDescriptor::Scalar { .. } => return None,
            }
        }
    }

    /// Rebuilds the live type, resolving document classes by name.
    pub fn to_field_type(&self, path: &str, registry: &ClassRegistry) -> SchemaResult<FieldType> {
        Ok(match self {
            TypeDescriptor::Scalar { scalar } => FieldType::Scalar(*scalar),
            TypeDescriptor::List { element } => {
                FieldType::List(Box::new(element.to_field_type(path, registry)?))
            }
            TypeDescriptor::Dict { value } => {
                FieldType::Dict(Box::new(value.to_field_type(path, registry)?))
            }
            TypeDescriptor::Tuple { items } => FieldType::Tuple(
                items
                    .iter()
                    .map(|item| item.to_field_type(path, registry))
                    .collect::<SchemaResult<Vec<_>>>()?,
            ),
            TypeDescriptor::Document { class } => {
                FieldType::Document(registry.resolve(path, class)?)
            }
        })
    }
}

/// Builds the descriptor tree for a live type, top-down.
pub fn get_type_definition(field_type: &FieldType) -> TypeDescriptor {
    match field_type {
        FieldType::Scalar(kind) => TypeDescriptor::scalar(*kind),
        FieldType::List(element) => TypeDescriptor::List {
            element: Box::new(get_type_definition(element)),
        },
        FieldType::Dict(value) => TypeDescriptor::Dict {
            value: Box::new(get_type_definition(value)),
        },
        FieldType::Tuple(items) => TypeDescriptor::Tuple {
            items: items.iter().map(get_type_definition).collect(),
        },
        FieldType::Document(class) => TypeDescriptor::Document {
            class: class.name().to_string(),
        },
    }
}

/// Unwraps dict values and list elements until a leaf is reached.
///
/// Returns the document class the leaf names, or `None` when the chain ends
/// in a tuple or scalar. Fails with `UnresolvableDescriptor` when the leaf
/// names a class the registry does not know.
pub fn resolve_document_class(
    path: &str,
    descriptor: &TypeDescriptor,
    registry: &ClassRegistry,
) -> SchemaResult<Option<DocumentClass>> {
    match descriptor.document_class_name() {
        Some(name) => registry.resolve(path, name).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> (ClassRegistry, DocumentClass) {
        let tag = DocumentClass::builder("TagDoc")
            .field("name", FieldType::string())
            .build();
        (ClassRegistry::new().with(&tag), tag)
    }

    #[test]
    fn test_descriptor_round_trip() {
        let (registry, tag) = registry();
        let types = vec![
            FieldType::string(),
            FieldType::list(),
            FieldType::dict_of(FieldType::list_of(FieldType::float())),
            FieldType::tuple(vec![FieldType::int(), FieldType::datetime()]),
            FieldType::list_of(FieldType::document(&tag)),
        ];

        for ty in types {
            let descriptor = get_type_definition(&ty);
            assert_eq!(descriptor.to_field_type("f", &registry).unwrap(), ty);
        }
    }

    #[test]
    fn test_serialized_shape() {
        let (_, tag) = registry();
        let descriptor = get_type_definition(&FieldType::list_of(FieldType::document(&tag)));
        let value = serde_json::to_value(&descriptor).unwrap();

        assert_eq!(
            value,
            json!({"kind": "list", "element": {"kind": "document", "class": "TagDoc"}})
        );

        let parsed: TypeDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn test_resolve_document_class() {
        let (registry, _) = registry();
        let nested = TypeDescriptor::Dict {
            value: Box::new(TypeDescriptor::List {
                element: Box::new(TypeDescriptor::Document {
                    class: "TagDoc".into(),
                }),
            }),
        };

        let class = resolve_document_class("tags", &nested, &registry).unwrap();
        assert_eq!(class.map(|c| c.name().to_string()), Some("TagDoc".into()));
    }

    #[test]
    fn test_resolve_stops_at_tuple_and_scalar() {
        let (registry, _) = registry();
        let tuple = TypeDescriptor::Tuple {
            items: vec![TypeDescriptor::Document {
                class: "TagDoc".into(),
            }],
        };

        assert!(resolve_document_class("t", &tuple, &registry).unwrap().is_none());
        assert!(resolve_document_class("s", &TypeDescriptor::any(), &registry)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_resolve_unknown_class_fails() {
        let (registry, _) = registry();
        let descriptor = TypeDescriptor::Document {
            class: "Unknown".into(),
        };

        let err = resolve_document_class("x", &descriptor, &registry).unwrap_err();
        assert_eq!(err.code(), "AERO_SCHEMA_UNRESOLVABLE_DESCRIPTOR");
    }
}
