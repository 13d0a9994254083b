//! Validating dict

use std::collections::btree_map;
use std::collections::BTreeMap;

use super::list::ValidatingList;
use super::validate::{self, Binding, Validated};
use crate::schema::{SchemaResult, Value};

/// A string-keyed mapping whose every mutation is checked against the live
/// schema.
#[derive(Debug, Clone)]
pub struct ValidatingDict {
    binding: Binding,
    entries: BTreeMap<String, Validated>,
}

impl ValidatingDict {
    /// Creates an empty dict bound to a schema position
    pub(crate) fn construct(binding: Binding) -> Self {
        Self {
            binding,
            entries: BTreeMap::new(),
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Validated> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, Validated> {
        self.entries.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Validated> {
        self.entries.iter()
    }

    /// Sets `key`, returning the previous value
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> SchemaResult<Option<Validated>> {
        let validated = self.binding.validate(value.into())?;
        Ok(self.entries.insert(key.into(), validated))
    }

    /// Returns the value at `key`, inserting `default` first if absent.
    ///
    /// `default` is validated even when the key is present.
    pub fn set_default(
        &mut self,
        key: impl Into<String>,
        default: impl Into<Value>,
    ) -> SchemaResult<&Validated> {
        let validated = self.binding.validate(default.into())?;
        Ok(self.entries.entry(key.into()).or_insert(validated))
    }

    /// Sets every entry, or none if any value fails validation
    pub fn update<I, K, V>(&mut self, entries: I) -> SchemaResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let validated = entries
            .into_iter()
            .map(|(key, value)| Ok((key.into(), self.binding.validate(value.into())?)))
            .collect::<SchemaResult<Vec<_>>>()?;
        self.entries.extend(validated);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Validated> {
        self.entries.remove(key)
    }

    /// Nested list at `key`, if that value is a list
    pub fn get_list_mut(&mut self, key: &str) -> Option<&mut ValidatingList> {
        match self.entries.get_mut(key) {
            Some(Validated::List(list)) => Some(list),
            _ => None,
        }
    }

    /// Nested dict at `key`, if that value is a dict
    pub fn get_dict_mut(&mut self, key: &str) -> Option<&mut ValidatingDict> {
        match self.entries.get_mut(key) {
            Some(Validated::Dict(dict)) => Some(dict),
            _ => None,
        }
    }

    pub fn to_values(&self) -> BTreeMap<String, Value> {
        validate::to_values(&self.entries)
    }
}

impl PartialEq for ValidatingDict {
    fn eq(&self, other: &Self) -> bool {
        self.binding.path() == other.binding.path() && self.entries == other.entries
    }
}
