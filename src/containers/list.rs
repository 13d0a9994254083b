//! Validating list

use std::slice;

use super::dict::ValidatingDict;
use super::validate::{Binding, Validated};
use crate::schema::{SchemaError, SchemaResult, Value};

/// A list whose every mutation is checked against the live schema.
///
/// Multi-element operations validate every element before applying any.
#[derive(Debug, Clone)]
pub struct ValidatingList {
    binding: Binding,
    items: Vec<Validated>,
}

impl ValidatingList {
    /// Creates an empty list bound to a schema position
    pub(crate) fn construct(binding: Binding) -> Self {
        Self {
            binding,
            items: Vec::new(),
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Validated> {
        self.items.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Validated> {
        self.items.iter()
    }

    /// Replaces the element at `index`
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> SchemaResult<()> {
        self.check_index(index, self.items.len())?;
        let validated = self.binding.validate(value.into())?;
        self.items[index] = validated;
        Ok(())
    }

    /// Inserts before `index`; `index == len` appends
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> SchemaResult<()> {
        self.check_index(index, self.items.len() + 1)?;
        let validated = self.binding.validate(value.into())?;
        self.items.insert(index, validated);
        Ok(())
    }

    pub fn push(&mut self, value: impl Into<Value>) -> SchemaResult<()> {
        let validated = self.binding.validate(value.into())?;
        self.items.push(validated);
        Ok(())
    }

    /// Appends all values, or none if any fails validation
    pub fn extend<I, V>(&mut self, values: I) -> SchemaResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let validated = values
            .into_iter()
            .map(|value| self.binding.validate(value.into()))
            .collect::<SchemaResult<Vec<_>>>()?;
        self.items.extend(validated);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Validated> {
        self.items.pop()
    }

    pub fn remove(&mut self, index: usize) -> SchemaResult<Validated> {
        self.check_index(index, self.items.len())?;
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Nested list at `index`, if that element is a list
    pub fn list_at_mut(&mut self, index: usize) -> Option<&mut ValidatingList> {
        match self.items.get_mut(index) {
            Some(Validated::List(list)) => Some(list),
            _ => None,
        }
    }

    /// Nested dict at `index`, if that element is a dict
    pub fn dict_at_mut(&mut self, index: usize) -> Option<&mut ValidatingDict> {
        match self.items.get_mut(index) {
            Some(Validated::Dict(dict)) => Some(dict),
            _ => None,
        }
    }

    pub fn to_values(&self) -> Vec<Value> {
        self.items.iter().map(Validated::to_value).collect()
    }

    fn check_index(&self, index: usize, bound: usize) -> SchemaResult<()> {
        if index >= bound {
            return Err(SchemaError::IndexOutOfBounds {
                path: self.binding.path().to_string(),
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }
}

impl PartialEq for ValidatingList {
    fn eq(&self, other: &Self) -> bool {
        self.binding.path() == other.binding.path() && self.items == other.items
    }
}

impl<'a> IntoIterator for &'a ValidatingList {
    type Item = &'a Validated;
    type IntoIter = slice::Iter<'a, Validated>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
