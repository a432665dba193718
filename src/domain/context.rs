//! Flat name to value mapping assembled from one or more groups.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{
    entities::LoadedGroup,
    error::DomainError,
    resolve::{BitValue, resolve},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub value: BitValue,
    pub group: String,
}

/// Context names map to resolved values. A name may be provided by only one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContextMap {
    entries: BTreeMap<String, ContextEntry>,
}

impl ContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, failing with `NameClash` when the name is already taken.
    pub fn insert(
        &mut self,
        context_name: &str,
        group: &str,
        value: BitValue,
    ) -> Result<(), DomainError> {
        if let Some(existing) = self.entries.get(context_name) {
            return Err(DomainError::name_clash(
                context_name,
                existing.group.clone(),
                group,
            ));
        }

        self.entries.insert(
            context_name.to_string(),
            ContextEntry {
                value,
                group: group.to_string(),
            },
        );
        Ok(())
    }

    /// Resolve every bit of `group` into the mapping.
    pub fn extend_from_group(&mut self, group: &LoadedGroup) -> Result<(), DomainError> {
        for entry in &group.bits {
            let value = resolve(&entry.bit, &entry.data);
            self.insert(&entry.bit.context_name, group.slug(), value)?;
        }
        Ok(())
    }

    pub fn get(&self, context_name: &str) -> Option<&BitValue> {
        self.entries.get(context_name).map(|entry| &entry.value)
    }

    pub fn source_group(&self, context_name: &str) -> Option<&str> {
        self.entries
            .get(context_name)
            .map(|entry| entry.group.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BitValue)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_str(), &entry.value))
    }
}
