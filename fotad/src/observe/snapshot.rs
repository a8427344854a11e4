//! Read-only view over a device's last reported values

use std::collections::HashMap;

use crate::lwm2m::{ResourcePath, ResourceValue};

/// Last known value per resource path for one device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSnapshot {
    values: HashMap<ResourcePath, ResourceValue>,
}

impl ResourceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value reported for a path, `None` if never observed
    pub fn get(&self, path: &ResourcePath) -> Option<&ResourceValue> {
        self.values.get(path)
    }

    /// Integer value of a path; absent or non-integer values are `None`
    pub fn integer(&self, path: &ResourcePath) -> Option<i64> {
        self.get(path).and_then(ResourceValue::as_integer)
    }

    /// String value of a path; absent or non-string values are `None`
    pub fn string(&self, path: &ResourcePath) -> Option<&str> {
        self.get(path).and_then(ResourceValue::as_str)
    }

    pub fn set(&mut self, path: ResourcePath, value: impl Into<ResourceValue>) {
        self.values.insert(path, value.into());
    }

    /// Builder-style variant of [`ResourceSnapshot::set`]
    pub fn with(mut self, path: ResourcePath, value: impl Into<ResourceValue>) -> Self {
        self.set(path, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
