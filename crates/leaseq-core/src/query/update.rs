//! Update documents: set, unset and append-to-array.

use serde_json::Value;

use super::{Document, path};
use crate::domain::StoreError;

/// An update applied to one matched document.
///
/// Operations apply in the order set, unset, push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Vec<(String, Value)>,
    unset: Vec<String>,
    push: Vec<(String, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((path.into(), value.into()));
        self
    }

    /// `set` when the value is present, otherwise leave the field alone.
    pub fn set_some<V: Into<Value>>(self, path: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(path, value),
            None => self,
        }
    }

    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.unset.push(path.into());
        self
    }

    pub fn push(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push.push((path.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.push.is_empty()
    }

    pub fn apply(&self, doc: &mut Document) -> Result<(), StoreError> {
        for (p, value) in &self.set {
            path::set(doc, p, value.clone());
        }
        for p in &self.unset {
            path::unset(doc, p);
        }
        for (p, value) in &self.push {
            path::push(doc, p, value.clone())?;
        }
        Ok(())
    }
}
