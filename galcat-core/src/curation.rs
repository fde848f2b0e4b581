// src/curation.rs
// Field -> preferred reference key, overriding the best=1 selection

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::storage::io;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Curation {
    selections: IndexMap<String, String>,
}

impl Curation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, reference: impl Into<String>) -> Self {
        self.set(field, reference);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, reference: impl Into<String>) -> Option<String> {
        self.selections.insert(field.into(), reference.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.selections.shift_remove(field)
    }

    /// Preferred reference key for `field`
    pub fn get(&self, field: &str) -> Option<&str> {
        self.selections.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.selections.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of `self` with `other` taking precedence field by field
    pub fn overlay(&self, other: &Curation) -> Curation {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// Merge `other` in place; its keys overwrite ours
    pub fn merge(&mut self, other: &Curation) {
        for (field, reference) in other.iter() {
            self.set(field, reference);
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        io::read_json(path.as_ref())
    }

    /// Merge into the curation stored at `path` (if any) and rewrite it
    pub fn save(&self, path: impl AsRef<Path>) -> Result<Curation> {
        let path = path.as_ref();
        let mut stored = if path.exists() {
            Self::load(path)?
        } else {
            Curation::new()
        };
        stored.merge(self);
        io::write_json(path, &stored)?;
        info!(path = %path.display(), fields = stored.len(), "saved curation");
        Ok(stored)
    }
}

impl FromIterator<(String, String)> for Curation {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Curation {
            selections: iter.into_iter().collect(),
        }
    }
}
