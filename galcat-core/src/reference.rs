// src/reference.rs
// Bibliographic references, queried with the same evaluator as documents

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::document::{Document, FieldValue};
use crate::error::{GalcatError, Result};
use crate::query;
use crate::storage::io;

/// Field every reference is keyed by
pub const REFERENCE_KEY_FIELD: &str = "key";

/// One entry of the references file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bibcode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Reference {
    pub fn new(key: impl Into<String>) -> Self {
        Reference {
            key: key.into(),
            id: None,
            year: None,
            doi: None,
            bibcode: None,
            authors: None,
            journal: None,
            title: None,
            extra: IndexMap::new(),
        }
    }

    fn to_document(&self) -> Result<Document> {
        Document::from_value(&serde_json::to_value(self)?)
    }
}

/// Read-mostly reference collection. Documents point into it by key only.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    references: Vec<Document>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_references(references: Vec<Reference>) -> Result<Self> {
        let mut resolver = ReferenceResolver::new();
        for reference in references {
            resolver.insert(reference)?;
        }
        Ok(resolver)
    }

    /// Load a JSON array of references
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let references: Vec<Reference> = io::read_json(path)?;
        let resolver = Self::from_references(references)?;
        info!(path = %path.display(), count = resolver.len(), "loaded references");
        Ok(resolver)
    }

    /// Insert, replacing any reference with the same key
    pub fn insert(&mut self, reference: Reference) -> Result<()> {
        if reference.key.trim().is_empty() {
            return Err(GalcatError::missing_identifier(REFERENCE_KEY_FIELD));
        }
        let doc = reference.to_document()?;
        match self.position(&reference.key) {
            Some(i) => {
                warn!(key = %reference.key, "duplicate reference key, replacing");
                self.references[i] = doc;
            }
            None => self.references.push(doc),
        }
        Ok(())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.references
            .iter()
            .position(|r| r.identifier_str(REFERENCE_KEY_FIELD) == Some(key))
    }

    /// Query the reference collection
    pub fn find(&self, query: &Value) -> Result<Vec<&Document>> {
        query::evaluate_json(&self.references, query)
    }

    pub fn lookup(&self, key: &str) -> Option<&Document> {
        self.find(&json!({ "key": key }))
            .ok()
            .and_then(|found| found.into_iter().next())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn references(&self) -> &[Document] {
        &self.references
    }

    /// Deep copy of `document` with each entry's reference key replaced by
    /// the full reference. Unknown keys stay as plain strings.
    pub fn embed(&self, document: &Document) -> Value {
        let mut out = Map::with_capacity(document.len());
        for (field, value) in document.fields() {
            let rendered = match value {
                FieldValue::Scalar(v) => v.clone(),
                FieldValue::Entries(entries) => Value::Array(
                    entries
                        .iter()
                        .map(|entry| {
                            let mut rendered = entry.to_value();
                            let full = entry.reference_key().and_then(|key| self.lookup(key));
                            if let (Some(reference), Value::Object(map)) = (full, &mut rendered) {
                                map.insert("reference".to_string(), reference.to_value());
                            }
                            rendered
                        })
                        .collect(),
                ),
            };
            out.insert(field.clone(), rendered);
        }
        Value::Object(out)
    }
}
