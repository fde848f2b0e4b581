// src/store.rs
// Backends answering the same find/upsert contract

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{GalcatError, Result};
use crate::query::{self, Query};

/// Collection backend. The query language is shared by every implementation;
/// operators such as `$exists` are answered or rejected per backend.
pub trait DocumentStore {
    /// Documents matching `query`, in collection order
    fn find(&self, query: &Value) -> Result<Vec<Document>>;

    /// Replace the document whose `id_field` equals `id_value`, or insert it
    fn upsert(&mut self, id_field: &str, id_value: &Value, document: Document) -> Result<()>;

    /// Number of stored documents
    fn count(&self) -> Result<usize>;
}

/// In-memory collection, evaluated with [`query::evaluate`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Vec<Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from loaded documents; a repeated identifier replaces the
    /// earlier document in place.
    pub fn from_documents(documents: Vec<Document>, id_field: &str) -> Result<Self> {
        let mut store = MemoryStore::new();
        for doc in documents {
            let id_value = doc
                .identifier(id_field)
                .cloned()
                .ok_or_else(|| GalcatError::missing_identifier(id_field))?;
            store.upsert(id_field, &id_value, doc)?;
        }
        Ok(store)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Borrowing variant of [`DocumentStore::find`]
    pub fn find_refs(&self, query: &Query) -> Result<Vec<&Document>> {
        query::evaluate(&self.documents, query)
    }

    fn position(&self, id_field: &str, id_value: &Value) -> Option<usize> {
        self.documents
            .iter()
            .position(|doc| doc.identifier(id_field) == Some(id_value))
    }

    pub fn get(&self, id_field: &str, id_value: &Value) -> Option<&Document> {
        self.position(id_field, id_value).map(|i| &self.documents[i])
    }

    pub fn get_mut(&mut self, id_field: &str, id_value: &Value) -> Option<&mut Document> {
        self.position(id_field, id_value).map(move |i| &mut self.documents[i])
    }
}

impl DocumentStore for MemoryStore {
    fn find(&self, query: &Value) -> Result<Vec<Document>> {
        let parsed = Query::from_json(query)?;
        Ok(self.find_refs(&parsed)?.into_iter().cloned().collect())
    }

    fn upsert(&mut self, id_field: &str, id_value: &Value, document: Document) -> Result<()> {
        match self.position(id_field, id_value) {
            Some(i) => {
                warn!(id = %id_value, "replacing existing document");
                self.documents[i] = document;
            }
            None => {
                debug!(id = %id_value, "inserting document");
                self.documents.push(document);
            }
        }
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.documents.len())
    }
}

/// Client of a remote document store speaking the same query language.
/// Timeouts and retries are whatever the client implements.
pub trait RemoteClient {
    fn find(&self, filter: &Value) -> Result<Vec<Value>>;

    fn replace_one(&mut self, filter: &Value, document: &Value, upsert: bool) -> Result<()>;

    fn count(&self) -> Result<u64>;
}

/// Adapter forwarding queries verbatim to a [`RemoteClient`]
pub struct RemoteStore<C: RemoteClient> {
    client: C,
}

impl<C: RemoteClient> RemoteStore<C> {
    pub fn new(client: C) -> Self {
        RemoteStore { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }
}

impl<C: RemoteClient> DocumentStore for RemoteStore<C> {
    fn find(&self, query: &Value) -> Result<Vec<Document>> {
        self.client
            .find(query)?
            .iter()
            .map(Document::from_value)
            .collect()
    }

    fn upsert(&mut self, id_field: &str, id_value: &Value, document: Document) -> Result<()> {
        self.client
            .replace_one(&identity_filter(id_field, id_value), &document.to_value(), true)
    }

    fn count(&self) -> Result<usize> {
        let n = self.client.count()?;
        usize::try_from(n).map_err(|_| GalcatError::RemoteStore(format!("document count {} overflows usize", n)))
    }
}

/// Filter matching one record by its identifier
pub(crate) fn identity_filter(id_field: &str, id_value: &Value) -> Value {
    let mut filter = serde_json::Map::new();
    filter.insert(id_field.to_string(), id_value.clone());
    Value::Object(filter)
}

/// Everything
pub(crate) fn match_all() -> Value {
    json!({})
}
