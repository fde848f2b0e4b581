// src/catalog.rs
// Catalog facade: one store, its references and curation, injected explicitly

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::CatalogConfig;
use crate::curation::Curation;
use crate::document::{Document, FieldValue, ValueEntry};
use crate::error::{GalcatError, Result};
use crate::materialize::{ColumnOrder, Materializer, Table};
use crate::reference::ReferenceResolver;
use crate::storage::io;
use crate::store::{identity_filter, match_all, DocumentStore, MemoryStore};
use crate::units::UnitRegistry;
use crate::validator::{ValidationOptions, ValidationReport, Validator};

/// How [`Catalog::add_data`] treats incoming entries
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// Replace an existing entry with the same reference instead of appending
    pub update_value: bool,
    /// Validate the incoming document first
    pub validate: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            update_value: false,
            validate: true,
        }
    }
}

impl MergeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update_value(mut self, update: bool) -> Self {
        self.update_value = update;
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Merged { appended: usize, updated: usize },
    /// No record carries the identifier; load it as a new document instead
    Unmatched,
    Rejected(ValidationReport),
}

pub struct Catalog<S: DocumentStore = MemoryStore> {
    store: S,
    references: ReferenceResolver,
    curation: Curation,
    units: UnitRegistry,
    config: CatalogConfig,
}

impl Catalog<MemoryStore> {
    /// Load documents, references and curation named by `config`
    pub fn open(config: CatalogConfig) -> Result<Self> {
        let documents = io::load_directory(&config.data_dir)?;
        let store = MemoryStore::from_documents(documents, &config.id_field)?;

        let references = match &config.references_file {
            Some(path) => ReferenceResolver::load(path)?,
            None => ReferenceResolver::new(),
        };

        let curation = match &config.curation_file {
            Some(path) if path.exists() => Curation::load(path)?,
            _ => Curation::new(),
        };

        info!(
            documents = store.len(),
            references = references.len(),
            curated_fields = curation.len(),
            "opened catalog"
        );
        Ok(Catalog::with_store(store, references, config).with_curation(curation))
    }
}

impl<S: DocumentStore> Catalog<S> {
    pub fn with_store(store: S, references: ReferenceResolver, config: CatalogConfig) -> Self {
        Catalog {
            store,
            references,
            curation: Curation::new(),
            units: UnitRegistry::default(),
            config,
        }
    }

    pub fn with_curation(mut self, curation: Curation) -> Self {
        self.curation = curation;
        self
    }

    pub fn with_units(mut self, units: UnitRegistry) -> Self {
        self.units = units;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn references(&self) -> &ReferenceResolver {
        &self.references
    }

    pub fn curation(&self) -> &Curation {
        &self.curation
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Number of documents; remote stores may fail to answer
    pub fn count(&self) -> Result<usize> {
        self.store.count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// Documents matching `query`
    pub fn query(&self, query: &Value) -> Result<Vec<Document>> {
        self.store.find(query)
    }

    /// Matching documents with full references embedded; stored documents
    /// are left untouched.
    pub fn query_embedded(&self, query: &Value) -> Result<Vec<Value>> {
        Ok(self
            .store
            .find(query)?
            .iter()
            .map(|doc| self.references.embed(doc))
            .collect())
    }

    /// Best-value table of the matching documents. `selection` overrides the
    /// stored curation field by field.
    pub fn query_table(&self, query: &Value, selection: &Curation, order: ColumnOrder) -> Result<Table> {
        let documents = self.store.find(query)?;
        let overrides = self.curation.overlay(selection);
        Ok(Materializer::new(&self.units).materialize(&documents, &overrides, order))
    }

    /// Whole catalog as a best-value table
    pub fn table(&self) -> Result<Table> {
        self.query_table(&match_all(), &Curation::new(), ColumnOrder::FirstRow)
    }

    /// Insert or replace by identifier
    pub fn load_document(&mut self, document: Document) -> Result<()> {
        let id_field = self.config.id_field.clone();
        let id_value = document
            .identifier(&id_field)
            .filter(|v| match v {
                Value::String(s) => !s.trim().is_empty(),
                Value::Number(_) => true,
                _ => false,
            })
            .cloned()
            .ok_or_else(|| GalcatError::missing_identifier(&id_field))?;
        self.store.upsert(&id_field, &id_value, document)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let document = io::read_document(path.as_ref())?;
        self.load_document(document)
    }

    pub fn validator(&self, options: ValidationOptions) -> Validator<'_, S> {
        Validator::new(&self.store, &self.references, &self.units, options)
    }

    /// Validate with default options on the configured identifying field
    pub fn validate(&self, document: &Value) -> Result<ValidationReport> {
        let options = ValidationOptions::default().with_id_field(self.config.id_field.clone());
        self.validator(options).validate(document)
    }

    /// Merge new measurements into an existing record.
    ///
    /// Missing identifiers are errors, as is a scalar aimed at a field that
    /// holds value entries. Unknown records and failed validation are
    /// reported through [`MergeOutcome`]. None of these change the catalog.
    pub fn add_data(&mut self, incoming: Document, options: MergeOptions) -> Result<MergeOutcome> {
        let id_field = self.config.id_field.clone();
        let id_value = match incoming.identifier_str(&id_field) {
            Some(id) => Value::from(id),
            None => return Err(GalcatError::missing_identifier(&id_field)),
        };

        if options.validate {
            let report = self.validate(&incoming.to_value())?;
            if !report.is_valid() {
                warn!(id = %id_value, issues = report.issues.len(), "rejected incoming data");
                return Ok(MergeOutcome::Rejected(report));
            }
        }

        let Some(mut existing) = self.store.find(&identity_filter(&id_field, &id_value))?.into_iter().next() else {
            warn!(id = %id_value, "no matching record; load it as a new document instead");
            return Ok(MergeOutcome::Unmatched);
        };

        let (appended, updated) = merge_into(&mut existing, &incoming, &id_field, options.update_value)?;
        self.store.upsert(&id_field, &id_value, existing)?;
        info!(id = %id_value, appended, updated, "merged data");
        Ok(MergeOutcome::Merged { appended, updated })
    }

    /// Write one document as `<sanitized identifier>.json` in `out_dir`
    pub fn save_document(&self, document: &Document, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = io::write_document(document, &self.config.id_field, out_dir.as_ref())?;
        info!(path = %path.display(), "saved document");
        Ok(path)
    }

    pub fn save_all(&self, out_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let out_dir = out_dir.as_ref();
        self.store
            .find(&match_all())?
            .iter()
            .map(|doc| io::write_document(doc, &self.config.id_field, out_dir))
            .collect()
    }

    /// Prefer `reference` for `field` in future tables
    pub fn curate(&mut self, field: impl Into<String>, reference: impl Into<String>) {
        self.curation.set(field, reference);
    }

    /// Merge the in-memory curation into the curation file at `path`
    pub fn save_curation(&self, path: impl AsRef<Path>) -> Result<Curation> {
        self.curation.save(path)
    }
}

/// Fold `incoming` into `existing`; returns (appended, updated) counts
fn merge_into(existing: &mut Document, incoming: &Document, id_field: &str, update_value: bool) -> Result<(usize, usize)> {
    let mut appended = 0;
    let mut updated = 0;

    for (field, value) in incoming.fields() {
        if field == id_field {
            continue;
        }
        match value {
            FieldValue::Scalar(v) => {
                // Value entries are never dropped by a merge
                if existing.get(field).is_some_and(FieldValue::is_multi_valued) {
                    return Err(GalcatError::InvalidDocument(format!(
                        "field '{}' holds value entries and cannot be overwritten by a scalar",
                        field
                    )));
                }
                existing.set(field.clone(), v.clone());
                updated += 1;
            }
            FieldValue::Entries(entries) => {
                for entry in entries {
                    if update_value && replace_same_reference(existing, field, entry) {
                        updated += 1;
                    } else {
                        existing.push_entry(field, entry.clone())?;
                        appended += 1;
                    }
                    if entry.is_best() {
                        demote_other_best(existing, field, entry);
                    }
                }
            }
        }
    }
    Ok((appended, updated))
}

fn replace_same_reference(existing: &mut Document, field: &str, entry: &ValueEntry) -> bool {
    let Some(key) = entry.reference_key() else {
        return false;
    };
    let Some(entries) = existing.get_mut(field).and_then(FieldValue::as_entries_mut) else {
        return false;
    };
    match entries.iter_mut().find(|e| e.reference_key() == Some(key)) {
        Some(slot) => {
            *slot = entry.clone();
            true
        }
        None => false,
    }
}

/// Keep a single best=1 entry per field
fn demote_other_best(existing: &mut Document, field: &str, best: &ValueEntry) {
    let Some(entries) = existing.get_mut(field).and_then(FieldValue::as_entries_mut) else {
        return;
    };
    let keep = entries.iter().rposition(|e| e == best);
    for (i, e) in entries.iter_mut().enumerate() {
        if Some(i) != keep && e.is_best() {
            e.best = Some(0);
        }
    }
}
