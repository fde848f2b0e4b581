// src/validator.rs
// Pre-insertion checks for incoming catalog documents

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::warn;

use crate::document::{ValueEntry, DEFAULT_ID_FIELD};
use crate::error::{GalcatError, Result};
use crate::reference::ReferenceResolver;
use crate::storage::io;
use crate::store::{identity_filter, DocumentStore};
use crate::units::UnitRegistry;

/// Which checks run and against which identifying field
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub id_field: String,
    /// Treat an unknown record as a failure instead of a warning
    pub require_existing: bool,
    pub check_references: bool,
    pub check_units: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            id_field: DEFAULT_ID_FIELD.to_string(),
            require_existing: false,
            check_references: true,
            check_units: true,
        }
    }
}

impl ValidationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn with_require_existing(mut self, require: bool) -> Self {
        self.require_existing = require;
        self
    }

    pub fn with_check_references(mut self, check: bool) -> Self {
        self.check_references = check;
        self
    }

    pub fn with_check_units(mut self, check: bool) -> Self {
        self.check_units = check;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    UnmatchedRecord,
    MalformedEntry,
    MissingMeasurement,
    MissingReference,
    UnknownReference,
    UnrecognizedUnit,
}

/// One reported problem, located by field and entry index
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub field: Option<String>,
    pub index: Option<usize>,
    pub message: String,
}

impl ValidationIssue {
    fn entry(kind: IssueKind, field: &str, index: usize, message: impl Into<String>) -> Self {
        ValidationIssue {
            kind,
            field: Some(field.to_string()),
            index: Some(index),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.field, self.index) {
            (Some(field), Some(i)) => write!(f, "{}[{}]: {}", field, i, self.message),
            (Some(field), None) => write!(f, "{}: {}", field, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub identifier: String,
    pub exists: bool,
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// All checks passed; warnings do not count
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

pub struct Validator<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    references: &'a ReferenceResolver,
    units: &'a UnitRegistry,
    options: ValidationOptions,
}

impl<'a, S: DocumentStore + ?Sized> Validator<'a, S> {
    pub fn new(
        store: &'a S,
        references: &'a ReferenceResolver,
        units: &'a UnitRegistry,
        options: ValidationOptions,
    ) -> Self {
        Validator {
            store,
            references,
            units,
            options,
        }
    }

    pub fn validate_file(&self, path: impl AsRef<Path>) -> Result<ValidationReport> {
        let doc: Value = io::read_json(path.as_ref())?;
        self.validate(&doc)
    }

    /// Run every check, collecting all failures.
    ///
    /// A missing identifier aborts with [`GalcatError::MissingIdentifier`].
    pub fn validate(&self, doc: &Value) -> Result<ValidationReport> {
        let map = doc
            .as_object()
            .ok_or_else(|| GalcatError::InvalidDocument("document must be a JSON object".into()))?;

        let identifier = self.check_name(map)?;
        let mut report = ValidationReport {
            exists: self.check_exists(map)?,
            identifier,
            issues: Vec::new(),
            warnings: Vec::new(),
        };

        if !report.exists {
            let issue = ValidationIssue {
                kind: IssueKind::UnmatchedRecord,
                field: Some(self.options.id_field.clone()),
                index: None,
                message: format!("'{}' is a new or unmatched record", report.identifier),
            };
            warn!(%issue, "validation");
            if self.options.require_existing {
                report.issues.push(issue);
            } else {
                report.warnings.push(issue);
            }
        }

        self.check_values(map, &mut report.issues);
        Ok(report)
    }

    /// Identifiers are non-blank strings or numbers
    fn check_name(&self, map: &Map<String, Value>) -> Result<String> {
        match map.get(&self.options.id_field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(GalcatError::missing_identifier(&self.options.id_field)),
        }
    }

    fn check_exists(&self, map: &Map<String, Value>) -> Result<bool> {
        let id_value = map.get(&self.options.id_field).cloned().unwrap_or(Value::Null);
        let filter = identity_filter(&self.options.id_field, &id_value);
        Ok(!self.store.find(&filter)?.is_empty())
    }

    fn check_values(&self, map: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
        for (field, value) in map {
            if *field == self.options.id_field {
                continue;
            }
            let Value::Array(items) = value else {
                continue;
            };
            // Arrays without any object are plain scalar lists
            if !items.iter().any(Value::is_object) {
                continue;
            }
            for (index, item) in items.iter().enumerate() {
                let before = issues.len();
                self.check_entry(field, index, item, issues);
                for issue in &issues[before..] {
                    warn!(%issue, "validation");
                }
            }
        }
    }

    fn check_entry(&self, field: &str, index: usize, item: &Value, issues: &mut Vec<ValidationIssue>) {
        if !item.is_object() {
            issues.push(ValidationIssue::entry(
                IssueKind::MalformedEntry,
                field,
                index,
                "entry is not an object",
            ));
            return;
        }
        let entry = match ValueEntry::deserialize(item) {
            Ok(entry) => entry,
            Err(e) => {
                issues.push(ValidationIssue::entry(IssueKind::MalformedEntry, field, index, e.to_string()));
                return;
            }
        };

        if !entry.has_measurement() {
            issues.push(ValidationIssue::entry(
                IssueKind::MissingMeasurement,
                field,
                index,
                "has neither value nor distribution",
            ));
        }

        if self.options.check_references {
            match entry.reference_key() {
                None => issues.push(ValidationIssue::entry(
                    IssueKind::MissingReference,
                    field,
                    index,
                    "has no reference",
                )),
                Some(key) if !self.references.contains(key) => issues.push(ValidationIssue::entry(
                    IssueKind::UnknownReference,
                    field,
                    index,
                    format!("reference '{}' does not resolve", key),
                )),
                Some(_) => {}
            }
        }

        if self.options.check_units {
            if let Some(unit) = entry.unit.as_deref() {
                if !self.units.is_recognized(unit) {
                    issues.push(ValidationIssue::entry(
                        IssueKind::UnrecognizedUnit,
                        field,
                        index,
                        format!("unit '{}' is not recognized", unit),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::reference::Reference;
    use crate::store::MemoryStore;
    use serde_json::json;

    struct Fixture {
        store: MemoryStore,
        references: ReferenceResolver,
        units: UnitRegistry,
    }

    fn fixture() -> Fixture {
        let gal = Document::from_value(&json!({
            "name": "Gal 1",
            "ra": [{"value": 9.14542, "unit": "deg", "reference": "Bellazzini_2006_1", "best": 1}]
        }))
        .unwrap();
        Fixture {
            store: MemoryStore::from_documents(vec![gal], "name").unwrap(),
            references: ReferenceResolver::from_references(vec![Reference::new("Bellazzini_2006_1")]).unwrap(),
            units: UnitRegistry::default(),
        }
    }

    fn validator(f: &Fixture, options: ValidationOptions) -> Validator<'_, MemoryStore> {
        Validator::new(&f.store, &f.references, &f.units, options)
    }

    #[test]
    fn test_valid_existing_document() {
        let f = fixture();
        let report = validator(&f, ValidationOptions::default())
            .validate(&json!({
                "name": "Gal 1",
                "dec": [{"value": 49.6, "unit": "deg", "reference": "Bellazzini_2006_1"}]
            }))
            .unwrap();

        assert!(report.is_valid());
        assert!(report.exists);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_name_is_fatal() {
        let f = fixture();
        let v = validator(&f, ValidationOptions::default());
        assert!(matches!(
            v.validate(&json!({"ra": [{"value": 1}]})),
            Err(GalcatError::MissingIdentifier { .. })
        ));
        assert!(matches!(
            v.validate(&json!({"name": "", "ra": [{"value": 1}]})),
            Err(GalcatError::MissingIdentifier { .. })
        ));
    }

    #[test]
    fn test_empty_or_structured_name_is_fatal() {
        let f = fixture();
        let v = validator(&f, ValidationOptions::default());
        for name in [json!({}), json!([]), json!(false), json!(true), json!(null), json!({"first": "Gal"})] {
            assert!(
                matches!(v.validate(&json!({"name": name})), Err(GalcatError::MissingIdentifier { .. })),
                "accepted {}",
                name
            );
        }

        let report = v.validate(&json!({"name": 42})).unwrap();
        assert_eq!(report.identifier, "42");
    }

    #[test]
    fn test_unmatched_record_is_warning_by_default() {
        let f = fixture();
        let doc = json!({"name": "Gal 3", "ra": [{"value": 5, "reference": "Bellazzini_2006_1"}]});

        let report = validator(&f, ValidationOptions::default()).validate(&doc).unwrap();
        assert!(report.is_valid());
        assert!(!report.exists);
        assert_eq!(report.warnings[0].kind, IssueKind::UnmatchedRecord);

        let strict = ValidationOptions::default().with_require_existing(true);
        let report = validator(&f, strict).validate(&doc).unwrap();
        assert!(!report.is_valid());
    }

    #[test]
    fn test_every_failure_is_reported() {
        let f = fixture();
        let report = validator(&f, ValidationOptions::default())
            .validate(&json!({
                "name": "Gal 1",
                "ra": [
                    {"unit": "deg", "reference": "Bellazzini_2006_1"},
                    {"value": 1.0, "reference": ""},
                    {"value": 1.0, "reference": "Nobody_1999", "unit": "penguin"},
                    {"value": "abc", "reference": "Bellazzini_2006_1"}
                ],
                "list2": [1, 2, 3]
            }))
            .unwrap();

        let kinds: Vec<IssueKind> = report.issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IssueKind::MissingMeasurement,
                IssueKind::MissingReference,
                IssueKind::UnknownReference,
                IssueKind::UnrecognizedUnit,
                IssueKind::MalformedEntry,
            ]
        );
        assert_eq!(report.issues[2].index, Some(2));
        assert!(!report.is_valid());
    }

    #[test]
    fn test_checks_can_be_disabled() {
        let f = fixture();
        let options = ValidationOptions::default()
            .with_check_references(false)
            .with_check_units(false);
        let report = validator(&f, options)
            .validate(&json!({"name": "Gal 1", "ra": [{"value": 1.0, "unit": "penguin"}]}))
            .unwrap();
        assert!(report.is_valid());
    }

    #[test]
    fn test_distribution_counts_as_measurement() {
        let f = fixture();
        let report = validator(&f, ValidationOptions::default())
            .validate(&json!({
                "name": "Gal 1",
                "ebv": [{"distribution": [0.9, 1.1], "reference": "Bellazzini_2006_1"}]
            }))
            .unwrap();
        assert!(report.is_valid());
    }
}
