// galcat-core/src/lib.rs
// Pure Rust API for querying a catalog of multi-sourced galaxy measurements

pub mod error;
pub mod document;
pub mod storage;
pub mod query;
pub mod units;
pub mod curation;
pub mod materialize;
pub mod reference;
pub mod store;
pub mod validator;
pub mod config;
pub mod catalog;

// Public exports
pub use error::{GalcatError, Result};
pub use document::{Document, FieldValue, ValueEntry, DEFAULT_ID_FIELD};
pub use query::{evaluate, evaluate_json, Query};
pub use units::{Dimension, Quantity, Unit, UnitRegistry};
pub use curation::Curation;
pub use materialize::{Cell, ColumnOrder, Materializer, Table};
pub use reference::{Reference, ReferenceResolver};
pub use store::{DocumentStore, MemoryStore, RemoteClient, RemoteStore};
pub use validator::{IssueKind, ValidationOptions, ValidationReport, Validator};
pub use config::CatalogConfig;
pub use catalog::{Catalog, MergeOptions, MergeOutcome};
