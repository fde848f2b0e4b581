// src/config.rs
// Catalog configuration: where documents, references and curation live

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::DEFAULT_ID_FIELD;
use crate::error::Result;
use crate::storage::io;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory of one-JSON-file-per-document
    pub data_dir: PathBuf,

    /// JSON array of references
    pub references_file: Option<PathBuf>,

    /// JSON object field -> preferred reference key
    pub curation_file: Option<PathBuf>,

    /// Field identifying a record
    pub id_field: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            data_dir: PathBuf::from("data"),
            references_file: None,
            curation_file: None,
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        io::read_json(path.as_ref())
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_references_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.references_file = Some(path.into());
        self
    }

    pub fn with_curation_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.curation_file = Some(path.into());
        self
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.id_field, "name");
        assert!(config.references_file.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("galcat.json");
        std::fs::write(&path, r#"{"data_dir": "galaxies", "references_file": "refs.json"}"#).unwrap();

        let config = CatalogConfig::from_json_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("galaxies"));
        assert_eq!(config.references_file, Some(PathBuf::from("refs.json")));
        assert_eq!(config.id_field, "name");
    }

    #[test]
    fn test_builder() {
        let config = CatalogConfig::new()
            .with_data_dir("d")
            .with_curation_file("c.json")
            .with_id_field("key");
        assert_eq!(config.data_dir, PathBuf::from("d"));
        assert_eq!(config.curation_file, Some(PathBuf::from("c.json")));
        assert_eq!(config.id_field, "key");
    }
}
