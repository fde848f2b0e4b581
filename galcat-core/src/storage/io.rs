// storage/io.rs
// Low-level file operations for catalog documents

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::document::Document;
use crate::error::{GalcatError, Result};

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write `value` as pretty-printed JSON, replacing the file
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text)?;
    Ok(())
}

/// File name for a document: identifier trimmed, spaces as underscores
pub fn document_file_name(identifier: &str) -> String {
    format!("{}.json", identifier.trim().replace(' ', "_"))
}

pub fn read_document(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)?;
    Document::from_json(&text).map_err(|e| match e {
        GalcatError::InvalidDocument(msg) => {
            GalcatError::InvalidDocument(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Write one document into `out_dir`, named after its identifying field
pub fn write_document(document: &Document, id_field: &str, out_dir: &Path) -> Result<PathBuf> {
    let identifier = document
        .identifier_str(id_field)
        .ok_or_else(|| GalcatError::missing_identifier(id_field))?;
    let path = out_dir.join(document_file_name(identifier));
    fs::write(&path, document.to_json()?)?;
    debug!(path = %path.display(), "wrote document");
    Ok(path)
}

/// Every `*.json` file of `dir` in file name order, hidden files skipped
pub fn load_directory(dir: &Path) -> Result<Vec<Document>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') || !file_name.ends_with(".json") || !path.is_file() {
            continue;
        }
        paths.push(path);
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in &paths {
        documents.push(read_document(path)?);
    }
    info!(dir = %dir.display(), count = documents.len(), "loaded documents");
    Ok(documents)
}
