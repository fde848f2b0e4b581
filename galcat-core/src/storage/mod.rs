// storage/mod.rs
// On-disk layout: one JSON file per document, a references array, a curation object

pub mod io;

pub use io::{document_file_name, load_directory, read_document, write_document};
