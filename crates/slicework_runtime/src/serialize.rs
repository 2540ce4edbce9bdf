//! Slice document serialization using `MessagePack`.
//!
//! Only the authored state of a component is written: direct entities and,
//! per instance, the id map, the data patch and the override flags. Live
//! instance entities are rebuilt from the source assets after loading.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use slicework_foundation::{Error, ErrorKind, Result};
use slicework_slice::SliceDocument;

/// Serializes a document to bytes using `MessagePack` format.
///
/// Uses named serialization to preserve struct field names.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(document: &SliceDocument) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(document)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

/// Deserializes a document from `MessagePack` bytes.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn from_bytes(bytes: &[u8]) -> Result<SliceDocument> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

fn io_error(action: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::new(ErrorKind::IoError(format!(
        "failed to {action} file '{}': {e}",
        path.display()
    )))
}

/// Saves a document to a file, replacing any existing content.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to,
/// or if serialization fails.
pub fn save_to_file<P: AsRef<Path>>(document: &SliceDocument, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_bytes(document)?;
    let file = File::create(path).map_err(|e| io_error("create", path, &e))?;

    let mut writer = BufWriter::new(file);
    writer
        .write_all(&bytes)
        .map_err(|e| io_error("write to", path, &e))?;
    writer.flush().map_err(|e| io_error("flush", path, &e))?;
    Ok(())
}

/// Loads a document from a `MessagePack` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or if deserialization fails.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<SliceDocument> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| io_error("open", path, &e))?;

    let mut bytes = Vec::new();
    BufReader::new(file)
        .read_to_end(&mut bytes)
        .map_err(|e| io_error("read", path, &e))?;

    from_bytes(&bytes)
}
