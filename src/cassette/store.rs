//! Cassette store — persistence layer for recorded interactions.
//!
//! The store owns the on-disk JSON representation exclusively. All I/O goes
//! through the `FileSystem` port so it works against any adapter.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::error::RecorderError;
use crate::ports::FileSystem;

/// Reads and writes cassette files (JSON arrays of recorded interactions).
pub struct CassetteStore {
    fs: Arc<dyn FileSystem>,
}

impl CassetteStore {
    /// Creates a store backed by the given filesystem port.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Returns `true` if a cassette file exists at the path.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        self.fs.exists(path)
    }

    /// Loads the entries of a cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON array.
    pub fn read(&self, path: &Path) -> Result<Vec<Value>, RecorderError> {
        let content = self
            .fs
            .read_json(path)
            .map_err(|e| RecorderError::Store(format!("failed to read {}: {e}", path.display())))?;
        match content {
            Value::Array(entries) => Ok(entries),
            other => Err(RecorderError::Store(format!(
                "cassette {} is not an array (found {})",
                path.display(),
                type_name(&other)
            ))),
        }
    }

    /// Writes the entries back to disk, returning whether content changed.
    ///
    /// With `keep_order` set, an existing file holding the same entries in a
    /// different order is left untouched: positional fidelity of the original
    /// recording wins over consumption order. Sessions that observed
    /// out-of-order or unmatched entries pass `keep_order: false`, since
    /// positional fidelity is already lost.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(
        &self,
        path: &Path,
        entries: Vec<Value>,
        keep_order: bool,
    ) -> Result<bool, RecorderError> {
        let mut entries = entries;
        if keep_order && self.fs.exists(path) {
            if let Ok(existing) = self.read(path) {
                if same_entries(&existing, &entries) {
                    entries = existing;
                }
            }
        }
        self.fs
            .write_json(path, &Value::Array(entries))
            .map_err(|e| RecorderError::Store(format!("failed to write {}: {e}", path.display())))
    }

    /// Verifies that every file in the cassette folder was accounted for by
    /// some session, catching stale or orphaned fixtures.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::UnexpectedFiles`] naming the strays.
    pub fn shutdown(&self, folder: &Path, known_names: &[String]) -> Result<(), RecorderError> {
        let files = self
            .fs
            .list_dir(folder)
            .map_err(|e| RecorderError::Store(format!("failed to list {}: {e}", folder.display())))?;
        let unexpected: Vec<String> =
            files.into_iter().filter(|f| !known_names.contains(f)).collect();
        if unexpected.is_empty() {
            Ok(())
        } else {
            Err(RecorderError::UnexpectedFiles(unexpected.join(", ")))
        }
    }
}

/// Compares two entry lists as unordered multisets.
fn same_entries(first: &[Value], second: &[Value]) -> bool {
    if first.len() != second.len() {
        return false;
    }
    let mut remaining: Vec<&Value> = second.iter().collect();
    for entry in first {
        match remaining.iter().position(|candidate| *candidate == entry) {
            Some(idx) => {
                remaining.swap_remove(idx);
            }
            None => return false,
        }
    }
    true
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
