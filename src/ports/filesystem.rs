//! Filesystem port for cassette file I/O.

use std::path::Path;

use serde_json::Value;

/// Provides filesystem access for reading and writing cassette files.
///
/// Abstracting the filesystem keeps the store testable without touching
/// the real disk.
pub trait FileSystem: Send + Sync {
    /// Returns `true` if the path exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not valid JSON.
    fn read_json(&self, path: &Path) -> Result<Value, Box<dyn std::error::Error + Send + Sync>>;

    /// Writes a value as pretty-printed JSON, creating parent directories.
    ///
    /// Returns whether the file content actually changed; an identical
    /// existing file is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (permissions, disk full, etc.).
    fn write_json(
        &self,
        path: &Path,
        value: &Value,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Recursively lists the files below a directory as sorted
    /// slash-separated relative paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a directory or cannot be read.
    fn list_dir(
        &self,
        path: &Path,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>>;
}
