//! Live filesystem adapter using `std::fs`.

use std::path::Path;

use serde_json::Value;

use crate::ports::filesystem::FileSystem;

/// Live filesystem adapter backed by real disk I/O.
pub struct LiveFileSystem;

impl FileSystem for LiveFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_json(&self, path: &Path) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_json(
        &self,
        path: &Path,
        value: &Value,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut serialized = serde_json::to_string_pretty(value)?;
        serialized.push('\n');
        if let Ok(existing) = std::fs::read_to_string(path) {
            if existing == serialized {
                return Ok(false);
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serialized)?;
        Ok(true)
    }

    fn list_dir(
        &self,
        path: &Path,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        fn walk(
            dir: &Path,
            prefix: &str,
            out: &mut Vec<String>,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let relative = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                if entry.file_type()?.is_dir() {
                    walk(&entry.path(), &relative, out)?;
                } else {
                    out.push(relative);
                }
            }
            Ok(())
        }

        let mut entries = Vec::new();
        walk(path, "", &mut entries)?;
        entries.sort();
        Ok(entries)
    }
}
