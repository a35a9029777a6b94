//! Audits a cassette folder: reports entry counts and flags unparseable
//! or non-array cassette files.
//!
//! Usage: `cassette_audit <cassette_folder>`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{env, process};

use serde_json::Value;
use tapedeck::adapters::live::LiveFileSystem;
use tapedeck::ports::FileSystem;

/// Outcome of auditing one cassette file.
struct FileReport {
    name: String,
    outcome: Result<usize, String>,
}

fn audit_folder(folder: &Path) -> Result<Vec<FileReport>, String> {
    let fs = Arc::new(LiveFileSystem);
    let files = fs
        .list_dir(folder)
        .map_err(|e| format!("Failed to list {}: {e}", folder.display()))?;

    let mut reports = Vec::new();
    for name in files.into_iter().filter(|f| f.ends_with(".json")) {
        let path = folder.join(&name);
        let outcome = match fs.read_json(&path) {
            Ok(Value::Array(entries)) => Ok(entries.len()),
            Ok(_) => Err("not a JSON array".to_string()),
            Err(e) => Err(e.to_string()),
        };
        reports.push(FileReport { name, outcome });
    }
    Ok(reports)
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: cassette_audit <cassette_folder>");
        process::exit(1);
    }

    let folder = PathBuf::from(&args[1]);
    let reports = match audit_folder(&folder) {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let mut failures = 0;
    for report in &reports {
        match &report.outcome {
            Ok(count) => println!("{}: {count} entries", report.name),
            Err(reason) => {
                eprintln!("{}: {reason}", report.name);
                failures += 1;
            }
        }
    }
    println!("{} cassette file(s) audited", reports.len());
    if failures != 0 {
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_folder(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn audit_counts_entries_and_flags_bad_files() {
        let dir = temp_folder("tapedeck_audit_test");
        std::fs::write(dir.join("good.json"), r#"[{"path": "/"}]"#).unwrap();
        std::fs::write(dir.join("object.json"), "{}").unwrap();
        std::fs::write(dir.join("broken.json"), "not json").unwrap();
        std::fs::write(dir.join("ignored.txt"), "x").unwrap();

        let mut reports = audit_folder(&dir).unwrap();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(reports.len(), 3);
        assert!(reports[0].outcome.is_err()); // broken.json
        assert_eq!(reports[1].outcome.as_ref().ok(), Some(&1)); // good.json
        assert_eq!(reports[2].outcome.as_ref().err().map(String::as_str), Some("not a JSON array"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
