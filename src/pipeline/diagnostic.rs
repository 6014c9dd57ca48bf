//! Diagnostic dump: writes raw model output of failing batches to disk.
//!
//! **Activation**:
//! - Dev builds (`is_dev()`): auto-enabled, writes to `~/RiskLens/diagnostic/`
//! - Prod builds: disabled unless `RISKLENS_DUMP_DIR` is set
//! - `RISKLENS_DUMP_DIR` overrides the default in both modes
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{run_id}/
//!   batch-2-attempt-1-raw.txt
//!   batch-2-attempt-1-error.json
//! ```
//!
//! Every writer logs and swallows its own failures; a dump never fails a run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::config;

/// Environment variable that enables the dump and sets its base directory.
pub const ENV_DUMP_DIR: &str = "RISKLENS_DUMP_DIR";

/// Diagnostic dump subdirectory name inside app data.
const DIAGNOSTIC_SUBDIR: &str = "diagnostic";

// ──────────────────────────────────────────────
// Dump directory resolution
// ──────────────────────────────────────────────

/// Resolve the base dump directory.
///
/// Priority:
/// 1. `RISKLENS_DUMP_DIR` (explicit override, any build)
/// 2. `~/RiskLens/diagnostic/` in dev builds
/// 3. `None` in production
pub fn resolve_base_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_DUMP_DIR) {
        if !dir.trim().is_empty() {
            return Some(PathBuf::from(dir));
        }
    }

    if config::is_dev() {
        return Some(config::app_data_dir().join(DIAGNOSTIC_SUBDIR));
    }

    None
}

/// Returns `{base}/{run_id}`, creating it. `None` (with a warning) if creation fails.
pub fn dump_dir_for(base: &Path, run_id: &Uuid) -> Option<PathBuf> {
    let dir = base.join(run_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

// ──────────────────────────────────────────────
// Dump writers
// ──────────────────────────────────────────────

/// Write a JSON artifact, pretty-printed.
pub fn dump_json<T: Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => match std::fs::write(&path, json.as_bytes()) {
            Ok(()) => tracing::debug!(
                path = %path.display(),
                size = json.len(),
                "Diagnostic dump: JSON written"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Diagnostic dump: failed to write JSON"
            ),
        },
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

/// Write a text artifact (raw model output).
pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    let path = dir.join(filename);
    match std::fs::write(&path, text.as_bytes()) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = text.len(),
            "Diagnostic dump: text written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write text"
        ),
    }
}

#[derive(Serialize)]
struct FailureRecord<'a> {
    batch: usize,
    attempt: u32,
    error: &'a str,
    raw_len: usize,
}

/// Dump the accumulated output of a batch attempt whose extraction failed.
pub fn dump_failed_extraction(
    base: &Path,
    run_id: &Uuid,
    batch: usize,
    attempt: u32,
    raw: &str,
    error: &str,
) {
    let Some(dir) = dump_dir_for(base, run_id) else {
        return;
    };
    let stem = format!("batch-{batch}-attempt-{attempt}");
    dump_text(&dir, &format!("{stem}-raw.txt"), raw);
    dump_json(
        &dir,
        &format!("{stem}-error.json"),
        &FailureRecord {
            batch,
            attempt,
            error,
            raw_len: raw.len(),
        },
    );
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_dir_for_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let dir = dump_dir_for(tmp.path(), &run_id).unwrap();

        assert!(dir.exists());
        assert!(dir.ends_with(run_id.to_string()));
    }

    #[test]
    fn base_dir_resolves_in_dev_builds() {
        // Test builds are debug builds: either the override or the dev default applies.
        assert!(resolve_base_dir().is_some());
    }

    #[test]
    fn dump_json_writes_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();

        #[derive(Serialize)]
        struct Info {
            name: String,
            value: u32,
        }

        dump_json(
            tmp.path(),
            "info.json",
            &Info {
                name: "test".to_string(),
                value: 42,
            },
        );

        let content = std::fs::read_to_string(tmp.path().join("info.json")).unwrap();
        assert!(content.contains("\"name\": \"test\""));
        assert!(content.contains("\"value\": 42"));
        assert!(content.contains('\n'));
    }

    #[test]
    fn dump_text_writes_text() {
        let tmp = tempfile::tempdir().unwrap();
        dump_text(tmp.path(), "raw.txt", "{\"riskLevel\": oops");
        let content = std::fs::read_to_string(tmp.path().join("raw.txt")).unwrap();
        assert_eq!(content, "{\"riskLevel\": oops");
    }

    #[test]
    fn failed_extraction_writes_both_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();

        dump_failed_extraction(tmp.path(), &run_id, 2, 1, "not json", "No JSON object found");

        let dir = tmp.path().join(run_id.to_string());
        assert_eq!(
            std::fs::read_to_string(dir.join("batch-2-attempt-1-raw.txt")).unwrap(),
            "not json"
        );
        let err = std::fs::read_to_string(dir.join("batch-2-attempt-1-error.json")).unwrap();
        assert!(err.contains("\"batch\": 2"));
        assert!(err.contains("No JSON object found"));
    }

    #[test]
    fn writers_handle_failure_gracefully() {
        let bad_dir = Path::new("/nonexistent/path/that/does/not/exist");
        dump_text(bad_dir, "test.txt", "data");
        dump_json(bad_dir, "test.json", &"data");
        // No panic = success
    }
}
