//! Hyperparameter-Search Integration
//!
//! An external search service can overwrite selected configuration values
//! before a run starts and receive score callbacks during training. The
//! training loops depend only on the `SearchIntegration` capability trait and
//! call it conditionally; runs without a search service attached pass `None`
//! and skip all of it.
//!
//! The file-based implementation exchanges data through a trial directory:
//! parameter overrides are read from `params.json` (a flat JSON object) and
//! reports are appended to `reports.jsonl`, one JSON object per line.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::utils::error::Result;

/// A flat map of parameter name to override value
pub type ParamOverrides = HashMap<String, Value>;

/// Capability interface for an external hyperparameter search service
pub trait SearchIntegration {
    /// Fetch parameter overrides for this trial, if any
    fn overrides(&self) -> Result<Option<ParamOverrides>>;

    /// Report an intermediate validation score after an epoch
    fn report_intermediate(&self, epoch: usize, score: f64) -> Result<()>;

    /// Report the final best score of the run
    fn report_final(&self, score: f64) -> Result<()>;
}

/// File-based search integration rooted in a trial directory
#[derive(Debug, Clone)]
pub struct FileSearchIntegration {
    params_path: PathBuf,
    report_path: PathBuf,
}

impl FileSearchIntegration {
    /// Conventional layout: `<dir>/params.json` and `<dir>/reports.jsonl`
    pub fn from_trial_dir(dir: &Path) -> Self {
        Self {
            params_path: dir.join("params.json"),
            report_path: dir.join("reports.jsonl"),
        }
    }

    fn append_report(&self, record: Value) -> Result<()> {
        if let Some(parent) = self.report_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.report_path)?;
        writeln!(file, "{}", record)?;
        Ok(())
    }
}

impl SearchIntegration for FileSearchIntegration {
    fn overrides(&self) -> Result<Option<ParamOverrides>> {
        if !self.params_path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.params_path)?;
        let overrides: ParamOverrides = serde_json::from_str(&contents)?;
        info!(
            "loaded {} parameter overrides from {}",
            overrides.len(),
            self.params_path.display()
        );
        Ok(Some(overrides))
    }

    fn report_intermediate(&self, epoch: usize, score: f64) -> Result<()> {
        self.append_report(json!({
            "type": "intermediate",
            "epoch": epoch,
            "score": score,
        }))
    }

    fn report_final(&self, score: f64) -> Result<()> {
        self.append_report(json!({
            "type": "final",
            "score": score,
        }))
    }
}

/// Apply an `f64` override if present; returns whether the key was consumed.
pub fn override_f64(overrides: &ParamOverrides, key: &str, field: &mut f64) -> bool {
    match overrides.get(key).and_then(Value::as_f64) {
        Some(value) => {
            info!("override {}: {} -> {}", key, field, value);
            *field = value;
            true
        }
        None => false,
    }
}

/// Apply a `usize` override if present. The search service may offer integer
/// parameters as floats; those are truncated.
pub fn override_usize(overrides: &ParamOverrides, key: &str, field: &mut usize) -> bool {
    let value = overrides.get(key).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().map(|f| f as u64))
            .map(|u| u as usize)
    });
    match value {
        Some(value) => {
            info!("override {}: {} -> {}", key, field, value);
            *field = value;
            true
        }
        None => false,
    }
}

/// Warn about override keys no pipeline parameter consumed.
pub fn warn_unused(overrides: &ParamOverrides, consumed: &[&str]) {
    for key in overrides.keys() {
        if !consumed.contains(&key.as_str()) {
            warn!("ignoring unknown parameter override '{}'", key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_params_file_yields_no_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let integration = FileSearchIntegration::from_trial_dir(tmp.path());
        assert!(integration.overrides().unwrap().is_none());
    }

    #[test]
    fn test_overrides_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("params.json"),
            r#"{"learning_rate": 0.01, "batch_size": 32.0}"#,
        )
        .unwrap();

        let integration = FileSearchIntegration::from_trial_dir(tmp.path());
        let overrides = integration.overrides().unwrap().unwrap();

        let mut lr = 0.001f64;
        let mut batch = 64usize;
        assert!(override_f64(&overrides, "learning_rate", &mut lr));
        // Float-typed integer is truncated, as the service may send either
        assert!(override_usize(&overrides, "batch_size", &mut batch));
        assert!(!override_f64(&overrides, "absent", &mut lr));

        assert_eq!(lr, 0.01);
        assert_eq!(batch, 32);
    }

    #[test]
    fn test_reports_are_appended_as_json_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let integration = FileSearchIntegration::from_trial_dir(tmp.path());

        integration.report_intermediate(0, 0.5).unwrap();
        integration.report_intermediate(1, 0.6).unwrap();
        integration.report_final(0.6).unwrap();

        let contents = std::fs::read_to_string(tmp.path().join("reports.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);

        let last: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(last["type"], "final");
        assert_eq!(last["score"], 0.6);
    }
}
