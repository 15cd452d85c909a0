//! Result files on disk
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/<surname>/<test>/<test>_<timestamp>_results.json
//! <root>/<surname>/summary_<timestamp>.json
//! <root>/<surname>/summary_<timestamp>.txt
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use vibrobox_core::Summary;

/// Timestamp format used in file names and the summary
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

const RESULTS_SUFFIX: &str = "_results.json";

/// The three procedures, as named on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestKind {
    /// Staircase thresholds
    Threshold,
    /// Region localization
    Spatial,
    /// Level discrimination
    Discrimination,
}

impl TestKind {
    /// Directory and file prefix
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Spatial => "spatial",
            Self::Discrimination => "discrimination",
        }
    }
}

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Make a surname safe for use as a directory name.
///
/// Latin and Cyrillic letters, digits, `_` and `-` are kept; every run of
/// other characters becomes a single `_`. An empty result becomes `anon`.
pub fn sanitize_surname(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.trim().chars() {
        let keep = c.is_ascii_alphanumeric() || c == '_' || c == '-' || ('А'..='я').contains(&c);
        if keep {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    if out.is_empty() {
        "anon".to_string()
    } else {
        out
    }
}

/// Result files of one patient
#[derive(Clone, Debug)]
pub struct ResultStore {
    patient_dir: PathBuf,
}

impl ResultStore {
    /// Store for `surname` under `root`. Nothing is created until a write.
    pub fn new(root: impl AsRef<Path>, surname: &str) -> Self {
        Self {
            patient_dir: root.as_ref().join(sanitize_surname(surname)),
        }
    }

    /// Patient directory
    pub fn patient_dir(&self) -> &Path {
        &self.patient_dir
    }

    /// Directory of one test's results
    pub fn test_dir(&self, kind: TestKind) -> PathBuf {
        self.patient_dir.join(kind.as_str())
    }

    /// Write a run result as pretty JSON. Returns the file path.
    pub fn save_result<T: Serialize>(
        &self,
        kind: TestKind,
        result: &T,
        timestamp: &str,
    ) -> anyhow::Result<PathBuf> {
        let dir = self.test_dir(kind);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(format!("{}_{timestamp}{RESULTS_SUFFIX}", kind.as_str()));
        write_json(&path, result)?;
        tracing::info!(path = %path.display(), "Result saved");
        Ok(path)
    }

    /// Most recent result file of a test, if any.
    pub fn latest_result_path(&self, kind: TestKind) -> anyhow::Result<Option<PathBuf>> {
        let dir = self.test_dir(kind);
        if !dir.is_dir() {
            return Ok(None);
        }
        let prefix = format!("{}_", kind.as_str());
        let mut latest: Option<(String, PathBuf)> = None;
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(&prefix) && name.ends_with(RESULTS_SUFFIX)) {
                continue;
            }
            // Timestamps sort lexicographically
            if latest.as_ref().map_or(true, |(best, _)| name > *best) {
                latest = Some((name, entry.path()));
            }
        }
        Ok(latest.map(|(_, path)| path))
    }

    /// Load the most recent result of a test, if any.
    pub fn latest_result<T: DeserializeOwned>(&self, kind: TestKind) -> anyhow::Result<Option<T>> {
        self.latest_result_path(kind)?
            .map(|path| read_json(&path))
            .transpose()
    }

    /// Write the summary as JSON and plain text, stamped with its datetime.
    pub fn save_summary(&self, summary: &Summary) -> anyhow::Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(&self.patient_dir)
            .with_context(|| format!("Failed to create {}", self.patient_dir.display()))?;
        let json_path = self
            .patient_dir
            .join(format!("summary_{}.json", summary.datetime));
        let txt_path = self
            .patient_dir
            .join(format!("summary_{}.txt", summary.datetime));

        write_json(&json_path, summary)?;
        fs::write(&txt_path, summary.render_text())
            .with_context(|| format!("Failed to write {}", txt_path.display()))?;
        tracing::info!(path = %json_path.display(), "Summary saved");
        Ok((json_path, txt_path))
    }
}

/// Read a JSON file into `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use vibrobox_core::ThresholdResult;

    use super::*;

    #[test]
    fn test_sanitize_surname() {
        assert_eq!(sanitize_surname("Ivanov"), "Ivanov");
        assert_eq!(sanitize_surname("  Smith-Jones  "), "Smith-Jones");
        assert_eq!(sanitize_surname("O'Neil Jr."), "O_Neil_Jr_");
        assert_eq!(sanitize_surname("Иванов"), "Иванов");
        assert_eq!(sanitize_surname("a  b"), "a_b");
        assert_eq!(sanitize_surname("   "), "anon");
        assert_eq!(sanitize_surname(""), "anon");
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), "2025-08-05T12-30-00".len());
        assert_eq!(&ts[10..11], "T");
    }

    #[test]
    fn test_save_and_reload_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path(), "Doe J.");

        let mut older = ThresholdResult::default();
        older.thresholds.insert(0, 10);
        let mut newer = ThresholdResult::default();
        newer.thresholds.insert(0, 14);

        store
            .save_result(TestKind::Threshold, &older, "2025-01-01T10-00-00")
            .unwrap();
        let path = store
            .save_result(TestKind::Threshold, &newer, "2025-01-02T10-00-00")
            .unwrap();

        assert!(path.ends_with("Doe_J_/threshold/threshold_2025-01-02T10-00-00_results.json"));
        let loaded: ThresholdResult = store.latest_result(TestKind::Threshold).unwrap().unwrap();
        assert_eq!(loaded, newer);

        let missing: Option<ThresholdResult> = store.latest_result(TestKind::Spatial).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_save_summary_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path(), "Petrov");
        let summary = Summary::build("Petrov", "2025-08-05T12-30-00", None, None, None).unwrap();

        let (json, txt) = store.save_summary(&summary).unwrap();
        assert!(json.ends_with("Petrov/summary_2025-08-05T12-30-00.json"));
        assert!(txt.exists());
        let reloaded: Summary = read_json(&json).unwrap();
        assert_eq!(reloaded, summary);
        assert!(fs::read_to_string(txt).unwrap().contains("Surname: Petrov"));
    }
}
