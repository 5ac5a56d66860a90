use gossamer_spider::error::Result;
use gossamer_spider::store::{ArtifactStore, RecordSink};
use gossamer_spider::walk::UrlRecord;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Filesystem-backed store for one source's output directory: JSON
/// manifests under `<root>/<name>.json` and cleaned page artifacts under
/// `<root>/<key>.html`. Artifacts and raw files are write-once; existing
/// files are never overwritten, which is what the archiver's resumability
/// check relies on.
pub struct FsStore {
    root: PathBuf,
    source: String,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            source: source.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(format!("{}.json", name));
        let rendered = serde_json::to_string_pretty(value)?;
        fs::write(&path, rendered)?;
        Ok(path)
    }

    /// Reads a traversal manifest back for downstream jobs.
    pub fn load_records(path: &Path) -> Result<Vec<UrlRecord>> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write-once storage for raw files that carry their own name
    /// (downloaded images).
    pub fn put_file(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        if path.exists() {
            debug!("File already present: {}", path.display());
            return Ok(path);
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    fn artifact_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.html", key))
    }
}

impl ArtifactStore for FsStore {
    fn contains(&self, key: &str) -> bool {
        self.artifact_path(key).exists()
    }

    fn put(&self, key: &str, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.artifact_path(key);
        if path.exists() {
            debug!("Artifact already present: {}", path.display());
            return Ok(path);
        }
        fs::write(&path, contents)?;
        Ok(path)
    }
}

impl RecordSink for FsStore {
    fn persist_records(&self, records: &[UrlRecord]) -> Result<()> {
        let path = self.save_json(&self.source, &records)?;
        info!("Saved {} URL records to {}", records.len(), path.display());
        Ok(())
    }
}
