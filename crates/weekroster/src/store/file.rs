//! JSON file backend.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{migrations, RosterStore};
use crate::error::{Error, Result};
use crate::roster::RosterSnapshot;

/// Keeps the roster as a pretty-printed JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// BLAKE3 of the bytes last read from or written to `path`.
    last_written: Mutex<Option<String>>,
}

impl FileStore {
    /// A store backed by `path`. Nothing is touched until the first load or save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: Mutex::new(None),
        }
    }

    /// Path of the JSON file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remember(&self, fingerprint: Option<String>) {
        if let Ok(mut slot) = self.last_written.lock() {
            *slot = fingerprint;
        }
    }

    fn is_unchanged(&self, fingerprint: &str) -> bool {
        self.last_written
            .lock()
            .map(|slot| slot.as_deref() == Some(fingerprint))
            .unwrap_or(false)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[async_trait]
impl RosterStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<RosterSnapshot> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No roster file at {}, starting empty", self.path.display());
                self.remember(None);
                return Ok(RosterSnapshot::new());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = migrations::decode_snapshot_str(&text)?;
        self.remember(Some(fingerprint(text.as_bytes())));
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &RosterSnapshot) -> Result<()> {
        let json = snapshot.to_json()?;
        let digest = fingerprint(json.as_bytes());
        if self.is_unchanged(&digest) {
            debug!("Roster unchanged, skipping write to {}", self.path.display());
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, json.as_bytes()).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        self.remember(Some(digest));
        info!("Saved roster to {}", self.path.display());
        Ok(())
    }
}
