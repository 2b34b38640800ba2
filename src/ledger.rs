//! Persistence ledger: the durable set of targets already actioned.
//!
//! Stored as a single JSON array of keys, read whole at engine start and
//! rewritten whole after every success. Writes go to a sibling temp file
//! which is then renamed over the ledger, so a crash mid-write leaves the
//! previous ledger intact.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// File-backed processed-key ledger.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger. A missing or unreadable file yields an empty set.
    pub fn load(&self) -> HashSet<String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no ledger yet, starting empty");
                return HashSet::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger unreadable, starting empty");
                return HashSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(keys) => {
                debug!(path = %self.path.display(), count = keys.len(), "ledger loaded");
                keys.into_iter().collect()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger corrupt, starting empty");
                HashSet::new()
            }
        }
    }

    /// Overwrite the ledger with `keys`.
    pub fn save(&self, keys: &HashSet<String>) -> Result<()> {
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();
        let json = serde_json::to_vec(&sorted)?;

        let tmp = self.tmp_path();
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::Persistence(e)
        })
    }

    /// Delete the ledger file. Missing is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Persistence(e)),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
