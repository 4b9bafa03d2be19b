//! The `deposit.json` manifest: the registry of files, metadata documents and
//! the active deposit endpoint for a package.
//!
//! The manifest is loaded whole, mutated in memory and written back with
//! [`write_atomic`], so a crashed process leaves either the old or the new
//! document on disk, never a truncated one.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::deposit::Endpoint;
use crate::error::{DipError, DipResult};

/// A content file registered into the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub added: DateTime<Utc>,
}

/// A descriptive-metadata document registered into the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub path: PathBuf,
    pub added: DateTime<Utc>,
    pub format: String,
}

impl FileEntry {
    /// `<added> <path>`, as listed by `dip show`.
    pub fn display_line(&self) -> String {
        format!("{} {}", timestamp(&self.added), self.path.display())
    }
}

impl MetadataEntry {
    /// `<added> <path> (<format>)`, as listed by `dip show`.
    pub fn display_line(&self) -> String {
        format!(
            "{} {} ({})",
            timestamp(&self.added),
            self.path.display(),
            self.format
        )
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
    #[serde(default)]
    pub endpoint: Option<Endpoint>,
}

impl Manifest {
    pub fn load(path: &Path) -> DipResult<Self> {
        let raw = std::fs::read(path).map_err(|e| DipError::io(path, e))?;
        serde_json::from_slice(&raw).map_err(|source| DipError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> DipResult<()> {
        let mut json = serde_json::to_vec_pretty(self).map_err(|source| DipError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        json.push(b'\n');
        write_atomic(path, &json)?;
        debug!(
            path = %path.display(),
            files = self.files.len(),
            metadata = self.metadata.len(),
            "Saved manifest"
        );
        Ok(())
    }

    /// Registers `path`, refreshing the timestamp if it is already present.
    pub fn upsert_file(&mut self, path: PathBuf, added: DateTime<Utc>) {
        match self.files.iter_mut().find(|f| f.path == path) {
            Some(existing) => existing.added = added,
            None => self.files.push(FileEntry { path, added }),
        }
    }

    /// Deregisters `path`; returns whether an entry was removed.
    pub fn remove_file(&mut self, path: &Path) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.path != path);
        self.files.len() != before
    }

    /// Deregisters every file at or below `dir`; returns the removed paths.
    pub fn remove_files_under(&mut self, dir: &Path) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        self.files.retain(|f| {
            if f.path.starts_with(dir) {
                removed.push(f.path.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn upsert_metadata(&mut self, path: PathBuf, format: &str, added: DateTime<Utc>) {
        match self.metadata.iter_mut().find(|m| m.path == path) {
            Some(existing) => {
                existing.added = added;
                existing.format = format.to_string();
            }
            None => self.metadata.push(MetadataEntry {
                path,
                added,
                format: format.to_string(),
            }),
        }
    }

    pub fn remove_metadata(&mut self, path: &Path) -> bool {
        let before = self.metadata.len();
        self.metadata.retain(|m| m.path != path);
        self.metadata.len() != before
    }
}

/// Writes `content` to `path` through a temporary file in the same directory
/// followed by a rename.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> DipResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DipError::io(dir, e))?;
    tmp.write_all(content).map_err(|e| DipError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| DipError::io(path, e))?;
    tmp.persist(path).map_err(|e| DipError::io(path, e.error))?;
    Ok(())
}
