//! Packager: serialises a package into a submittable zip archive.
//!
//! The archive holds every registered metadata document at its root (by file
//! name) and every registered content file at its path relative to a base
//! directory. Content kept in a `files/` directory beside the working
//! directory therefore lands under `files/`. Output is byte-reproducible for identical
//! inputs: entries are written in manifest order with a fixed timestamp and
//! fixed permissions.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{DipError, DipResult};
use crate::package::{self, Package};
use crate::registry::normalise;

/// SWORD package format identifier for a plain zip of files.
pub const SIMPLE_ZIP: &str = "http://purl.org/net/sword/package/SimpleZip";

/// A built archive, ready for deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArtifact {
    pub path: PathBuf,
    pub format: String,
    pub basedir: PathBuf,
    /// Lowercase hex SHA-256 of the archive bytes.
    pub sha256: String,
}

impl PackageArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The final segment of a format URI, after the last `/` or `#`.
pub fn format_label(format: &str) -> DipResult<&str> {
    let label = format.rsplit(['/', '#']).next().unwrap_or_default();
    if label.is_empty() {
        return Err(DipError::UnsupportedFormat {
            format: format.to_string(),
        });
    }
    Ok(label)
}

struct Entry {
    name: String,
    source: PathBuf,
}

fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn plan(package: &Package, basedir: &Path) -> DipResult<Vec<Entry>> {
    let manifest = package.load_manifest()?;
    let mut entries = Vec::with_capacity(manifest.metadata.len() + manifest.files.len());

    for meta in &manifest.metadata {
        let name = meta
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DipError::Archive(format!("no file name in {}", meta.path.display())))?;
        entries.push(Entry {
            name,
            source: meta.path.clone(),
        });
    }
    for file in &manifest.files {
        let relative = file
            .path
            .strip_prefix(basedir)
            .map_err(|_| DipError::PathOutsideBase {
                path: file.path.clone(),
                base: basedir.to_path_buf(),
            })?;
        entries.push(Entry {
            name: archive_name(relative),
            source: file.path.clone(),
        });
    }

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.name.as_str()) {
            return Err(DipError::Archive(format!(
                "duplicate archive entry {}",
                entry.name
            )));
        }
        fs::metadata(&entry.source).map_err(|e| DipError::io(&entry.source, e))?;
    }
    Ok(entries)
}

fn write_archive(target_dir: &Path, label: &str, entries: &[Entry]) -> DipResult<PathBuf> {
    let path = target_dir.join(format!("{label}.zip"));
    let tmp = tempfile::NamedTempFile::new_in(target_dir).map_err(|e| DipError::io(target_dir, e))?;
    let mut zip = ZipWriter::new(tmp);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    for entry in entries {
        let bytes = fs::read(&entry.source).map_err(|e| DipError::io(&entry.source, e))?;
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| DipError::Archive(e.to_string()))?;
        zip.write_all(&bytes).map_err(|e| DipError::io(&path, e))?;
        debug!(entry = %entry.name, bytes = bytes.len(), "Added archive entry");
    }

    let tmp = zip
        .finish()
        .map_err(|e| DipError::Archive(e.to_string()))?;
    tmp.persist(&path).map_err(|e| DipError::io(&path, e.error))?;
    Ok(path)
}

fn sha256_hex(path: &Path) -> DipResult<String> {
    let bytes = fs::read(path).map_err(|e| DipError::io(path, e))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Builds `packages/<uuid>/<label>.zip` from the package at `package`.
///
/// `basedir` defaults to the process working directory. Every referenced
/// file is checked before the archive is created.
pub fn package(package: &Package, format: Option<&str>, basedir: Option<&Path>) -> DipResult<PackageArtifact> {
    let package = package::validate(package.path())?;
    let format = format.unwrap_or(SIMPLE_ZIP);
    let label = format_label(format)?;

    let cwd = std::env::current_dir().map_err(|e| DipError::io(".", e))?;
    let basedir = match basedir {
        Some(dir) => normalise(&cwd, dir),
        None => cwd,
    };

    let entries = plan(&package, &basedir).inspect_err(|e| {
        error!(dip = %package.path().display(), error = %e, "Cannot package DIP");
    })?;

    let target_dir = package.packages_dir().join(Uuid::new_v4().to_string());
    fs::create_dir_all(&target_dir).map_err(|e| DipError::io(&target_dir, e))?;
    let path = write_archive(&target_dir, label, &entries)?;
    let sha256 = sha256_hex(&path)?;

    info!(
        dip = %package.path().display(),
        archive = %path.display(),
        entries = entries.len(),
        %sha256,
        "Packaged deposit information package"
    );
    Ok(PackageArtifact {
        path,
        format: format.to_string(),
        basedir,
        sha256,
    })
}
