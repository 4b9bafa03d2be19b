//! On-disk layout of a deposit information package (DIP).
//!
//! ```text
//! <dip-dir>/
//!   deposit.json
//!   metadata/dcterms.xml
//!   history/
//!   packages/<unique-id>/<FormatName>.zip
//! ```
//!
//! A directory is a valid package iff every member above (except the
//! contents of `packages/`) exists. [`validate`] is the gate every other
//! operation passes through.

use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::attributes::{self, DcAttribute, DublinCore};
use crate::deposit::Endpoint;
use crate::error::{DipError, DipResult};
use crate::manifest::{FileEntry, Manifest, MetadataEntry};

pub const MANIFEST_FILE: &str = "deposit.json";
pub const METADATA_DIR: &str = "metadata";
pub const HISTORY_DIR: &str = "history";
pub const PACKAGES_DIR: &str = "packages";
pub const DCTERMS_FILE: &str = "dcterms.xml";
pub const DCTERMS_FORMAT: &str = "dcterms";

/// Handle on a validated package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    root: PathBuf,
}

/// Everything `dip show` reports about a package.
#[derive(Debug, Clone)]
pub struct PackageSummary {
    pub path: PathBuf,
    pub files: Vec<FileEntry>,
    pub metadata_files: Vec<MetadataEntry>,
    pub attributes: Vec<DcAttribute>,
    pub endpoint: Option<Endpoint>,
}

impl Package {
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    pub fn dcterms_path(&self) -> PathBuf {
        self.metadata_dir().join(DCTERMS_FILE)
    }

    pub fn history_dir(&self) -> PathBuf {
        self.root.join(HISTORY_DIR)
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join(PACKAGES_DIR)
    }

    pub fn load_manifest(&self) -> DipResult<Manifest> {
        Manifest::load(&self.manifest_path())
    }

    pub fn save_manifest(&self, manifest: &Manifest) -> DipResult<()> {
        manifest.save(&self.manifest_path())
    }

    pub fn summary(&self) -> DipResult<PackageSummary> {
        let manifest = self.load_manifest()?;
        Ok(PackageSummary {
            path: self.root.clone(),
            files: manifest.files,
            metadata_files: manifest.metadata,
            attributes: attributes::all_attributes(self)?,
            endpoint: manifest.endpoint,
        })
    }

    /// Records `endpoint` as the package's active endpoint, replacing any previous one.
    pub fn set_endpoint(&self, endpoint: &Endpoint) -> DipResult<()> {
        let mut manifest = self.load_manifest()?;
        manifest.endpoint = Some(endpoint.clone());
        self.save_manifest(&manifest)?;
        info!(
            dip = %self.root.display(),
            collection_uri = %endpoint.collection_uri,
            "Recorded deposit endpoint"
        );
        Ok(())
    }
}

/// Creates a new package at `path`. Fails with `AlreadyExists` if anything is
/// already there; a partially created tree is left in place on later failures.
pub fn create(path: &Path) -> DipResult<Package> {
    if fs::symlink_metadata(path).is_ok() {
        error!(path = %path.display(), "Refusing to create DIP over existing path");
        return Err(DipError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DipError::io(parent, e))?;
    }
    fs::create_dir(path).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => DipError::AlreadyExists {
            path: path.to_path_buf(),
        },
        _ => DipError::io(path, e),
    })?;

    let package = Package {
        root: path.to_path_buf(),
    };
    for dir in [
        package.metadata_dir(),
        package.history_dir(),
        package.packages_dir(),
    ] {
        fs::create_dir(&dir).map_err(|e| DipError::io(&dir, e))?;
        debug!(dir = %dir.display(), "Created DIP subdirectory");
    }

    DublinCore::default().save(&package.dcterms_path())?;
    let mut manifest = Manifest::default();
    manifest.upsert_metadata(package.dcterms_path(), DCTERMS_FORMAT, Utc::now());
    package.save_manifest(&manifest)?;

    info!(path = %path.display(), "Created deposit information package");
    Ok(package)
}

/// Checks that `path` holds a complete package. Never modifies anything.
pub fn validate(path: &Path) -> DipResult<Package> {
    if !path.is_dir() {
        return Err(DipError::NotExists {
            path: path.to_path_buf(),
        });
    }
    let package = Package {
        root: path.to_path_buf(),
    };
    let complete = package.manifest_path().is_file()
        && package.metadata_dir().is_dir()
        && package.history_dir().is_dir()
        && package.packages_dir().is_dir()
        && package.dcterms_path().is_file();
    if !complete {
        debug!(path = %path.display(), "Directory is missing DIP members");
        return Err(DipError::NotAPackage {
            path: path.to_path_buf(),
        });
    }
    Ok(package)
}

/// Validates then recursively deletes the package at `path`.
pub fn remove(path: &Path) -> DipResult<()> {
    let package = validate(path)?;
    fs::remove_dir_all(package.path()).map_err(|e| DipError::io(path, e))?;
    info!(path = %path.display(), "Removed deposit information package");
    Ok(())
}
