//! File registry: which content files and metadata documents belong to a
//! package.
//!
//! Paths are resolved against a caller-supplied base (normally the working
//! directory), folded lexically and stored absolute. Files are referenced in
//! place, never copied into the package.

use chrono::Utc;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::{DipError, DipResult};
use crate::manifest::{FileEntry, MetadataEntry};
use crate::package::Package;

/// Resolves `path` against `base` and folds `.` and `..` without touching the
/// filesystem.
pub fn normalise(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Visits `dir/name`.
///
/// A directory is listed only when `scan` is set, and each entry is then
/// visited with `scan = recursive`. Anything that is not a directory is
/// handed to `action`. The first error stops the walk.
pub fn visit<F>(dir: &Path, name: &OsStr, scan: bool, recursive: bool, action: &mut F) -> DipResult<()>
where
    F: FnMut(&Path) -> DipResult<()>,
{
    let target = if name.is_empty() {
        dir.to_path_buf()
    } else {
        dir.join(name)
    };
    debug!(path = %target.display(), scan, recursive, "Visiting path");
    if target.is_dir() {
        if scan {
            let entries = fs::read_dir(&target).map_err(|e| DipError::io(&target, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| DipError::io(&target, e))?;
                visit(&target, &entry.file_name(), recursive, recursive, action)?;
            }
        }
        Ok(())
    } else {
        action(&target)
    }
}

fn visit_top<F>(path: &Path, recursive: bool, action: &mut F) -> DipResult<()>
where
    F: FnMut(&Path) -> DipResult<()>,
{
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => visit(parent, name, true, recursive, action),
        _ => visit(path, OsStr::new(""), true, recursive, action),
    }
}

/// Registers every file reached from `paths`, calling `report` once per file.
///
/// The manifest is saved after each argument, and before an error is
/// returned, so registrations made before a failure persist.
pub fn add_files<R>(
    package: &Package,
    paths: &[PathBuf],
    recursive: bool,
    base: &Path,
    mut report: R,
) -> DipResult<()>
where
    R: FnMut(&Path),
{
    let mut manifest = package.load_manifest()?;
    info!(dip = %package.path().display(), inputs = paths.len(), recursive, "Adding files");
    for input in paths {
        let target = normalise(base, input);
        let outcome = visit_top(&target, recursive, &mut |file: &Path| {
            let meta = fs::metadata(file).map_err(|e| DipError::io(file, e))?;
            if !meta.is_file() {
                return Err(DipError::io(
                    file,
                    io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
                ));
            }
            report(file);
            manifest.upsert_file(file.to_path_buf(), Utc::now());
            debug!(path = %file.display(), "Registered file");
            Ok(())
        });
        package.save_manifest(&manifest)?;
        if let Err(e) = outcome {
            error!(path = %target.display(), error = %e, "Failed to add files");
            return Err(e);
        }
    }
    Ok(())
}

/// Deregisters every file reached from `paths`. Unregistered files are
/// skipped silently; a path that is gone from disk is still deregistered
/// (along with anything registered beneath it).
pub fn remove_files<R>(
    package: &Package,
    paths: &[PathBuf],
    recursive: bool,
    base: &Path,
    mut report: R,
) -> DipResult<()>
where
    R: FnMut(&Path),
{
    let mut manifest = package.load_manifest()?;
    info!(dip = %package.path().display(), inputs = paths.len(), recursive, "Removing files");
    for input in paths {
        let target = normalise(base, input);
        if fs::symlink_metadata(&target).is_err() {
            let removed = manifest.remove_files_under(&target);
            if removed.is_empty() {
                debug!(path = %target.display(), "Path neither on disk nor registered");
            } else {
                warn!(path = %target.display(), count = removed.len(), "Deregistered stale entries");
            }
            for path in &removed {
                report(path.as_path());
            }
            package.save_manifest(&manifest)?;
            continue;
        }
        let outcome = visit_top(&target, recursive, &mut |file: &Path| {
            if manifest.remove_file(file) {
                report(file);
                debug!(path = %file.display(), "Deregistered file");
            }
            Ok(())
        });
        package.save_manifest(&manifest)?;
        outcome?;
    }
    Ok(())
}

pub fn list_files(package: &Package) -> DipResult<Vec<FileEntry>> {
    Ok(package.load_manifest()?.files)
}

pub fn list_metadata_files(package: &Package) -> DipResult<Vec<MetadataEntry>> {
    Ok(package.load_manifest()?.metadata)
}

/// Registers metadata documents under `format`. Directories are not expanded.
pub fn add_metadata_files<R>(
    package: &Package,
    paths: &[PathBuf],
    format: &str,
    base: &Path,
    mut report: R,
) -> DipResult<()>
where
    R: FnMut(&Path),
{
    let mut manifest = package.load_manifest()?;
    for input in paths {
        let target = normalise(base, input);
        let is_file = fs::metadata(&target)
            .map_err(|e| DipError::io(&target, e))?
            .is_file();
        if !is_file {
            return Err(DipError::io(
                &target,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        report(&target);
        manifest.upsert_metadata(target, format, Utc::now());
        package.save_manifest(&manifest)?;
    }
    info!(dip = %package.path().display(), format, count = paths.len(), "Added metadata files");
    Ok(())
}

pub fn remove_metadata_files<R>(
    package: &Package,
    paths: &[PathBuf],
    base: &Path,
    mut report: R,
) -> DipResult<()>
where
    R: FnMut(&Path),
{
    let mut manifest = package.load_manifest()?;
    for input in paths {
        let target = normalise(base, input);
        if manifest.remove_metadata(&target) {
            report(&target);
        }
    }
    package.save_manifest(&manifest)
}
