mod common;

use dip_core::attributes::set_attribute;
use dip_core::error::DipError;
use dip_core::package;
use dip_core::packager::{self, SIMPLE_ZIP};
use dip_core::registry::add_files;
use std::fs::{self, File};
use std::path::PathBuf;
use tempfile::tempdir;

use common::write_fixture_files;

fn entry_names(path: &std::path::Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

#[test]
fn populated_package_yields_nine_entries() {
    let root = tempdir().unwrap();
    write_fixture_files(root.path());
    let dip = root.path().join("testdip");
    let pkg = package::create(&dip).unwrap();
    add_files(&pkg, &[PathBuf::from("files")], true, root.path(), |_| {}).unwrap();
    set_attribute(&pkg, "dc:creator", "John Smith").unwrap();

    let artifact = packager::package(&pkg, None, Some(root.path())).unwrap();

    assert_eq!(artifact.format, SIMPLE_ZIP);
    assert_eq!(artifact.path.file_name().unwrap(), "SimpleZip.zip");
    let unique_dir = artifact.path.parent().unwrap();
    assert_eq!(unique_dir.parent().unwrap(), dip.join("packages"));

    let names = entry_names(&artifact.path);
    assert_eq!(names.len(), 9);
    for expected in [
        "dcterms.xml",
        "files/file1.txt",
        "files/file2.txt",
        "files/sub1/sub11.txt",
        "files/sub1/sub12.txt",
        "files/sub2/sub21.txt",
        "files/sub2/sub22.txt",
        "files/sub3/sub31/sub311.txt",
        "files/sub3/sub33/sub331.txt",
    ] {
        assert!(names.iter().any(|n| n == expected), "{expected} missing from archive");
    }
}

#[test]
fn repackaging_is_byte_for_byte_identical() {
    let root = tempdir().unwrap();
    write_fixture_files(root.path());
    let pkg = package::create(&root.path().join("testdip")).unwrap();
    add_files(&pkg, &[PathBuf::from("files")], true, root.path(), |_| {}).unwrap();

    let first = packager::package(&pkg, None, Some(root.path())).unwrap();
    let second = packager::package(&pkg, None, Some(root.path())).unwrap();

    assert_ne!(first.path, second.path);
    assert_eq!(first.sha256, second.sha256);
    assert_eq!(fs::read(&first.path).unwrap(), fs::read(&second.path).unwrap());
}

#[test]
fn archive_content_matches_source_files() {
    use std::io::Read;

    let root = tempdir().unwrap();
    let files = write_fixture_files(root.path());
    let pkg = package::create(&root.path().join("testdip")).unwrap();
    add_files(&pkg, &[files.join("sub1")], false, root.path(), |_| {}).unwrap();

    let artifact = packager::package(&pkg, None, Some(root.path())).unwrap();
    let mut archive = zip::ZipArchive::new(File::open(&artifact.path).unwrap()).unwrap();
    let mut text = String::new();
    archive
        .by_name("files/sub1/sub11.txt")
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "content of sub1/sub11.txt\n");
}

#[test]
fn format_label_names_the_archive() {
    let root = tempdir().unwrap();
    write_fixture_files(root.path());
    let pkg = package::create(&root.path().join("testdip")).unwrap();

    let artifact = packager::package(
        &pkg,
        Some("http://purl.org/net/sword/package/METSDSpaceSIP"),
        Some(root.path()),
    )
    .unwrap();
    assert_eq!(artifact.path.file_name().unwrap(), "METSDSpaceSIP.zip");

    let err = packager::package(&pkg, Some("urn:empty/"), Some(root.path())).unwrap_err();
    assert!(matches!(err, DipError::UnsupportedFormat { .. }));
}

#[test]
fn packaging_an_invalid_directory_fails() {
    let root = tempdir().unwrap();
    let pkg = package::create(&root.path().join("testdip")).unwrap();
    fs::remove_dir_all(root.path().join("testdip/history")).unwrap();

    let err = packager::package(&pkg, None, Some(root.path())).unwrap_err();
    assert!(matches!(err, DipError::NotAPackage { .. }));
}
