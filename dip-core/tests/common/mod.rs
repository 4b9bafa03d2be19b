use std::fs;
use std::path::{Path, PathBuf};

/// Content files laid out under `<root>/files`, relative to that directory.
pub const FIXTURE_FILES: &[&str] = &[
    "file1.txt",
    "file2.txt",
    "sub1/sub11.txt",
    "sub1/sub12.txt",
    "sub2/sub21.txt",
    "sub2/sub22.txt",
    "sub3/sub31/sub311.txt",
    "sub3/sub33/sub331.txt",
];

/// Writes the fixture tree and returns the `files` directory.
pub fn write_fixture_files(root: &Path) -> PathBuf {
    let files = root.join("files");
    for rel in FIXTURE_FILES {
        let path = files.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("content of {rel}\n")).unwrap();
    }
    files
}
