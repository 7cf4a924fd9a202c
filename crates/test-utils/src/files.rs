//! Temporary files and directories for tests that load documents from disk.

use std::io::Write;
use std::path::PathBuf;

/// Creates a temporary directory that is removed when dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Creates a temporary directory with a specific prefix.
pub fn temp_test_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temp directory")
}

/// Writes `contents` to a named temporary file with the given suffix
/// (e.g. `".yaml"`). The file is removed when the handle is dropped.
pub fn temp_file_with(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

/// Writes `contents` to `name` inside `dir` and returns the full path.
pub fn write_file_in(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("Failed to write file");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_file_with_suffix() {
        let file = temp_file_with(".yaml", "a: 1\n");
        assert!(file.path().to_string_lossy().ends_with(".yaml"));
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "a: 1\n");
    }

    #[test]
    fn test_write_file_in_dir() {
        let dir = temp_test_dir_with_prefix("slicer");
        let path = write_file_in(&dir, "options.json", "{}");
        assert!(path.exists());
        assert!(path.starts_with(dir.path()));
    }
}
