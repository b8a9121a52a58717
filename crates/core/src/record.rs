use std::path::{Path, PathBuf};

use serde::Serialize;

/// Label written to both type columns when a file cannot be opened for lack of permission.
pub const PERMISSION_SENTINEL: &str = "Couldn't open - Permission Error Occurred";

/// Label written to both type columns when a file cannot be read for any other reason.
pub const IO_ERROR_SENTINEL: &str = "Couldn't open - I/O Error Occurred";

pub const REPORT_HEADER: [&str; 6] = [
    "File Name",
    "File Name Stem",
    "File Extension",
    "File Type",
    "File Type - mime",
    "Absolute Path",
];

/// One report row. Field order matches [`REPORT_HEADER`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub stem: String,
    pub extension: String,
    pub type_label: String,
    pub mime_label: String,
    pub absolute_path: String,
}

impl FileRecord {
    pub fn new(path: &Path, type_label: String, mime_label: String) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let (stem, extension) = split_name(&name);
        Self {
            stem: stem.to_string(),
            extension: extension.to_string(),
            name,
            type_label,
            mime_label,
            absolute_path: absolute_path(path).to_string_lossy().to_string(),
        }
    }

    pub fn with_sentinel(path: &Path, sentinel: &str) -> Self {
        Self::new(path, sentinel.to_string(), sentinel.to_string())
    }
}

/// Splits a base name into stem and extension (with its leading dot).
///
/// A leading dot (`.bashrc`) or a trailing dot (`notes.`) does not start an extension.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 && index + 1 < name.len() => name.split_at(index),
        _ => (name, ""),
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{split_name, FileRecord, PERMISSION_SENTINEL};

    #[test]
    fn splits_on_last_dot() {
        assert_eq!(split_name("a.txt"), ("a", ".txt"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
    }

    #[test]
    fn leading_and_trailing_dots_are_not_extensions() {
        assert_eq!(split_name(".bashrc"), (".bashrc", ""));
        assert_eq!(split_name("notes."), ("notes.", ""));
        assert_eq!(split_name("plain"), ("plain", ""));
        assert_eq!(split_name(".config.toml"), (".config", ".toml"));
    }

    #[test]
    fn record_carries_name_parts_and_absolute_path() {
        let record = FileRecord::new(
            Path::new("/data/photos/cat.jpeg"),
            "JPEG image data".to_string(),
            "image/jpeg".to_string(),
        );
        assert_eq!(record.name, "cat.jpeg");
        assert_eq!(record.stem, "cat");
        assert_eq!(record.extension, ".jpeg");
        assert!(Path::new(&record.absolute_path).is_absolute());
        assert!(record.absolute_path.ends_with("cat.jpeg"));
    }

    #[test]
    fn sentinel_fills_both_type_columns() {
        let record = FileRecord::with_sentinel(Path::new("locked.bin"), PERMISSION_SENTINEL);
        assert_eq!(record.type_label, PERMISSION_SENTINEL);
        assert_eq!(record.mime_label, PERMISSION_SENTINEL);
        assert!(Path::new(&record.absolute_path).is_absolute());
    }
}
