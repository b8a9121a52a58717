use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::classify::{Classifier, ContentClassifier, DEFAULT_SIGNATURE_DB};
use crate::enumerate::PathEnumerator;
use crate::record::{FileRecord, IO_ERROR_SENTINEL, PERMISSION_SENTINEL};
use crate::report::{ReportWriter, DEFAULT_REPORT_FILE};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Directory to scan; the working directory when unset or missing.
    pub lookup_path: Option<PathBuf>,
    pub output_file: PathBuf,
    pub recursive: bool,
    pub signature_db: PathBuf,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            lookup_path: None,
            output_file: PathBuf::from(DEFAULT_REPORT_FILE),
            recursive: false,
            signature_db: PathBuf::from(DEFAULT_SIGNATURE_DB),
        }
    }
}

/// Emitted before each path is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    /// 1-based position in enumeration order.
    pub index: u64,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCounts {
    pub rows_written: u64,
    pub permission_errors: u64,
    pub io_errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub root: Option<PathBuf>,
    pub output_file: PathBuf,
    pub recursive: bool,
    pub counts: ScanCounts,
}

pub fn run_scan(options: &ScanOptions) -> Result<ScanSummary> {
    let classifier = ContentClassifier::load(&options.signature_db);
    run_scan_with_callback(options, &classifier, |_| {})
}

pub fn run_scan_with_callback<F>(
    options: &ScanOptions,
    classifier: &dyn Classifier,
    on_progress: F,
) -> Result<ScanSummary>
where
    F: FnMut(ScanProgress),
{
    let enumerator = PathEnumerator::new(options.lookup_path.as_deref(), options.recursive);
    let root = enumerator.root().map(Path::to_path_buf);

    let mut writer = ReportWriter::create(&options.output_file)?;
    let counts = scan_paths(enumerator, classifier, &mut writer, on_progress)?;
    writer.finish()?;

    info!(
        "scan complete: {} row(s), {} permission error(s), {} other read error(s)",
        counts.rows_written, counts.permission_errors, counts.io_errors
    );

    Ok(ScanSummary {
        root,
        output_file: options.output_file.clone(),
        recursive: options.recursive,
        counts,
    })
}

/// Classifies each path in order and writes one row per path.
///
/// Per-file classification failures become sentinel rows; only report write failures
/// abort the scan.
pub(crate) fn scan_paths<I, W, F>(
    paths: I,
    classifier: &dyn Classifier,
    writer: &mut ReportWriter<W>,
    mut on_progress: F,
) -> Result<ScanCounts>
where
    I: IntoIterator<Item = PathBuf>,
    W: Write,
    F: FnMut(ScanProgress),
{
    let mut counts = ScanCounts::default();

    for (index, path) in paths.into_iter().enumerate() {
        debug!("{}", path.display());
        on_progress(ScanProgress {
            index: index as u64 + 1,
            path: path.clone(),
        });

        let record = match classifier.classify(&path) {
            Ok(result) => FileRecord::new(&path, result.type_label, result.mime_label),
            Err(err) if err.is_permission_denied() => {
                warn!(
                    "Permission Error occurred at the following file: {}: {err}",
                    path.display()
                );
                counts.permission_errors += 1;
                FileRecord::with_sentinel(&path, PERMISSION_SENTINEL)
            }
            Err(err) => {
                warn!("failed to classify {}: {err}", path.display());
                counts.io_errors += 1;
                FileRecord::with_sentinel(&path, IO_ERROR_SENTINEL)
            }
        };

        writer.write_record(&record)?;
        counts.rows_written += 1;
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::{Path, PathBuf};

    use super::{scan_paths, ScanOptions};
    use crate::classify::{Classification, Classifier, ClassifyError};
    use crate::record::{IO_ERROR_SENTINEL, PERMISSION_SENTINEL};
    use crate::report::ReportWriter;

    struct ByName;

    impl Classifier for ByName {
        fn classify(&self, path: &Path) -> Result<Classification, ClassifyError> {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            if name.starts_with("locked") {
                Err(ClassifyError::from_io(
                    path,
                    io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                ))
            } else if name.starts_with("broken") {
                Err(ClassifyError::from_io(
                    path,
                    io::Error::new(io::ErrorKind::NotFound, "dangling"),
                ))
            } else {
                Ok(Classification::new("ASCII text", "text/plain"))
            }
        }
    }

    #[test]
    fn defaults_match_cli_defaults() {
        let options = ScanOptions::default();
        assert_eq!(options.output_file, PathBuf::from("file_info.csv"));
        assert_eq!(options.signature_db, PathBuf::from("magic.mgc"));
        assert!(options.lookup_path.is_none());
        assert!(!options.recursive);
    }

    #[test]
    fn failures_become_sentinel_rows_and_scan_continues() {
        let paths = vec![
            PathBuf::from("/data/locked.bin"),
            PathBuf::from("/data/broken.lnk"),
            PathBuf::from("/data/after.txt"),
        ];
        let mut writer = ReportWriter::from_writer(Vec::new()).expect("header");
        let mut seen = Vec::new();
        let counts = scan_paths(paths, &ByName, &mut writer, |progress| {
            seen.push(progress.index)
        })
        .expect("scan completes");

        assert_eq!(counts.rows_written, 3);
        assert_eq!(counts.permission_errors, 1);
        assert_eq!(counts.io_errors, 1);
        assert_eq!(seen, vec![1, 2, 3]);

        let text = String::from_utf8(writer.finish().expect("finish")).expect("utf8");
        let rows: Vec<Vec<&str>> = text
            .split("\r\n")
            .skip(1)
            .filter(|line| !line.is_empty())
            .map(|line| line.split(';').collect())
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "locked.bin");
        assert_eq!(rows[0][3], PERMISSION_SENTINEL);
        assert_eq!(rows[0][4], PERMISSION_SENTINEL);
        assert_eq!(rows[1][3], IO_ERROR_SENTINEL);
        assert_eq!(rows[2][0], "after.txt");
        assert_eq!(rows[2][3], "ASCII text");
    }
}
