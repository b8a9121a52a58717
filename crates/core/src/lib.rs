pub mod classify;
pub mod enumerate;
pub mod record;
pub mod report;
pub mod scan;
pub mod signature;

pub use classify::{
    Classification, Classifier, ClassifyError, ContentClassifier, DEFAULT_SIGNATURE_DB,
    SAMPLE_LEN,
};
pub use enumerate::{resolve_lookup_root, PathEnumerator, NAME_PATTERN};
pub use record::{
    split_name, FileRecord, IO_ERROR_SENTINEL, PERMISSION_SENTINEL, REPORT_HEADER,
};
pub use report::{ReportWriter, DEFAULT_REPORT_FILE, DELIMITER};
pub use scan::{
    run_scan, run_scan_with_callback, ScanCounts, ScanOptions, ScanProgress, ScanSummary,
};
pub use signature::{SignatureDb, SignatureDbError, SignatureRule};
