use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use infer::{Infer, MatcherType};
use thiserror::Error;
use tracing::{info, warn};

use crate::signature::SignatureDb;

/// Bytes read from the head of each file for signature matching.
pub const SAMPLE_LEN: u64 = 8192;

/// Database file looked up in the working directory.
pub const DEFAULT_SIGNATURE_DB: &str = "magic.mgc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub type_label: String,
    pub mime_label: String,
}

impl Classification {
    pub fn new(type_label: impl Into<String>, mime_label: impl Into<String>) -> Self {
        Self {
            type_label: type_label.into(),
            mime_label: mime_label.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("permission denied reading {path}: {source}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ClassifyError {
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            _ => Self::Io { path, source },
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

/// Content-based file type detection.
pub trait Classifier {
    fn classify(&self, path: &Path) -> Result<Classification, ClassifyError>;
}

/// Signature classifier: rules from an optional text database first, then the signatures
/// bundled with `infer`, then text/binary heuristics.
pub struct ContentClassifier {
    signatures: Option<SignatureDb>,
    bundled: Infer,
}

impl ContentClassifier {
    pub fn bundled() -> Self {
        Self {
            signatures: None,
            bundled: Infer::new(),
        }
    }

    pub fn with_signatures(signatures: SignatureDb) -> Self {
        Self {
            signatures: Some(signatures),
            bundled: Infer::new(),
        }
    }

    /// Loads `db_path` when it exists, otherwise (or when it cannot be parsed) uses the
    /// bundled signatures.
    pub fn load(db_path: &Path) -> Self {
        if !db_path.is_file() {
            info!(
                "No {} file available in the working directory. Bundled signatures will be used.",
                db_path.display()
            );
            return Self::bundled();
        }

        match SignatureDb::load(db_path) {
            Ok(db) => {
                info!(
                    "loaded {} signature rule(s) from {}",
                    db.len(),
                    db_path.display()
                );
                Self::with_signatures(db)
            }
            Err(err) => {
                warn!("{err}; bundled signatures will be used");
                Self::bundled()
            }
        }
    }

    pub fn signatures(&self) -> Option<&SignatureDb> {
        self.signatures.as_ref()
    }

    pub fn classify_bytes(&self, buf: &[u8]) -> Classification {
        if let Some(rule) = self.signatures.as_ref().and_then(|db| db.find(buf)) {
            return Classification::new(rule.description(), rule.mime());
        }
        if let Some(kind) = self.bundled.get(buf) {
            return Classification::new(
                describe(kind.matcher_type(), kind.extension(), kind.mime_type()),
                kind.mime_type(),
            );
        }
        classify_unmatched(buf)
    }
}

impl Classifier for ContentClassifier {
    fn classify(&self, path: &Path) -> Result<Classification, ClassifyError> {
        let metadata =
            fs::symlink_metadata(path).map_err(|err| ClassifyError::from_io(path, err))?;
        if let Some(result) = classify_special(path, &metadata)? {
            return Ok(result);
        }

        let file = File::open(path).map_err(|err| ClassifyError::from_io(path, err))?;
        let mut buf = Vec::with_capacity(SAMPLE_LEN as usize);
        file.take(SAMPLE_LEN)
            .read_to_end(&mut buf)
            .map_err(|err| ClassifyError::from_io(path, err))?;
        Ok(self.classify_bytes(&buf))
    }
}

/// Labels entries that are identified from metadata alone. Opening a FIFO blocks until a
/// writer connects, so these never reach `File::open`.
fn classify_special(
    path: &Path,
    metadata: &fs::Metadata,
) -> Result<Option<Classification>, ClassifyError> {
    let file_type = metadata.file_type();
    if file_type.is_dir() {
        return Ok(Some(Classification::new("directory", "inode/directory")));
    }
    if file_type.is_symlink() {
        let target = fs::read_link(path).map_err(|err| ClassifyError::from_io(path, err))?;
        return Ok(Some(Classification::new(
            format!("symbolic link to {}", target.display()),
            "inode/symlink",
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;

        let special = if file_type.is_fifo() {
            Some(("fifo (named pipe)", "inode/fifo"))
        } else if file_type.is_socket() {
            Some(("socket", "inode/socket"))
        } else if file_type.is_char_device() {
            Some(("character special", "inode/chardevice"))
        } else if file_type.is_block_device() {
            Some(("block special", "inode/blockdevice"))
        } else {
            None
        };
        if let Some((label, mime)) = special {
            return Ok(Some(Classification::new(label, mime)));
        }
    }

    Ok(None)
}

fn describe(matcher: MatcherType, extension: &str, mime: &str) -> String {
    match mime {
        "application/gzip" => return "gzip compressed data".to_string(),
        "application/x-executable" => return "ELF executable".to_string(),
        "application/vnd.microsoft.portable-executable" => {
            return "PE32 executable".to_string()
        }
        _ => {}
    }

    let noun = match matcher {
        MatcherType::App => "executable",
        MatcherType::Archive => "archive data",
        MatcherType::Audio => "audio data",
        MatcherType::Book => "e-book data",
        MatcherType::Doc => "document",
        MatcherType::Font => "font data",
        MatcherType::Image => "image data",
        MatcherType::Text => "text",
        MatcherType::Video => "video data",
        _ => "data",
    };
    format!("{} {noun}", extension.to_ascii_uppercase())
}

fn classify_unmatched(buf: &[u8]) -> Classification {
    if buf.is_empty() {
        return Classification::new("empty", "inode/x-empty");
    }
    if buf.iter().all(|byte| is_text_byte(*byte)) {
        return Classification::new("ASCII text", "text/plain");
    }
    if is_utf8_text(buf) {
        return Classification::new("Unicode text, UTF-8 text", "text/plain");
    }
    Classification::new("data", "application/octet-stream")
}

fn is_text_byte(byte: u8) -> bool {
    byte.is_ascii_graphic() || matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x08 | 0x0c | 0x1b)
}

fn is_utf8_text(buf: &[u8]) -> bool {
    let valid = match std::str::from_utf8(buf) {
        Ok(_) => true,
        // A multi-byte sequence cut off by the sample boundary.
        Err(err) => err.error_len().is_none() && buf.len() as u64 == SAMPLE_LEN,
    };
    valid && buf.iter().all(|byte| !byte.is_ascii() || is_text_byte(*byte))
}
