//! Plain-text signature database loader.
//!
//! Reads the level-0 subset of the magic(5) source format:
//!
//! ```text
//! # offset  type     test              description
//! 0         string   \x89PNG\r\n\x1a\n PNG image data
//! !:mime    image/png
//! 0         belong   0xcafebabe        compiled Java class data
//! ```
//!
//! Continuation rules (`>`), non-equality operators and unsupported types are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// First four bytes of a database compiled by `file -C`, in either byte order.
const COMPILED_MAGIC_LE: [u8; 4] = [0x1c, 0x04, 0x1e, 0xf1];
const COMPILED_MAGIC_BE: [u8; 4] = [0xf1, 0x1e, 0x04, 0x1c];

const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum SignatureDbError {
    #[error("failed to read signature database {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is a compiled signature database; only the text format is supported")]
    Compiled { path: PathBuf },
    #[error("{path} is not valid UTF-8 text")]
    NotText { path: PathBuf },
    #[error("{path} contains no usable signature rules")]
    Empty { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRule {
    offset: usize,
    expected: Vec<u8>,
    description: String,
    mime: Option<String>,
}

impl SignatureRule {
    fn matches(&self, buf: &[u8]) -> bool {
        self.offset
            .checked_add(self.expected.len())
            .and_then(|end| buf.get(self.offset..end))
            .is_some_and(|window| window == self.expected.as_slice())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn mime(&self) -> &str {
        self.mime.as_deref().unwrap_or(DEFAULT_MIME)
    }
}

/// Ordered rule list; the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct SignatureDb {
    rules: Vec<SignatureRule>,
}

impl SignatureDb {
    pub fn load(path: &Path) -> Result<Self, SignatureDbError> {
        let bytes = fs::read(path).map_err(|source| SignatureDbError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.starts_with(&COMPILED_MAGIC_LE) || bytes.starts_with(&COMPILED_MAGIC_BE) {
            return Err(SignatureDbError::Compiled {
                path: path.to_path_buf(),
            });
        }
        let text = String::from_utf8(bytes).map_err(|_| SignatureDbError::NotText {
            path: path.to_path_buf(),
        })?;

        let db = Self::parse(&text);
        if db.rules.is_empty() {
            return Err(SignatureDbError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(db)
    }

    pub fn parse(text: &str) -> Self {
        let mut rules: Vec<SignatureRule> = Vec::new();
        // `!:mime` applies only when the line above it produced a rule.
        let mut last_rule_kept = false;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim_end();
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix("!:") {
                if let Some(mime) = rest.strip_prefix("mime") {
                    if last_rule_kept {
                        if let Some(rule) = rules.last_mut() {
                            rule.mime = Some(mime.trim().to_string());
                        }
                    }
                }
                continue;
            }

            if trimmed.starts_with('>') {
                debug!("line {}: continuation rule skipped", index + 1);
                last_rule_kept = false;
                continue;
            }

            match parse_rule(trimmed) {
                Ok(rule) => {
                    rules.push(rule);
                    last_rule_kept = true;
                }
                Err(reason) => {
                    debug!("line {}: rule skipped ({reason})", index + 1);
                    last_rule_kept = false;
                }
            }
        }

        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn find(&self, buf: &[u8]) -> Option<&SignatureRule> {
        self.rules.iter().find(|rule| rule.matches(buf))
    }
}

fn parse_rule(line: &str) -> Result<SignatureRule, String> {
    let (offset, rest) = next_field(line).ok_or("missing offset")?;
    let (kind, rest) = next_field(rest).ok_or("missing type")?;
    let (test, rest) = next_field(rest).ok_or("missing test")?;

    let offset = parse_number(offset).ok_or_else(|| format!("unsupported offset '{offset}'"))?;
    let offset = usize::try_from(offset).map_err(|_| format!("offset {offset} too large"))?;

    let bytes = match kind {
        "string" => unescape(test.strip_prefix('=').unwrap_or(test))?,
        numeric => numeric_bytes(numeric, test)?,
    };
    if bytes.is_empty() {
        return Err("empty test value".to_string());
    }

    Ok(SignatureRule {
        offset,
        expected: bytes,
        description: rest.trim().to_string(),
        mime: None,
    })
}

/// Splits off one whitespace-delimited field; backslash-escaped spaces stay in the field.
fn next_field(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    let mut escaped = false;
    for (index, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            ch if ch.is_whitespace() => return Some((&input[..index], &input[index..])),
            _ => {}
        }
    }
    Some((input, ""))
}

fn numeric_bytes(kind: &str, test: &str) -> Result<Vec<u8>, String> {
    let (width, big_endian) = match kind {
        "byte" => (1, true),
        "short" => (2, cfg!(target_endian = "big")),
        "beshort" => (2, true),
        "leshort" => (2, false),
        "long" => (4, cfg!(target_endian = "big")),
        "belong" => (4, true),
        "lelong" => (4, false),
        "quad" => (8, cfg!(target_endian = "big")),
        "bequad" => (8, true),
        "lequad" => (8, false),
        other => return Err(format!("unsupported type '{other}'")),
    };
    let value = test.strip_prefix('=').unwrap_or(test);
    let value = parse_number(value).ok_or_else(|| format!("unsupported test '{test}'"))?;
    if width < 8 && value >> (width * 8) != 0 {
        return Err(format!("value {value:#x} does not fit in {kind}"));
    }

    let bytes = value.to_be_bytes();
    let mut out = bytes[8 - width..].to_vec();
    if !big_endian {
        out.reverse();
    }
    Ok(out)
}

fn parse_number(text: &str) -> Option<u64> {
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}

fn unescape(text: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte != b'\\' {
            out.push(byte);
            i += 1;
            continue;
        }
        let next = *bytes.get(i + 1).ok_or("trailing backslash")?;
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'x' => {
                let digits = take_while(bytes, i, 2, |b| b.is_ascii_hexdigit());
                if digits == 0 {
                    return Err("\\x without hex digits".to_string());
                }
                out.push(radix_byte(&bytes[i..i + digits], 16)?);
                i += digits;
            }
            b'0'..=b'7' => {
                let digits = 1 + take_while(bytes, i, 2, |b| (b'0'..=b'7').contains(&b));
                out.push(radix_byte(&bytes[i - 1..i - 1 + digits], 8)?);
                i += digits - 1;
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn take_while(bytes: &[u8], start: usize, max: usize, pred: impl Fn(u8) -> bool) -> usize {
    bytes[start.min(bytes.len())..]
        .iter()
        .take(max)
        .take_while(|b| pred(**b))
        .count()
}

fn radix_byte(digits: &[u8], radix: u32) -> Result<u8, String> {
    let text = std::str::from_utf8(digits).map_err(|err| err.to_string())?;
    u8::from_str_radix(text, radix).map_err(|err| format!("bad escape '{text}': {err}"))
}
