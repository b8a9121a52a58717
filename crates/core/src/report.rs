use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::{Terminator, Writer, WriterBuilder};

use crate::record::{FileRecord, REPORT_HEADER};

pub const DEFAULT_REPORT_FILE: &str = "file_info.csv";
pub const DELIMITER: u8 = b';';

/// Streams records to a `;`-delimited report, flushing after every row so an aborted scan
/// leaves the rows written so far on disk.
pub struct ReportWriter<W: Write> {
    writer: Writer<W>,
    rows: u64,
}

impl ReportWriter<File> {
    /// Creates (or truncates) `path` and writes the header row.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        Self::from_writer(file)
            .with_context(|| format!("failed to write report header to {}", path.display()))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .terminator(Terminator::CRLF)
            .from_writer(inner);
        writer
            .write_record(REPORT_HEADER)
            .context("failed to write report header")?;
        writer.flush().context("failed to flush report header")?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_record(&mut self, record: &FileRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .with_context(|| format!("failed to write row for {}", record.absolute_path))?;
        self.writer.flush().context("failed to flush report row")?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| anyhow!("failed to flush report: {}", err.error()))
    }
}
