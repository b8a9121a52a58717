use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use filetype_inventory_core::{
    run_scan_with_callback, ContentClassifier, ScanOptions, ScanSummary, DEFAULT_REPORT_FILE,
    DEFAULT_SIGNATURE_DB,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "filetype-inventory",
    version,
    about = "The app provides file information for each file under the given path in a separate output file."
)]
struct Cli {
    /// Directory to scan. Falls back to the current directory when missing.
    #[arg(long = "lookup_path", value_name = "PATH")]
    lookup_path: Option<PathBuf>,

    /// Output report path.
    #[arg(long = "output_file", value_name = "FILE", default_value = DEFAULT_REPORT_FILE)]
    output_file: PathBuf,

    /// Scan subdirectories as well.
    #[arg(long)]
    recursive: bool,
}

impl From<Cli> for ScanOptions {
    fn from(cli: Cli) -> Self {
        Self {
            lookup_path: cli.lookup_path,
            output_file: cli.output_file,
            recursive: cli.recursive,
            signature_db: PathBuf::from(DEFAULT_SIGNATURE_DB),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let options = ScanOptions::from(cli);

    let classifier = ContentClassifier::load(&options.signature_db);
    let progress = progress_bar()?;
    let result = run_scan_with_callback(&options, &classifier, |event| {
        progress.set_position(event.index);
        progress.set_message(event.path.display().to_string());
    });
    progress.finish_and_clear();

    let summary = result.with_context(|| {
        format!(
            "scan aborted while writing {}",
            options.output_file.display()
        )
    })?;
    print_summary(&summary);
    Ok(())
}

fn progress_bar() -> Result<ProgressBar> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} file(s) {wide_msg}")
            .context("invalid progress template")?,
    );
    progress.enable_steady_tick(Duration::from_millis(120));
    Ok(progress)
}

fn print_summary(summary: &ScanSummary) {
    println!("Report written to {}", summary.output_file.display());
    if let Some(root) = &summary.root {
        println!(
            "Scanned {} ({}).",
            root.display(),
            if summary.recursive {
                "recursive"
            } else {
                "top level only"
            }
        );
    }
    println!(
        "{} file(s), {} permission error(s), {} other read error(s).",
        summary.counts.rows_written, summary.counts.permission_errors, summary.counts.io_errors
    );
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use filetype_inventory_core::ScanOptions;

    use super::Cli;

    #[test]
    fn defaults_to_working_directory_and_file_info_csv() {
        let cli = Cli::try_parse_from(["filetype-inventory"]).expect("parses");
        let options = ScanOptions::from(cli);
        assert!(options.lookup_path.is_none());
        assert_eq!(options.output_file, PathBuf::from("file_info.csv"));
        assert_eq!(options.signature_db, PathBuf::from("magic.mgc"));
        assert!(!options.recursive);
    }

    #[test]
    fn accepts_underscored_long_flags() {
        let cli = Cli::try_parse_from([
            "filetype-inventory",
            "--lookup_path",
            "/srv/share",
            "--output_file",
            "inventory.csv",
            "--recursive",
        ])
        .expect("parses");
        let options = ScanOptions::from(cli);
        assert_eq!(options.lookup_path, Some(PathBuf::from("/srv/share")));
        assert_eq!(options.output_file, PathBuf::from("inventory.csv"));
        assert!(options.recursive);
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["filetype-inventory", "--max-depth", "2"]).is_err());
    }
}
