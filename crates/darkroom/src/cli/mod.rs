//! Command implementations.

pub mod config;
pub mod handle;
pub mod listen;
pub mod ls;
pub mod sweep;
pub mod upload;

use clap::ValueEnum;
use darkroom_core::{EventOutcome, ReportFormat, ReportWriter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Report formats accepted on the command line.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON document with a summary
    #[default]
    Json,
    /// One JSON object per line
    Jsonl,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Jsonl => ReportFormat::JsonLines,
        }
    }
}

/// Open the report destination: a file if given, stdout otherwise.
pub fn report_writer(
    output: Option<&PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<ReportWriter<Box<dyn Write + Send>>> {
    let sink: Box<dyn Write + Send> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    Ok(ReportWriter::new(sink, format.into(), true))
}

/// Write a finished batch and flush.
pub fn write_report(
    outcomes: &[EventOutcome],
    output: Option<&PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut writer = report_writer(output, format)?;
    writer.write_batch(outcomes)?;
    writer.flush()?;
    Ok(())
}

/// Non-zero exit if any outcome is a failure.
pub fn exit_on_failures(outcomes: &[EventOutcome]) -> anyhow::Result<()> {
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, EventOutcome::Failed { .. }))
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} event(s) failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_core::types::{ProcessingReport, ProcessingStatus, Stage};

    fn processed() -> EventOutcome {
        EventOutcome::Report(ProcessingReport {
            stage: Stage::Ingest,
            source_key: "incoming/a.jpg".to_string(),
            status: ProcessingStatus::Processed,
            target_key: Some("canonical/abc.jpg".to_string()),
            content_hash: Some("abc".to_string()),
        })
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        write_report(&[processed()], Some(&path), OutputFormat::Jsonl).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("canonical/abc.jpg"));
    }

    #[test]
    fn test_exit_on_failures() {
        assert!(exit_on_failures(&[processed()]).is_ok());
        let failed = EventOutcome::Failed {
            stage: Stage::Transcode,
            source_key: "canonical/x.png".to_string(),
            error: "boom".to_string(),
            retryable: true,
        };
        assert!(exit_on_failures(&[processed(), failed]).is_err());
    }
}
