//! Report output.
//!
//! Outcomes are written either as one JSON document (an array, plus an
//! optional trailing summary object) or as JSON Lines, one outcome per line,
//! which suits streaming consumers such as `darkroom listen`.

use serde::Serialize;
use std::io::{self, Write};

use crate::types::{BatchSummary, EventOutcome};

/// Report encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// One JSON document
    #[default]
    Json,
    /// Newline-delimited JSON
    JsonLines,
}

impl ReportFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    outcomes: &'a [EventOutcome],
    summary: BatchSummary,
}

/// Serializes outcomes to an underlying writer.
pub struct ReportWriter<W: Write> {
    writer: W,
    format: ReportFormat,
    pretty: bool,
    written: usize,
}

impl<W: Write> ReportWriter<W> {
    /// `pretty` only affects [`ReportFormat::Json`].
    pub fn new(writer: W, format: ReportFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            written: 0,
        }
    }

    fn emit<T: Serialize + ?Sized>(&mut self, value: &T, pretty: bool) -> io::Result<()> {
        if pretty {
            serde_json::to_writer_pretty(&mut self.writer, value).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, value).map_err(io::Error::other)?;
        }
        writeln!(self.writer)
    }

    /// Write one outcome as soon as it is known.
    pub fn write_outcome(&mut self, outcome: &EventOutcome) -> io::Result<()> {
        let pretty = self.pretty && self.format == ReportFormat::Json;
        self.emit(outcome, pretty)?;
        self.written += 1;
        Ok(())
    }

    /// Write a finished batch.
    ///
    /// JSON gets `{"outcomes": [...], "summary": {...}}`; JSONL gets one line
    /// per outcome followed by a `{"summary": ...}` line.
    pub fn write_batch(&mut self, outcomes: &[EventOutcome]) -> io::Result<()> {
        let summary = BatchSummary::from_outcomes(outcomes);
        match self.format {
            ReportFormat::Json => {
                let pretty = self.pretty;
                self.emit(&ReportDocument { outcomes, summary }, pretty)?;
                self.written += outcomes.len();
            }
            ReportFormat::JsonLines => {
                for outcome in outcomes {
                    self.write_outcome(outcome)?;
                }
                self.emit(&serde_json::json!({ "summary": summary }), false)?;
            }
        }
        Ok(())
    }

    /// Outcomes written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProcessingReport, ProcessingStatus, Stage};

    fn outcomes() -> Vec<EventOutcome> {
        vec![
            EventOutcome::Report(ProcessingReport {
                stage: Stage::Ingest,
                source_key: "incoming/a.jpg".to_string(),
                status: ProcessingStatus::Processed,
                target_key: Some("canonical/abc.jpg".to_string()),
                content_hash: Some("abc".to_string()),
            }),
            EventOutcome::Failed {
                stage: Stage::Tensorize,
                source_key: "canonical/bad.png".to_string(),
                error: "decode failed".to_string(),
                retryable: false,
            },
        ]
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(ReportFormat::parse("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::parse("ndjson"), Some(ReportFormat::JsonLines));
        assert_eq!(ReportFormat::parse("xml"), None);
    }

    #[test]
    fn test_json_batch_has_summary() {
        let mut buffer = Vec::new();
        let mut writer = ReportWriter::new(&mut buffer, ReportFormat::Json, false);
        writer.write_batch(&outcomes()).unwrap();
        assert_eq!(writer.written(), 2);

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["outcomes"][0]["outcome"], "report");
        assert_eq!(value["outcomes"][0]["status"], "processed");
        assert_eq!(value["outcomes"][1]["outcome"], "failed");
        assert_eq!(value["summary"]["processed"], 1);
        assert_eq!(value["summary"]["failed"], 1);
    }

    #[test]
    fn test_jsonl_one_line_per_outcome() {
        let mut buffer = Vec::new();
        let mut writer = ReportWriter::new(&mut buffer, ReportFormat::JsonLines, true);
        writer.write_batch(&outcomes()).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
        assert!(lines[2].starts_with("{\"summary\""));
    }

    #[test]
    fn test_write_outcome_streams() {
        let mut buffer = Vec::new();
        let mut writer = ReportWriter::new(&mut buffer, ReportFormat::JsonLines, false);
        for outcome in outcomes() {
            writer.write_outcome(&outcome).unwrap();
        }
        let back: EventOutcome =
            serde_json::from_str(String::from_utf8(buffer).unwrap().lines().next().unwrap())
                .unwrap();
        assert!(matches!(back, EventOutcome::Report(_)));
    }
}
