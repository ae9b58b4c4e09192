//! The `darkroom sweep` command.
//!
//! Catches up on missed notifications: every object in `incoming/` is
//! ingested first, then every object in `canonical/` (including the ones
//! just created) is handed to both derivers. Rerunning is always safe.

use clap::Args;
use darkroom_core::types::Namespace;
use darkroom_core::{BatchSummary, Config, Darkroom, EventOutcome, ObjectEvent};
use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

use super::OutputFormat;

/// Arguments for the `sweep` command.
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Report file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,
}

/// Execute the sweep command.
pub async fn execute(args: SweepArgs, config: Config) -> anyhow::Result<()> {
    let darkroom = Darkroom::new(config).await?;
    let start = Instant::now();
    let mut outcomes = Vec::new();

    for namespace in [Namespace::Incoming, Namespace::Canonical] {
        let events = darkroom.pending(namespace).await?;
        if events.is_empty() {
            tracing::debug!("sweep: {} is empty", namespace);
            continue;
        }
        let progress = create_progress_bar(events.len() as u64, args.quiet);
        progress.set_message(namespace.to_string());
        outcomes.extend(run_with_progress(&darkroom, &events, &progress).await);
        progress.finish_and_clear();
    }

    super::write_report(&outcomes, args.output.as_ref(), args.format)?;
    print_summary(&BatchSummary::from_outcomes(&outcomes), start.elapsed());
    super::exit_on_failures(&outcomes)
}

async fn run_with_progress(
    darkroom: &Darkroom,
    events: &[ObjectEvent],
    progress: &ProgressBar,
) -> Vec<EventOutcome> {
    let pipeline = darkroom.pipeline();
    let workers = darkroom.config().pipeline.parallel_workers.max(1);

    stream::iter(events)
        .map(|event| async move {
            let outcomes = pipeline.handle(event).await;
            progress.inc(1);
            outcomes
        })
        .buffer_unordered(workers)
        .flat_map(stream::iter)
        .collect()
        .await
}

fn create_progress_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb
}

fn print_summary(summary: &BatchSummary, elapsed: std::time::Duration) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Sweep");
    eprintln!("  ====================================");
    eprintln!("    Processed:    {:>8}", summary.processed);
    eprintln!("    Duplicates:   {:>8}", summary.duplicates_removed);
    if summary.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", summary.skipped);
    }
    if summary.failed > 0 {
        eprintln!(
            "    Failed:       {:>8} ({} retryable)",
            summary.failed, summary.retryable_failures
        );
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("  ====================================");
}
