//! The `darkroom listen` command.
//!
//! Reads one notification payload per stdin line and writes one JSON outcome
//! per line as each completes. Runs until stdin closes.

use clap::Args;
use darkroom_core::{parse_events, BatchSummary, Config, Darkroom};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::OutputFormat;

/// Arguments for the `listen` command.
#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Keep going after a malformed line instead of stopping
    #[arg(long)]
    pub lenient: bool,
}

/// Execute the listen command.
pub async fn execute(args: ListenArgs, config: Config) -> anyhow::Result<()> {
    let darkroom = Darkroom::new(config).await?;
    let (event_tx, mut outcome_rx, stage) = darkroom.listen();

    let writer = tokio::spawn(async move {
        let mut writer = super::report_writer(None, OutputFormat::Jsonl)?;
        let mut outcomes = Vec::new();
        while let Some(outcome) = outcome_rx.recv().await {
            writer.write_outcome(&outcome)?;
            writer.flush()?;
            outcomes.push(outcome);
        }
        Ok::<_, anyhow::Error>(BatchSummary::from_outcomes(&outcomes))
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let batch = match parse_events(&line) {
            Ok(batch) => batch,
            Err(e) if args.lenient => {
                tracing::warn!("Skipping malformed notification: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        for event in batch.events {
            if event_tx.send(event).await.is_err() {
                anyhow::bail!("listener stopped unexpectedly");
            }
        }
    }
    drop(event_tx);

    stage.await?;
    let summary = writer.await??;
    tracing::info!(
        "Listener done: {} processed, {} duplicates, {} skipped, {} failed",
        summary.processed,
        summary.duplicates_removed,
        summary.skipped,
        summary.failed
    );
    Ok(())
}
