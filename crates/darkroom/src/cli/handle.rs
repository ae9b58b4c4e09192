//! The `darkroom handle` command.

use clap::Args;
use darkroom_core::{parse_events, Config, Darkroom};
use std::io::Read;
use std::path::{Path, PathBuf};

use super::OutputFormat;

/// Arguments for the `handle` command.
#[derive(Args, Debug)]
pub struct HandleArgs {
    /// Notification payload file, or `-` for stdin
    pub input: PathBuf,

    /// Keep routing objects the stages create until nothing new appears
    #[arg(long)]
    pub follow: bool,

    /// Deliver every notification twice (with --follow)
    #[arg(long, requires = "follow")]
    pub redeliver: bool,

    /// Report file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

fn read_payload(input: &Path) -> anyhow::Result<String> {
    if input.as_os_str() == "-" {
        let mut payload = String::new();
        std::io::stdin().read_to_string(&mut payload)?;
        Ok(payload)
    } else {
        Ok(std::fs::read_to_string(super::upload::expand_path(input))?)
    }
}

/// Execute the handle command.
pub async fn execute(args: HandleArgs, config: Config) -> anyhow::Result<()> {
    let payload = read_payload(&args.input)?;
    let batch = parse_events(&payload)?;
    if !batch.unroutable.is_empty() {
        tracing::warn!("{} notification(s) named no known namespace", batch.unroutable.len());
    }
    tracing::info!("Handling {} notification(s)", batch.events.len());

    let darkroom = Darkroom::new(config).await?;
    let outcomes = if args.follow {
        darkroom.route(batch.events, args.redeliver).await
    } else {
        darkroom.handle(&batch.events).await
    };

    super::write_report(&outcomes, args.output.as_ref(), args.format)?;
    super::exit_on_failures(&outcomes)
}
