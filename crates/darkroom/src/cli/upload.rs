//! The `darkroom upload` command.

use clap::Args;
use darkroom_core::{Config, Darkroom};
use std::path::PathBuf;

use super::OutputFormat;

/// Arguments for the `upload` command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Image files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Run the pipeline on the uploads immediately
    #[arg(long)]
    pub process: bool,

    /// Report file (defaults to stdout), used with --process
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format, used with --process
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &std::path::Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Execute the upload command.
pub async fn execute(args: UploadArgs, config: Config) -> anyhow::Result<()> {
    let darkroom = Darkroom::new(config).await?;

    let mut events = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let path = expand_path(file);
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            anyhow::bail!("Not a file: {}", path.display());
        };
        let bytes = tokio::fs::read(&path).await?;
        let event = darkroom.upload(file_name, bytes).await?;
        println!("{}/{}", event.namespace, event.key);
        events.push(event);
    }

    if args.process {
        let outcomes = darkroom.route(events, false).await;
        super::write_report(&outcomes, args.output.as_ref(), args.format)?;
        super::exit_on_failures(&outcomes)?;
    }

    Ok(())
}
