//! The `darkroom ls` command.

use clap::Args;
use darkroom_core::types::Namespace;
use darkroom_core::{Config, FsStore, ObjectStore};

/// Arguments for the `ls` command.
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Namespace to list (incoming, canonical, derived-mono, derived-tensor)
    pub namespace: Option<Namespace>,
}

/// Execute the ls command.
pub async fn execute(args: LsArgs, config: Config) -> anyhow::Result<()> {
    let store = FsStore::open(config.store.name.clone(), config.store_root()).await?;
    let namespaces = match args.namespace {
        Some(ns) => vec![ns],
        None => Namespace::ALL.to_vec(),
    };

    for namespace in namespaces {
        let keys = store.list(&namespace.prefix()).await?;
        if args.namespace.is_none() {
            println!("{} ({})", namespace, keys.len());
            continue;
        }
        for key in keys {
            println!("{key}");
        }
    }
    Ok(())
}
