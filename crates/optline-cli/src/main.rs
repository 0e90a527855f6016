// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! optctl: inspect and edit optline options from the command line.
//!
//! # Usage
//! ```text
//! optctl [--bridge <socket> | --store-dir <dir>] [--defaults <file>] <command>
//! ```
//!
//! Results are printed as JSON on stdout. Notices raised while loading or
//! saving go to stderr; the exit code stays `0` because the pipeline never
//! lets a storage failure escape.

// The CLI is expected to print to stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use optline_bridge_client::BridgeClient;
use optline_config_fs::FsBlobStore;
use optline_core::codec::decode_text;
use optline_core::{
    defaults, EffectRegistry, HostBridgeBackend, LocalStore, NoticeKind, OptionBackend,
    OptionStore,
};
use optline_effects::AlwaysOnTop;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "optctl", version, about = "Inspect and edit optline options")]
struct Cli {
    /// Talk to an options host on this Unix socket instead of local storage
    #[arg(long, value_name = "SOCKET", conflicts_with = "store_dir")]
    bridge: Option<PathBuf>,
    /// Directory holding the Local-Store blob (default: platform config dir)
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,
    /// JSON object replacing the built-in default table
    #[arg(long, value_name = "FILE")]
    defaults: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every option after load, defaults included
    Dump,
    /// Print one logical value (`null` when unset)
    Get {
        /// Option name
        name: String,
    },
    /// Print one persisted wire value as the backend stores it
    GetRaw {
        /// Option name
        name: String,
    },
    /// Decode wire text and save it under `name`
    Set {
        /// Option name
        name: String,
        /// Wire text, e.g. `true`, `0.9` or `%5B1%2C2%5D`
        value: String,
        /// Also apply the option's effect
        #[arg(long)]
        apply: bool,
    },
    /// Remove an option and persist the remaining snapshot
    Remove {
        /// Option name
        name: String,
    },
}

/// Build the pipeline; the bridge client is handed back so `main` can
/// flush it before exiting.
fn open_store(cli: &Cli) -> Result<(OptionStore, Option<BridgeClient>)> {
    let (backend, registry, bridge): (Box<dyn OptionBackend>, EffectRegistry, _) =
        match &cli.bridge {
            Some(socket) => {
                debug!(socket = %socket.display(), "using host bridge");
                let client = BridgeClient::connect(socket)?;
                let registry =
                    EffectRegistry::new().with(AlwaysOnTop::new(Some(client.clone())));
                (
                    Box::new(HostBridgeBackend::new(client.clone())),
                    registry,
                    Some(client),
                )
            }
            None => {
                let blobs = match &cli.store_dir {
                    Some(dir) => FsBlobStore::at(dir),
                    None => FsBlobStore::new(),
                }
                .context("opening option storage")?;
                debug!(root = %blobs.base().display(), "using local store");
                (Box::new(LocalStore::new(blobs)), EffectRegistry::new(), None)
            }
        };

    let mut store = OptionStore::new(backend, registry);
    if let Some(path) = &cli.defaults {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading defaults from {}", path.display()))?;
        let table = defaults::from_json(&text)
            .with_context(|| format!("parsing defaults in {}", path.display()))?;
        store = store.with_defaults(table);
    }
    Ok((store, bridge))
}

fn execute(store: &mut OptionStore, command: Command) -> Result<Option<Value>> {
    let output = match command {
        Command::Dump => Some(serde_json::to_value(store.load())?),
        Command::Get { name } => {
            store.load();
            Some(store.get(&name).unwrap_or(Value::Null))
        }
        Command::GetRaw { name } => Some(serde_json::to_value(store.get_raw(&name))?),
        Command::Set { name, value, apply } => {
            let value = decode_text(&value);
            if apply {
                store.run_and_save(&name, value);
            } else {
                store.save(&name, value);
            }
            None
        }
        Command::Remove { name } => {
            store.remove(&name);
            None
        }
    };
    Ok(output)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let (mut store, bridge) = open_store(&cli)?;
    let output = execute(&mut store, cli.command)?;
    // Posted saves sit in the writer queue until flushed.
    if let Some(client) = bridge {
        client.shutdown();
    }

    for notice in store.notices_mut().drain(usize::MAX) {
        let label = match notice.kind {
            NoticeKind::Info => "info",
            NoticeKind::Warn => "warning",
            NoticeKind::Error => "error",
        };
        match notice.body {
            Some(body) => eprintln!("{label}: {}: {body}", notice.title),
            None => eprintln!("{label}: {}", notice.title),
        }
    }

    if let Some(value) = output {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
