//! kvmux CLI
//!
//! Inspect and edit a kvmux data directory, optionally inside one namespace.

use std::ops::ControlFlow;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kvmux::{Config, Engine, KeyValue, Kv, PutOptions, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// kvmux CLI
#[derive(Parser, Debug)]
#[command(name = "kvmux")]
#[command(about = "Namespaced key-value stores over one persistent engine")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./kvmux_data")]
    data_dir: String,

    /// Namespace to operate in; omit for the unprefixed store
    #[arg(short, long)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value stored under a key
    Get {
        key: String,
    },

    /// Store a value under a key
    Put {
        key: String,
        value: String,

        /// Overwrite an existing value
        #[arg(short, long)]
        replace: bool,
    },

    /// Delete a key
    Del {
        key: String,
    },

    /// Report which of the given keys exist
    Has {
        keys: Vec<String>,
    },

    /// List keys at or after START
    List {
        #[arg(default_value = "")]
        start: String,

        /// Stop after this many keys
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Count keys
    Len,

    /// Run a full merge of the data directory
    Compact,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvmux=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Background merging is pointless for a one-shot command
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .auto_merge_interval(None)
        .build();

    let result = match &args.namespace {
        Some(ns) => Store::open_with(config).and_then(|store| {
            let kv = store.kv(ns);
            let ran = run(&*kv, store.engine(), &args.command);
            kvmux::Error::join([ran.err(), store.close().err()])
        }),
        None => Kv::open_with(config).and_then(|kv| {
            let engine = Arc::clone(kv.engine());
            let ran = run(&kv, &engine, &args.command);
            kvmux::Error::join([ran.err(), kv.close().err()])
        }),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(kv: &dyn KeyValue, engine: &Engine, command: &Commands) -> kvmux::Result<()> {
    match command {
        Commands::Get { key } => {
            let value = kv.get(key)?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Put {
            key,
            value,
            replace,
        } => {
            kv.put(PutOptions {
                key: key.as_str(),
                data: value.as_bytes(),
                replace: *replace,
            })?;
        }
        Commands::Del { key } => kv.delete(key)?,
        Commands::Has { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            for key in kv.has(&keys)? {
                println!("{}", key);
            }
        }
        Commands::List { start, limit } => {
            let mut remaining = limit.unwrap_or(usize::MAX);
            kv.list(start, &mut |key: &str| -> kvmux::Result<ControlFlow<()>> {
                if remaining == 0 {
                    return Ok(ControlFlow::Break(()));
                }
                remaining -= 1;
                println!("{}", key);
                Ok(ControlFlow::Continue(()))
            })?;
        }
        Commands::Len => println!("{}", kv.len()?),
        Commands::Compact => match engine.merge()? {
            Some(stats) => println!(
                "merged {} tables: {} live, {} dropped",
                stats.inputs, stats.live_entries, stats.dropped_entries
            ),
            None => println!("nothing to merge"),
        },
    }
    Ok(())
}
