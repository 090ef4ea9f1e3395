use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use ter_config::{
    load_layered_yaml, report_unused_keys, ConfigConsumer, ReaderSettings, UnusedKeyPolicy,
};
use ter_csv::{CsvOptions, CsvTable};
use ter_reader::{
    GroupIndex, LogicalRecord, ReaderState, StreamingReader, TabularSource, SCHEMA,
};

#[derive(Parser)]
#[command(name = "ter")]
#[command(about = "Territory register reader", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream merged records as JSON lines on stdout
    Read {
        /// CSV export with a header row
        csv: PathBuf,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<PathBuf>,

        /// Record buffer capacity (overrides config and TER_BUFFER_CAPACITY)
        #[arg(long)]
        buffer: Option<usize>,

        /// Pretty-print each record
        #[arg(long, default_value_t = false)]
        pretty: bool,

        /// Fail when the config carries keys this command does not read
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Print each logical key with its fragment keys in merge order
    Index {
        csv: PathBuf,

        #[arg(long = "config")]
        config_paths: Vec<PathBuf>,

        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

/// One output line of `ter read`.
#[derive(Serialize)]
struct RecordLine<'a> {
    number: u64,
    record: &'a LogicalRecord,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Read {
            csv,
            config_paths,
            buffer,
            pretty,
            strict_config,
        } => {
            let flags = FlagOverrides { buffer, pretty };
            let settings =
                resolve_settings(&config_paths, ConfigConsumer::Read, strict_config, flags)?;
            run_read(&csv, &settings).await?;
        }

        Commands::Index {
            csv,
            config_paths,
            strict_config,
        } => {
            let settings = resolve_settings(
                &config_paths,
                ConfigConsumer::Index,
                strict_config,
                FlagOverrides::default(),
            )?;
            let table = load_table(&csv, &settings)?;
            let index = GroupIndex::build(&table)
                .with_context(|| format!("failed to index {}", csv.display()))?;

            let mut out = std::io::stdout().lock();
            for group in index.iter() {
                let fragments: Vec<String> = group
                    .members
                    .iter()
                    .map(|m| m.fragment_key.to_string())
                    .collect();
                writeln!(out, "{}\t{}", group.logical_key, fragments.join(","))?;
            }
            info!(groups = index.len(), rows = table.record_count(), "index printed");
        }

        Commands::ConfigHash { paths } => {
            let loaded = load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

/// Command-line values that win over config and environment.
#[derive(Debug, Default, Clone, Copy)]
struct FlagOverrides {
    buffer: Option<usize>,
    pretty: bool,
}

impl FlagOverrides {
    fn apply(self, settings: &mut ReaderSettings) {
        if let Some(n) = self.buffer {
            settings.buffer_capacity = n;
        }
        settings.pretty |= self.pretty;
    }
}

/// Config layers, then `TER_*` environment overrides, then flags.
fn resolve_settings(
    paths: &[PathBuf],
    consumer: ConfigConsumer,
    strict: bool,
    flags: FlagOverrides,
) -> Result<ReaderSettings> {
    let loaded = load_layered_yaml(paths)?;
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(consumer, &loaded.config_json, policy)?;
    for pointer in &report.unused_leaf_pointers {
        warn!(pointer = %pointer, consumer = consumer.as_str(), "unused config key");
    }

    let mut settings = ReaderSettings::from_config_json(&loaded.config_json)?;
    settings.apply_env_overrides()?;
    flags.apply(&mut settings);
    info!(
        config_hash = %loaded.config_hash,
        buffer_capacity = settings.buffer_capacity,
        "settings resolved"
    );
    Ok(settings)
}

fn load_table(path: &Path, settings: &ReaderSettings) -> Result<CsvTable> {
    let opts = CsvOptions {
        delimiter: settings.delimiter,
        trim: settings.trim,
    };
    let table = CsvTable::from_path(path, &opts)
        .with_context(|| format!("failed to load {}", path.display()))?;
    for field in SCHEMA.iter().filter(|f| !table.has_column(f.name)) {
        warn!(column = field.name, path = %path.display(), "schema column missing from header");
    }
    Ok(table)
}

async fn run_read(csv: &Path, settings: &ReaderSettings) -> Result<()> {
    let table = load_table(csv, settings)?;
    let mut reader = StreamingReader::new(Arc::new(table));

    let token = reader.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling read");
            token.cancel();
        }
    });

    let mut stream = reader
        .start_read(settings.buffer_capacity)
        .with_context(|| format!("failed to index {}", csv.display()))?;

    let mut out = std::io::stdout().lock();
    let mut emitted = 0usize;
    let mut failure = None;
    while let Some(item) = stream.recv().await {
        match item.into_result() {
            Ok((number, record)) => {
                let line = RecordLine {
                    number,
                    record: &record,
                };
                if settings.pretty {
                    serde_json::to_writer_pretty(&mut out, &line)?;
                } else {
                    serde_json::to_writer(&mut out, &line)?;
                }
                writeln!(out)?;
                emitted += 1;
            }
            Err((number, err)) => failure = Some((number, err)),
        }
    }
    out.flush()?;

    let state = stream.join().await;
    info!(records = emitted, state = state.as_str(), "read finished");

    if let Some((number, err)) = failure {
        bail!("record {number}: {err}");
    }
    if state == ReaderState::Cancelled {
        bail!("read cancelled after {emitted} record(s)");
    }
    Ok(())
}
