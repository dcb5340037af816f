//! pktlog-sql - MySQL output for packet log records
//!
//! A minimal host pipeline around the sink: records arrive as JSON lines
//! (`{"ip.saddr": "10.0.0.1", "oob.prefix": "DROP"}`), are loaded into a key
//! table declared in the config file and handed to the output dispatcher.
//!
//! # Usage
//!
//! ```bash
//! # Validate configuration
//! pktlog-sql -c pktlog-sql.yaml validate
//!
//! # Connect and show the discovered fields
//! pktlog-sql -c pktlog-sql.yaml check
//!
//! # Insert records from a file (or stdin when --input is omitted)
//! pktlog-sql -c pktlog-sql.yaml ingest --input records.jsonl
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pktlog_sql::config::SinkConfig;
use pktlog_sql::registry::KeyTable;
use pktlog_sql::{Delivery, OutputDispatcher};

#[derive(Parser)]
#[command(name = "pktlog-sql")]
#[command(version, about = "Schema-driven MySQL output for packet log records")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "pktlog-sql.yaml", env = "PKTLOG_SQL_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate,
    /// Connect, introspect the table and print the statement prefix
    Check,
    /// Insert JSON-lines records
    Ingest {
        /// Input file (default: stdin)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Show the configuration JSON schema
    Schema {
        /// Output format (json, yaml)
        #[arg(long, default_value = "json")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Schema { format } = &cli.command {
        return show_schema(format);
    }

    let config = SinkConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Commands::Validate => validate_config(&config),
        Commands::Check => check_connectivity(&config).await,
        Commands::Ingest { input } => ingest(&config, input).await,
        Commands::Schema { .. } => unreachable!(), // handled above
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn key_table(config: &SinkConfig) -> KeyTable {
    let mut keys = KeyTable::new();
    for (name, kind) in &config.keys {
        keys.register(name.clone(), *kind);
    }
    keys
}

fn validate_config(config: &SinkConfig) -> Result<()> {
    println!("✓ Configuration valid!\n");

    println!("Database:");
    println!("  Target: {}:{}/{}", config.host, config.port, config.database);
    println!("  User: {}", config.user);
    println!("  Table: {}", config.table);
    match config.reconnect {
        Some(secs) if secs > 0 => println!("  Reconnect: every {}s", secs),
        _ => println!("  Reconnect: disabled"),
    }
    if let Some(secs) = config.connect_timeout {
        println!("  Connect timeout: {}s", secs);
    }
    println!("  IP encoding: {:?}", config.ip_encoding);
    println!("  Unsupported values: {:?}", config.unsupported_values);
    println!();

    println!("Keys ({}):", config.keys.len());
    for (name, kind) in &config.keys {
        println!("  {} ({})", name, kind);
    }

    Ok(())
}

async fn check_connectivity(config: &SinkConfig) -> Result<()> {
    let keys = key_table(config);
    let mut output = OutputDispatcher::mysql(config)?;

    output
        .start(&keys)
        .await
        .with_context(|| format!("Connection check failed for table '{}'", config.table))?;

    println!("✓ Connected to {}:{}/{}\n", config.host, config.port, config.database);
    println!("Fields:");
    for field in output.manager().fields().unwrap_or_default() {
        println!(
            "  {:<24} {:<24} {}",
            field.column_name(),
            field.name,
            if field.is_string { "string" } else { "numeric" }
        );
    }
    if let Some(prefix) = output.manager().prefix() {
        println!("\nStatement prefix:\n  {}", prefix);
    }

    output.shutdown().await;
    Ok(())
}

async fn ingest(config: &SinkConfig, input: Option<PathBuf>) -> Result<()> {
    let mut keys = key_table(config);
    let mut output = OutputDispatcher::mysql(config)?;

    if let Err(e) = output.start(&keys).await {
        warn!(error = %e, "initial connect failed");
    }

    let reader: Box<dyn tokio::io::AsyncBufRead + Unpin + Send> = match &input {
        Some(path) => Box::new(BufReader::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut lines = reader.lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: serde_json::Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed record");
                continue;
            }
        };

        match keys.load_json_record(&record) {
            Ok(unknown) if !unknown.is_empty() => {
                debug!(line = line_no, keys = ?unknown, "record carries unregistered keys");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping record");
                continue;
            }
        }

        match output.output(&keys).await {
            Ok(Delivery::Inserted) => {}
            Ok(other) => debug!(line = line_no, delivery = ?other, "record not inserted"),
            Err(e) => warn!(line = line_no, error = %e, "record lost"),
        }
    }

    output.shutdown().await;

    let stats = output.stats();
    info!(
        written = stats.records_written,
        failed = stats.records_failed,
        "ingest finished"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn show_schema(format: &str) -> Result<()> {
    let schema = serde_json::to_value(schemars::schema_for!(SinkConfig))?;

    match format {
        "yaml" => println!("{}", serde_yaml::to_string(&schema)?),
        _ => println!("{}", serde_json::to_string_pretty(&schema)?),
    }

    Ok(())
}
