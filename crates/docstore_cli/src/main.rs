//! Command-line entry point for the record storage.
//!
//! # Responsibility
//! - Start the storage from a TOML config and report the hydration summary.
//! - Offer read-only inspection commands over the started storage.

use anyhow::Context;
use clap::{Parser, Subcommand};
use docstore_core::{
    init_logging, load_config, Filter, FilterCondition, FilterPart, RelationalOperator,
    StorageConfig, StorageProvider,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docstore")]
#[command(version)]
#[command(about = "Relational document store with a write-through in-memory cache")]
struct Cli {
    /// Path to the TOML config; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `database_path` from the config
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Serve from the database store without hydrating the cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the storage and print what was loaded
    Status,

    /// Print one record's document
    Read {
        /// Record type
        #[arg(short = 't', long = "type")]
        record_type: String,

        #[arg(short, long)]
        id: String,
    },

    /// List documents of one or more record types
    List {
        /// Record types to include
        #[arg(short = 't', long = "type", required = true)]
        types: Vec<String>,

        /// Term filter as KEY=VALUE; repeated filters must all match
        #[arg(short, long = "where")]
        conditions: Vec<String>,

        /// First row, 1-based
        #[arg(long)]
        from: Option<u64>,

        /// Last row, inclusive
        #[arg(long)]
        to: Option<u64>,
    },

    /// Print the records linking to a record
    Links {
        #[arg(short = 't', long = "type")]
        record_type: String,

        #[arg(short, long)]
        id: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir).context("failed to start logging")?;
    }

    let provider = StorageProvider::new(config);
    let storage = provider
        .record_storage()
        .context("failed to start record storage")?;
    info!("event=cli_command module=cli status=start");

    match cli.command {
        Commands::Status => {
            println!("docstore_core: {}", docstore_core::core_version());
            let config = provider.config();
            match &config.database_path {
                Some(path) => println!("database: {}", path.display()),
                None => println!("database: in-memory"),
            }
            match provider.populate_summary() {
                Some(summary) => println!(
                    "cache: hydrated records={} terms={} links={}",
                    summary.records, summary.terms, summary.links
                ),
                None => println!("cache: disabled"),
            }
        }
        Commands::Read { record_type, id } => {
            let document = storage.read(&record_type, &id)?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Commands::List {
            types,
            conditions,
            from,
            to,
        } => {
            let filter = list_filter(&conditions, from, to)?;
            let types = types.iter().map(String::as_str).collect::<Vec<_>>();
            let result = storage.read_list(&types, &filter)?;
            for document in &result.records {
                println!("{}", serde_json::to_string(document)?);
            }
            eprintln!(
                "{} of {} matching records",
                result.records.len(),
                result.total_number_of_matches
            );
        }
        Commands::Links { record_type, id } => {
            for link in storage.get_links_to_record(&record_type, &id)? {
                println!("{}/{}", link.record_type, link.id);
            }
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> anyhow::Result<StorageConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => StorageConfig::default(),
    };
    if let Some(database) = &cli.database {
        config.database_path = Some(database.clone());
    }
    if cli.no_cache {
        config.do_not_cache = true;
    }
    Ok(config)
}

fn list_filter(
    conditions: &[String],
    from: Option<u64>,
    to: Option<u64>,
) -> anyhow::Result<Filter> {
    let mut filter = Filter::all().with_row_range(from, to);
    if !conditions.is_empty() {
        let part = conditions
            .iter()
            .map(|condition| -> anyhow::Result<FilterCondition> {
                let (key, value) = condition
                    .split_once('=')
                    .with_context(|| format!("filter `{condition}` is not KEY=VALUE"))?;
                Ok(FilterCondition::new(key, RelationalOperator::EqualTo, value))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        filter = filter.include(FilterPart::new(part));
    }
    Ok(filter)
}
