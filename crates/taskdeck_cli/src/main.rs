//! Operator CLI for a Taskdeck store.
//!
//! # Responsibility
//! - Inspect schema and record counts of a store file.
//! - Export/import full snapshots.
//! - Report repair candidates (unplaced entities, dangling relationships).
//!
//! Every command prints JSON to stdout.

use clap::{Parser, Subcommand};
use log::info;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use taskdeck_core::{
    init_logging, schema, AppConfig, ImportMode, Snapshot, Store, StoreConfig, StoreError,
};

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "Inspect and maintain a Taskdeck store")]
struct Cli {
    /// Store file; overrides the location from --config
    #[arg(long, short = 'd')]
    db: Option<PathBuf>,

    /// Path to JSON config file (store + optional logging sections)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List declared collections and their indexes
    Schema,

    /// Show per-collection record counts
    Stats,

    /// Write a full snapshot as JSON
    Export {
        /// Output file; stdout when omitted
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Load a snapshot file into the store
    Import {
        /// Snapshot file produced by `export`
        input: PathBuf,
        /// Clear each imported collection first instead of merging
        #[arg(long)]
        replace: bool,
    },

    /// List entities without a placement on a board
    Orphans {
        /// Board id
        board_id: String,
        /// View context such as `board` or `week`
        #[arg(long, default_value = "board")]
        context: String,
    },

    /// List relationships pointing at entities that no longer exist
    Dangling,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Stats => "stats",
            Self::Export { .. } => "export",
            Self::Import { .. } => "import",
            Self::Orphans { .. } => "orphans",
            Self::Dangling => "dangling",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(logging) = &config.logging {
        if let Err(err) = init_logging(logging) {
            eprintln!("logging error: {err}");
            return ExitCode::FAILURE;
        }
    }

    let store = Store::new(config.store);
    let result = run(&store, cli.command).await;
    store.close();

    match result {
        Ok(output) => {
            print_json(&output, cli.pretty);
            ExitCode::SUCCESS
        }
        Err(err) => {
            print_json(
                &json!({ "error": err.to_string(), "code": err.code() }),
                cli.pretty,
            );
            if err.is_user_warning() {
                eprintln!("close other sessions using this store and retry");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(store: &Store, command: Commands) -> Result<Value, StoreError> {
    info!("event=cli_command module=cli status=start command={}", command.name());
    match command {
        Commands::Schema => Ok(schema_listing()),
        Commands::Stats => {
            let statistics = store.statistics().await;
            Ok(serde_json::to_value(statistics)?)
        }
        Commands::Export { output } => {
            let snapshot = store.export_snapshot().await?;
            match output {
                Some(path) => {
                    let text = serde_json::to_string_pretty(&snapshot)?;
                    write_file(&path, &text)?;
                    Ok(json!({
                        "output": path.display().to_string(),
                        "records": snapshot.record_count(),
                    }))
                }
                None => Ok(serde_json::to_value(&snapshot)?),
            }
        }
        Commands::Import { input, replace } => {
            let text = std::fs::read_to_string(&input).map_err(|err| {
                StoreError::InvalidData(format!("cannot read `{}`: {err}", input.display()))
            })?;
            let snapshot: Snapshot = serde_json::from_str(&text)?;
            let mode = if replace {
                ImportMode::Replace
            } else {
                ImportMode::Merge
            };
            let summary = store.import_snapshot(&snapshot, mode).await?;
            Ok(serde_json::to_value(summary)?)
        }
        Commands::Orphans { board_id, context } => {
            let ids: Vec<String> = store
                .entities()
                .get_by_board(&board_id)
                .await?
                .into_iter()
                .map(|entity| entity.id)
                .collect();
            let orphans = store
                .positions()
                .get_orphaned_entities(&ids, &board_id, &context)
                .await?;
            Ok(json!({
                "boardId": board_id,
                "context": context,
                "orphans": orphans,
            }))
        }
        Commands::Dangling => {
            let ids: Vec<String> = store
                .entities()
                .get_all()
                .await?
                .into_iter()
                .map(|entity| entity.id)
                .collect();
            let dangling = store.relationships().find_dangling(&ids).await?;
            Ok(serde_json::to_value(dangling)?)
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| format!("cannot read `{}`: {err}", path.display()))?;
            AppConfig::from_json_str(&text)?
        }
        None => AppConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.store = StoreConfig {
            location: StoreConfig::file(db).location,
            ..config.store
        };
    }
    Ok(config)
}

fn schema_listing() -> Value {
    let collections: Vec<Value> = schema::all_collections()
        .iter()
        .map(|descriptor| {
            let indexes: Vec<Value> = descriptor
                .indexes
                .iter()
                .map(|index| {
                    json!({
                        "name": index.name,
                        "fields": index.fields,
                        "unique": index.unique,
                        "multiEntry": index.multi_entry,
                    })
                })
                .collect();
            json!({
                "name": descriptor.name,
                "primaryKey": descriptor.primary_key,
                "indexes": indexes,
            })
        })
        .collect();
    json!({ "schemaVersion": schema::SCHEMA_VERSION, "collections": collections })
}

fn write_file(path: &Path, text: &str) -> Result<(), StoreError> {
    std::fs::write(path, text)
        .map_err(|err| StoreError::InvalidData(format!("cannot write `{}`: {err}", path.display())))
}

fn print_json(value: &Value, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("failed to render output: {err}"),
    }
}
