//! Command-line front end over the document service.
//!
//! # Responsibility
//! - Map subcommands onto `DocumentService` operations for one caller.
//! - Print results as JSON; errors go to stderr with a non-zero exit code.
//!
//! The caller identity comes from `--user`; omitting it runs the command
//! anonymously, which only succeeds for reads of published documents.

use clap::{Parser, Subcommand};
use log::{info, warn};
use pagetree_core::db::{open_db, share};
use pagetree_core::{
    filter_by_title, init_from_config, logging_status, CoreConfig, DocumentPatch, DocumentService,
    Identity,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use uuid::Uuid;

const PROPAGATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "pagetree", version, about = "Hierarchical document store")]
struct Cli {
    /// Identity subject of the caller. Omit for anonymous access.
    #[arg(long, global = true)]
    user: Option<String>,

    /// SQLite database file. Overrides PAGETREE_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a document, optionally under a parent
    Create {
        title: String,
        #[arg(long)]
        parent: Option<Uuid>,
    },
    /// List active documents under a parent (roots when omitted)
    Sidebar {
        #[arg(long)]
        parent: Option<Uuid>,
    },
    /// List archived documents
    Trash {
        /// Case-insensitive title filter
        #[arg(long)]
        filter: Option<String>,
    },
    /// List all active documents
    Search {
        /// Case-insensitive title filter
        #[arg(long)]
        filter: Option<String>,
    },
    /// Fetch one document
    Get { id: Uuid },
    /// Update title, content, cover image, icon or published flag
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        cover_image: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        published: Option<bool>,
    },
    /// Move a document and its subtree to trash
    Archive { id: Uuid },
    /// Bring a document and its subtree back from trash
    Restore { id: Uuid },
    /// Delete a document permanently (children are kept)
    Remove { id: Uuid },
    /// Clear the icon of a document
    RemoveIcon { id: Uuid },
    /// Clear the cover image of a document
    RemoveCover { id: Uuid },
    /// Re-run subtree propagation for a document
    Reconcile { id: Uuid },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Value, String> {
    let mut config = CoreConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    init_from_config(&config)?;
    if let Some((level, log_dir)) = logging_status() {
        info!(
            "event=cli_start module=cli status=ok level={level} log_dir={}",
            log_dir.display()
        );
    }

    let conn = open_db(&config.db_path).map_err(|err| format!("open database failed: {err}"))?;
    let service = DocumentService::new(share(conn)).map_err(|err| err.to_string())?;
    let caller = cli.user.map(Identity::new);

    let output = execute(&service, &caller, cli.command).map_err(|err| err.to_string())?;

    if !service.wait_idle(PROPAGATION_DRAIN_TIMEOUT) {
        warn!("event=cli_exit module=cli status=error error_code=propagation_not_drained");
    }
    Ok(output)
}

fn execute(
    service: &DocumentService,
    caller: &Option<Identity>,
    command: Command,
) -> Result<Value, Box<dyn std::error::Error>> {
    let value = match command {
        Command::Create { title, parent } => {
            let id = service.create(caller, &title, parent)?;
            json!({ "id": id })
        }
        Command::Sidebar { parent } => serde_json::to_value(service.get_sidebar(caller, parent)?)?,
        Command::Trash { filter } => {
            let documents = service.get_trash(caller)?;
            serde_json::to_value(filter_by_title(documents, filter.as_deref().unwrap_or("")))?
        }
        Command::Search { filter } => {
            let documents = service.get_search(caller)?;
            serde_json::to_value(filter_by_title(documents, filter.as_deref().unwrap_or("")))?
        }
        Command::Get { id } => serde_json::to_value(service.get_by_id(caller, id)?)?,
        Command::Update {
            id,
            title,
            content,
            cover_image,
            icon,
            published,
        } => {
            let patch = DocumentPatch {
                title,
                content,
                cover_image_url: cover_image,
                icon,
                is_published: published,
            };
            serde_json::to_value(service.update(caller, id, patch)?)?
        }
        Command::Archive { id } => serde_json::to_value(service.archive(caller, id)?)?,
        Command::Restore { id } => serde_json::to_value(service.restore(caller, id)?)?,
        Command::Remove { id } => serde_json::to_value(service.remove(caller, id)?)?,
        Command::RemoveIcon { id } => serde_json::to_value(service.remove_icon(caller, id)?)?,
        Command::RemoveCover { id } => {
            serde_json::to_value(service.remove_cover_image(caller, id)?)?
        }
        Command::Reconcile { id } => serde_json::to_value(service.reconcile(caller, id)?)?,
    };
    Ok(value)
}
