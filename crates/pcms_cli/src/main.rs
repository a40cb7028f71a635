//! CLI entry point for the portfolio CMS core.
//!
//! # Responsibility
//! - Load configuration, start logging, open the store and compose the core.
//! - Run one content command and print results as JSON.
//!
//! # Invariants
//! - Components are built once here and passed down; nothing is looked up
//!   from global state.
//! - Errors exit with status 1 and their message on stderr.

use clap::{Parser, Subcommand};
use log::{info, warn};
use pcms_core::db::migrations::latest_version;
use pcms_core::db::{open_db, open_db_in_memory};
use pcms_core::{
    compose, core_version, init_logging, load_config, Actor, CmsConfig, CmsCore, ContentId,
    ContentItem, ContentPatch, ContentRepository, ListRequest, NewContent, QueryError,
    SqliteContentRepository,
};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "pcms", version, about = "Portfolio CMS content core")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file; overrides `storage.database_path`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Caller identity recorded in audit fields.
    #[arg(long, global = true, default_value = "cli")]
    actor: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print version and schema information.
    Status,
    /// Create a draft.
    Create {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        body: String,
    },
    /// Edit title and/or body.
    Update {
        id: ContentId,
        #[arg(long)]
        version: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    /// Change the slug.
    Rename {
        id: ContentId,
        #[arg(long)]
        version: u64,
        slug: String,
    },
    /// Draft -> published.
    Publish {
        id: ContentId,
        #[arg(long)]
        version: u64,
    },
    /// Published -> draft.
    Unpublish {
        id: ContentId,
        #[arg(long)]
        version: u64,
    },
    /// Draft or published -> archived.
    Archive {
        id: ContentId,
        #[arg(long)]
        version: u64,
    },
    /// Remove permanently.
    Delete { id: ContentId },
    /// Show one item by id or slug.
    Get {
        /// UUID or slug.
        key: String,
        /// Only show published items.
        #[arg(long)]
        public: bool,
    },
    /// List items, one page at a time.
    List {
        #[arg(long)]
        status: Option<String>,
        /// Free-text title match.
        #[arg(long, short = 'q')]
        query: Option<String>,
        /// `[-]created_at|updated_at|title|slug`.
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        cursor: Option<String>,
        /// Only list published items.
        #[arg(long)]
        public: bool,
    },
}

impl Command {
    fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Create { .. }
                | Self::Update { .. }
                | Self::Rename { .. }
                | Self::Publish { .. }
                | Self::Unpublish { .. }
                | Self::Archive { .. }
                | Self::Delete { .. }
        )
    }
}

/// Warning for writes that would vanish with an in-memory store.
fn discarded_write_warning(
    command: &Command,
    database_path: Option<&Path>,
) -> Option<&'static str> {
    if database_path.is_none() && command.is_mutating() {
        Some(
            "warning: no database configured; this change is discarded on exit \
             (set --db or storage.database_path)",
        )
    } else {
        None
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match cli.config.as_ref() {
        Some(path) => load_config(path)?,
        None => CmsConfig::default(),
    };
    if let Some(db) = cli.db {
        config.storage.database_path = Some(db);
    }

    if let Some(log_dir) = config.logging.directory.as_ref() {
        init_logging(&config.logging.level, log_dir)?;
    }

    let conn = match config.storage.database_path.as_ref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let repo = SqliteContentRepository::new(&conn);
    let core = compose(&repo, &config);
    let actor = Actor::new(cli.actor);

    info!(
        "event=cli_ready module=cli status=ok version={} schema_version={}",
        core_version(),
        latest_version()
    );

    match cli.command.unwrap_or(Command::Status) {
        Command::Status => {
            println!("pcms {} is running", core_version());
            println!("schema_version={}", latest_version());
            match config.storage.database_path.as_ref() {
                Some(path) => println!("database={}", path.display()),
                None => println!("database=:memory:"),
            }
            Ok(())
        }
        command => {
            if let Some(message) =
                discarded_write_warning(&command, config.storage.database_path.as_deref())
            {
                warn!("event=cli_store module=cli status=memory_only");
                eprintln!("{message}");
            }
            run_command(&core, command, &actor)
        }
    }
}

fn run_command<R: ContentRepository>(
    core: &CmsCore<R>,
    command: Command,
    actor: &Actor,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Status => Ok(()),
        Command::Create { slug, title, body } => {
            print_json(&core.service.create(NewContent { slug, title, body }, actor)?)
        }
        Command::Update {
            id,
            version,
            title,
            body,
        } => {
            let patch = ContentPatch { title, body };
            if patch.is_empty() {
                return Err("update needs --title and/or --body".into());
            }
            print_json(&core.service.update(id, version, patch, actor)?)
        }
        Command::Rename { id, version, slug } => {
            print_json(&core.service.rename(id, version, slug, actor)?)
        }
        Command::Publish { id, version } => print_json(&core.service.publish(id, version, actor)?),
        Command::Unpublish { id, version } => {
            print_json(&core.service.unpublish(id, version, actor)?)
        }
        Command::Archive { id, version } => print_json(&core.service.archive(id, version, actor)?),
        Command::Delete { id } => {
            core.service.delete(id, actor)?;
            println!("deleted {id}");
            Ok(())
        }
        Command::Get { key, public } => {
            let item = match (ContentId::parse_str(&key), public) {
                (Ok(id), false) => core.gateway.get(id)?,
                (Ok(id), true) => {
                    let item = core.gateway.get(id)?;
                    if !item.is_public() {
                        return Err(QueryError::NotFound(id).into());
                    }
                    item
                }
                (Err(_), false) => core.gateway.get_by_slug(&key)?,
                (Err(_), true) => core.gateway.get_public_by_slug(&key)?,
            };
            print_json(&item)
        }
        Command::List {
            status,
            query,
            sort,
            limit,
            cursor,
            public,
        } => {
            let request = ListRequest::from_params(
                status.as_deref(),
                query.as_deref(),
                sort.as_deref(),
                limit,
                cursor.as_deref(),
            )?;
            let page = if public {
                core.gateway.list_public(&request)?
            } else {
                core.gateway.list(&request)?
            };
            print_json(&PageView {
                items: &page.items,
                next_cursor: page.next_cursor.as_deref(),
                applied_limit: page.applied_limit,
            })
        }
    }
}

#[derive(Serialize)]
struct PageView<'a> {
    items: &'a [ContentItem],
    next_cursor: Option<&'a str>,
    applied_limit: u32,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
