//! Binary entry point for keepr.
//!
//! This binary provides the CLI view over the memory access-control engine.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use keepr::cli::{OutputFormat, read_keyword, render_config, render_memory, render_wall};
use keepr::config::KeeprConfig;
use keepr::observability::{self, InitOptions};
use keepr::{
    AccessControlEngine, CollectionLoad, HttpMemoryService, MemoryId, NewMemory, SessionContext,
    SortOrder, TokenStore,
};
use secrecy::SecretString;
use std::collections::HashSet;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;

/// Keepr - keyword-locked memories on a shared wall.
#[derive(Parser)]
#[command(name = "keepr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Show the memory wall.
    Wall {
        /// Only show memories whose title or description contains this text.
        #[arg(short, long)]
        query: Option<String>,

        /// Ordering: server, newest, or oldest.
        #[arg(short, long, default_value = "server")]
        sort: String,

        /// Output format: table or json.
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show one memory.
    Show {
        /// Memory ID.
        id: String,

        /// Output format: table or json.
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Unlock a memory with its keyword.
    Unlock {
        /// Memory ID.
        id: String,

        /// The keyword. Read from stdin when omitted.
        #[arg(short, long)]
        keyword: Option<String>,
    },

    /// Create a keyword-locked memory.
    Add {
        /// Title.
        #[arg(short, long)]
        title: String,

        /// Keyword viewers must supply to unlock it.
        #[arg(short, long)]
        keyword: String,

        /// Description.
        #[arg(short, long, default_value = "")]
        description: String,

        /// Absolute URL of an image.
        #[arg(short, long)]
        image_url: Option<String>,
    },

    /// Manage the stored session token.
    Session {
        /// Session subcommand.
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Show the effective configuration.
    Config,
}

/// Session subcommands.
#[derive(Subcommand)]
enum SessionAction {
    /// Store a bearer token for later commands.
    Login {
        /// The bearer token.
        #[arg(short, long, env = "KEEPR_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Forget the stored token.
    Logout,
    /// Report whether a token is stored.
    Status,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(
        Some(&config.logging),
        InitOptions {
            verbose: cli.verbose,
        },
    ) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(cli: Cli, config: KeeprConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = TokenStore::in_dir(&config.data_dir);

    match cli.command {
        Commands::Wall {
            query,
            sort,
            format,
        } => cmd_wall(&config, &store, query, &sort, &format).await,

        Commands::Show { id, format } => cmd_show(&config, &store, &id, &format).await,

        Commands::Unlock { id, keyword } => cmd_unlock(&config, &store, &id, keyword).await,

        Commands::Add {
            title,
            keyword,
            description,
            image_url,
        } => cmd_add(&config, &store, title, keyword, description, image_url).await,

        Commands::Session { action } => cmd_session(&store, action),

        Commands::Config => cmd_config(&config, &store),
    }
}

/// Loads configuration.
fn load_config(path: Option<&str>) -> Result<KeeprConfig, Box<dyn std::error::Error>> {
    // If a path is provided, load from that file
    if let Some(config_path) = path {
        return KeeprConfig::load_from_file(std::path::Path::new(config_path))
            .map_err(std::convert::Into::into);
    }

    // Environment override for config path
    if let Ok(config_path) = std::env::var("KEEPR_CONFIG_PATH") {
        if !config_path.trim().is_empty() {
            return KeeprConfig::load_from_file(std::path::Path::new(&config_path))
                .map_err(std::convert::Into::into);
        }
    }

    // Otherwise, load from default location
    Ok(KeeprConfig::load_default())
}

/// Builds the engine with the stored session.
fn build_engine(
    config: &KeeprConfig,
    store: &TokenStore,
) -> Result<AccessControlEngine, Box<dyn std::error::Error>> {
    let session = Arc::new(SessionContext::from_secret(store.load()?));
    let service = Arc::new(HttpMemoryService::from_config(config));
    Ok(AccessControlEngine::new(service, session, config.scope))
}

/// Reports a degraded or retained load on stderr.
fn warn_if_degraded(load: &CollectionLoad) {
    if let Some(reason) = load.failure() {
        eprintln!("Warning: {}", reason.user_message());
    }
}

/// Wall command.
async fn cmd_wall(
    config: &KeeprConfig,
    store: &TokenStore,
    query: Option<String>,
    sort: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(config, store)?;
    let load = engine.load_collection().await;
    warn_if_degraded(&load);

    let memories = match query.as_deref() {
        Some(q) => {
            let matching: HashSet<MemoryId> = engine.filter(q).into_iter().map(|m| m.id).collect();
            engine
                .sorted(SortOrder::parse(sort))
                .into_iter()
                .filter(|m| matching.contains(&m.id))
                .collect()
        },
        None => engine.sorted(SortOrder::parse(sort)),
    };

    let mut out = io::stdout().lock();
    render_wall(&mut out, &memories, engine.provenance(), OutputFormat::parse(format))?;
    Ok(())
}

/// Show command.
async fn cmd_show(
    config: &KeeprConfig,
    store: &TokenStore,
    id: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let memory_id = MemoryId::parse(id)?;
    let engine = build_engine(config, store)?;
    let load = engine.load_collection().await;
    warn_if_degraded(&load);

    let Some(memory) = engine.get(&memory_id) else {
        return Err(format!("memory {memory_id} not found").into());
    };

    let mut out = io::stdout().lock();
    render_memory(&mut out, &memory, OutputFormat::parse(format))?;
    Ok(())
}

/// Unlock command.
async fn cmd_unlock(
    config: &KeeprConfig,
    store: &TokenStore,
    id: &str,
    keyword: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let memory_id = MemoryId::parse(id)?;
    let keyword = match keyword {
        Some(keyword) => keyword,
        None => {
            if io::stdin().is_terminal() {
                eprint!("Keyword for memory {memory_id}: ");
                io::stderr().flush()?;
            }
            read_keyword(io::stdin().lock())?
        },
    };

    let engine = build_engine(config, store)?;
    let load = engine.load_collection().await;
    warn_if_degraded(&load);

    let receipt = engine
        .attempt_unlock(&memory_id, &keyword)
        .await
        .map_err(|e| e.user_message())?;
    drop(keyword);

    if receipt.transitioned {
        println!("Unlocked memory {}.", receipt.memory_id);
    } else {
        println!("Memory {} was already unlocked.", receipt.memory_id);
    }
    if let Some(message) = &receipt.message {
        println!("{message}");
    }
    warn_if_degraded(&receipt.refresh);

    if let Some(memory) = engine.get(&memory_id).or(receipt.memory) {
        let mut out = io::stdout().lock();
        render_memory(&mut out, &memory, OutputFormat::Table)?;
    }
    Ok(())
}

/// Add command.
async fn cmd_add(
    config: &KeeprConfig,
    store: &TokenStore,
    title: String,
    keyword: String,
    description: String,
    image_url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut memory = NewMemory::new(title, keyword).with_description(description);
    if let Some(url) = image_url {
        memory = memory.with_image_url(url);
    }

    let engine = build_engine(config, store)?;
    let id = engine
        .create_memory(memory)
        .await
        .map_err(|e| e.user_message())?;
    println!("Created memory {id}.");
    Ok(())
}

/// Session command.
fn cmd_session(store: &TokenStore, action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SessionAction::Login { token } => {
            let token = token.trim();
            if token.is_empty() {
                return Err("token must not be empty".into());
            }
            store.save(&SecretString::from(token))?;
            println!("Session stored at {}.", store.path().display());
        },
        SessionAction::Logout => {
            store.clear()?;
            println!("Logged out.");
        },
        SessionAction::Status => {
            if store.load()?.is_some() {
                println!("Logged in (token stored at {}).", store.path().display());
            } else {
                println!("Not logged in.");
            }
        },
    }
    Ok(())
}

/// Config command.
fn cmd_config(config: &KeeprConfig, store: &TokenStore) -> Result<(), Box<dyn std::error::Error>> {
    let authenticated = store.load()?.is_some();
    let mut out = io::stdout().lock();
    render_config(&mut out, config, authenticated)?;
    Ok(())
}
