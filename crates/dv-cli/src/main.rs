mod anki;
mod server;
mod source;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dv_core::{ControlMessage, Pipeline, PageWordSet, QueryFields, build_queries, tokenize};
use dv_store::{Config, DataDir, SettingsStore};
use rmcp::{ServiceExt, transport::stdio};

use crate::anki::AnkiClient;

#[derive(Parser)]
#[command(name = "dv", about = "Deck-knowledge page annotator: CLI and MCP server")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Print the tokens of a text, one per line
    Tokenize {
        /// Text to tokenize
        text: String,
    },

    /// Print the card search expressions for a set of words
    Query {
        /// Deck to search
        #[arg(long)]
        deck: String,

        /// Words to look up
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Classify a page (.txt or .md) against a deck
    Analyze {
        /// Page file
        file: PathBuf,

        /// Page address; defaults to the file's path
        #[arg(long)]
        url: Option<String>,

        /// Deck to check against; defaults to the selected deck
        #[arg(long)]
        deck: Option<String>,

        /// Flashcard store endpoint; overrides config.toml
        #[arg(long)]
        endpoint: Option<String>,

        /// Also print the page as highlighted HTML
        #[arg(long)]
        annotate: bool,
    },

    /// List the decks in the flashcard store
    Decks {
        /// Flashcard store endpoint; overrides config.toml
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Turn analysis on for a deck
    Enable {
        #[arg(long)]
        deck: String,
    },

    /// Turn analysis off
    Disable,

    /// Show the persisted settings and data directory
    Status,
}

fn open_data_dir() -> Result<DataDir> {
    DataDir::open(None).context("failed to open data directory")
}

fn load_config(data: &DataDir) -> Result<Config> {
    data.load_config().context("failed to load config.toml")
}

fn open_settings(data: &DataDir) -> Result<SettingsStore> {
    data.open_settings().context("failed to open settings store")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve().await,
        Commands::Tokenize { text } => cmd_tokenize(text),
        Commands::Query { deck, words } => cmd_query(deck, words),
        Commands::Analyze {
            file,
            url,
            deck,
            endpoint,
            annotate,
        } => {
            cmd_analyze(
                file,
                url.as_deref(),
                deck.as_deref(),
                endpoint.as_deref(),
                *annotate,
            )
            .await
        }
        Commands::Decks { endpoint } => cmd_decks(endpoint.as_deref()).await,
        Commands::Enable { deck } => cmd_enable(deck),
        Commands::Disable => cmd_disable(),
        Commands::Status => cmd_status(),
    }
}

// ---------------------------------------------------------------------------
// Advisory pidfile for observability
// ---------------------------------------------------------------------------

fn pidfile_path(data: &DataDir) -> PathBuf {
    data.root().join("dv-serve.pid")
}

/// Check for an existing pidfile and log accordingly, then write our own.
fn acquire_pidfile(data: &DataDir) -> Option<PathBuf> {
    let path = pidfile_path(data);
    if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(pid) = content.trim().parse::<u32>()
    {
        if is_process_alive(pid) {
            tracing::warn!("another dv serve (PID {pid}) is running; sharing settings.db");
        } else {
            tracing::info!("cleaned up stale pidfile (PID {pid} is dead)");
            let _ = std::fs::remove_file(&path);
        }
    }

    match std::fs::File::create(&path) {
        Ok(mut f) => {
            let _ = write!(f, "{}", std::process::id());
            tracing::info!("wrote pidfile: {}", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("failed to write pidfile: {e}");
            None
        }
    }
}

fn release_pidfile(path: &Path) {
    let _ = std::fs::remove_file(path);
    tracing::info!("removed pidfile: {}", path.display());
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) checks existence without sending a signal
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    false
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Serve until the client hangs up. A client that closes stdin before the
/// handshake completes is a normal exit.
async fn run_server(server: server::DvServer) -> Result<()> {
    let service = match server.serve(stdio()).await {
        Ok(service) => service,
        Err(e) => {
            tracing::info!("client disconnected before initialization: {e}");
            return Ok(());
        }
    };
    service.waiting().await.context("MCP service task failed")?;
    tracing::info!("MCP session ended");
    Ok(())
}

async fn cmd_serve() -> Result<()> {
    let data = open_data_dir()?;
    let config = load_config(&data)?;
    let settings = open_settings(&data)?;
    tracing::info!("starting MCP server, data dir {}", data.root().display());

    let pidfile = acquire_pidfile(&data);

    let server = server::DvServer::new(config, settings).map_err(|e| anyhow::anyhow!("{e}"))?;
    let (result, signalled) = tokio::select! {
        result = run_server(server.clone()) => (result, false),
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            (Ok(()), true)
        }
    };

    server.checkpoint_wal().await;
    if let Some(path) = pidfile {
        release_pidfile(&path);
    }
    if signalled {
        // A pending blocking stdin read would stall runtime shutdown.
        std::process::exit(0);
    }
    result
}

fn cmd_tokenize(text: &str) -> Result<()> {
    let data = open_data_dir()?;
    let config = load_config(&data)?;

    for token in tokenize(text, config.engine.script_policy()) {
        println!("{token}");
    }
    Ok(())
}

fn cmd_query(deck: &str, words: &[String]) -> Result<()> {
    let data = open_data_dir()?;
    let config = load_config(&data)?;

    let mut set = PageWordSet::new();
    for word in words {
        set.insert(word);
    }
    let queries = build_queries(
        deck,
        set.iter(),
        &QueryFields::from(&config.anki),
        config.engine.query_mode(),
        config.engine.batch_size,
    );
    for query in queries {
        println!("{query}");
    }
    Ok(())
}

async fn cmd_analyze(
    file: &Path,
    url: Option<&str>,
    deck: Option<&str>,
    endpoint: Option<&str>,
    annotate: bool,
) -> Result<()> {
    let data = open_data_dir()?;
    let mut config = load_config(&data)?;
    if let Some(endpoint) = endpoint {
        config.anki.endpoint = endpoint.to_string();
    }

    let deck = match deck {
        Some(deck) => deck.to_string(),
        None => open_settings(&data)?
            .selected_deck()
            .context("failed to read selected deck")?,
    };
    if deck.trim().is_empty() {
        anyhow::bail!("no deck selected; pass --deck or run `dv enable --deck <name>`");
    }

    let mut document = source::load_document(file)?;
    let url = url
        .map(str::to_string)
        .unwrap_or_else(|| format!("file://{}", file.display()));

    let client = AnkiClient::new(&config.anki).context("failed to create flashcard client")?;
    let mut pipeline = Pipeline::new(config.engine, &config.anki);
    pipeline.set_enabled(true, &deck);

    let stats = pipeline
        .analyze(&client, &mut document, &url, true)
        .await
        .context("analysis produced no result")?;

    let message = ControlMessage::stats_update(stats);
    println!("{}", serde_json::to_string_pretty(&message)?);
    if annotate {
        println!("{}", document.render_html());
    }
    Ok(())
}

async fn cmd_decks(endpoint: Option<&str>) -> Result<()> {
    let data = open_data_dir()?;
    let mut config = load_config(&data)?;
    if let Some(endpoint) = endpoint {
        config.anki.endpoint = endpoint.to_string();
    }

    let client = AnkiClient::new(&config.anki).context("failed to create flashcard client")?;
    let decks = client
        .deck_names()
        .await
        .with_context(|| format!("flashcard store at {} unavailable", client.endpoint()))?;
    for deck in decks {
        println!("{deck}");
    }
    Ok(())
}

fn cmd_enable(deck: &str) -> Result<()> {
    if deck.trim().is_empty() {
        anyhow::bail!("deck name must not be empty");
    }
    let data = open_data_dir()?;
    let settings = open_settings(&data)?;
    settings
        .save_toggle(true, deck)
        .context("failed to save settings")?;
    println!("enabled: {}", deck.trim());
    Ok(())
}

fn cmd_disable() -> Result<()> {
    let data = open_data_dir()?;
    let settings = open_settings(&data)?;
    let deck = settings
        .selected_deck()
        .context("failed to read selected deck")?;
    settings
        .save_toggle(false, &deck)
        .context("failed to save settings")?;
    println!("disabled");
    Ok(())
}

fn cmd_status() -> Result<()> {
    let data = open_data_dir()?;
    let config = load_config(&data)?;
    let settings = open_settings(&data)?;

    let enabled = settings.is_enabled().context("failed to read settings")?;
    let deck = settings
        .selected_deck()
        .context("failed to read selected deck")?;

    println!("data_dir:   {}", data.root().display());
    println!("enabled:    {enabled}");
    println!(
        "deck:       {}",
        if deck.is_empty() { "(none)" } else { deck.as_str() }
    );
    println!("endpoint:   {}", config.anki.endpoint);
    println!(
        "fields:     {} / {}",
        config.anki.word_field, config.anki.reading_field
    );
    Ok(())
}
