//! docsession CLI
//!
//! Inspect and maintain a session database file from the command line

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use docsession_core::{CollectionLayout, StoreConfig};
use docsession_storage::{DocumentDb, JsonFileAdapter};
use docsession_store::{DocSessionStore, SessionStore};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "docsession")]
#[command(about = "Inspect and maintain a JSON session database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the session database file
    #[arg(long, value_name = "FILE", env = "DOCSESSION_DB", global = true, default_value = "sessions.json")]
    db: PathBuf,

    /// Store configuration file (JSON, YAML or TOML)
    #[arg(short, long, value_name = "FILE", env = "DOCSESSION_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Namespace key holding the sessions
    #[arg(long, global = true, conflicts_with = "no_namespace")]
    namespace: Option<String>,

    /// Keep sessions at the document root
    #[arg(long, global = true)]
    no_namespace: bool,

    /// Collection layout
    #[arg(long, value_enum, global = true)]
    layout: Option<LayoutArg>,

    /// Session TTL in seconds, applied to `set`
    #[arg(long, global = true)]
    ttl: Option<u64>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    Array,
    Mapping,
}

impl From<LayoutArg> for CollectionLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Array => CollectionLayout::Array,
            LayoutArg::Mapping => CollectionLayout::Mapping,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List session ids with their expiry
    List,
    /// Print the payload of one session
    Get { sid: String },
    /// Store a JSON payload for a session
    Set {
        sid: String,
        /// Session payload as JSON
        payload: String,
    },
    /// Remove one session
    Destroy { sid: String },
    /// Print the number of stored sessions
    Count,
    /// Remove expired sessions now
    Purge,
    /// Remove every session
    Clear,
    /// Keep purging on the configured interval until interrupted
    Watch,
}

impl Cli {
    /// Configuration file (or defaults) with command-line overrides applied
    fn store_config(&self) -> anyhow::Result<StoreConfig> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => StoreConfig::default(),
        };

        if let Some(namespace) = &self.namespace {
            config = config.with_namespace(namespace.clone());
        }
        if self.no_namespace {
            config = config.without_namespace();
        }
        if let Some(layout) = self.layout {
            config = config.with_layout(layout.into());
        }
        if let Some(ttl) = self.ttl {
            config = config.with_ttl(ttl);
        }

        // Only `watch` runs the background purge
        let watching = matches!(self.command, Commands::Watch);
        let disable_purge = !watching || config.disable_purge;
        Ok(config.with_purge_disabled(disable_purge))
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn open_store(cli: &Cli) -> anyhow::Result<DocSessionStore> {
    let config = cli.store_config()?;

    let default = match (config.layout, config.effective_namespace()) {
        (CollectionLayout::Array, None) => json!([]),
        _ => json!({}),
    };
    let document = DocumentDb::open_with_default(JsonFileAdapter::new(&cli.db), default)
        .with_context(|| format!("opening {}", cli.db.display()))?
        .into_shared();

    Ok(DocSessionStore::new(document, config)?)
}

fn format_expiry(expires_at: i64) -> String {
    chrono::DateTime::from_timestamp_millis(expires_at)
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| expires_at.to_string())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = open_store(&cli)?;

    match &cli.command {
        Commands::List => {
            for sid in store.sessions().ids()? {
                if let Some(record) = store.sessions().record(&sid)? {
                    println!("{}\t{}", record.id, format_expiry(record.expires_at));
                }
            }
        }
        Commands::Get { sid } => match store.get(sid).await? {
            Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
            None => anyhow::bail!("session '{}' not found", sid),
        },
        Commands::Set { sid, payload } => {
            let payload: Value =
                serde_json::from_str(payload).context("payload must be valid JSON")?;
            store.set(sid, payload).await?;
        }
        Commands::Destroy { sid } => store.destroy(sid).await?,
        Commands::Count => println!("{}", store.length().await?),
        Commands::Purge => {
            let removed = store.purge().await?;
            println!("{}", removed);
        }
        Commands::Clear => store.clear().await?,
        Commands::Watch => {
            info!(
                "Watching {} ({})",
                cli.db.display(),
                store.sessions().describe()
            );
            shutdown_signal().await;
        }
    }

    store.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    run(cli).await
}
