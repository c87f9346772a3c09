use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wayfinder::{config, gateway, locations::LocationStore, render};

#[derive(Parser)]
#[command(name = "wayfinder")]
#[command(about = "Campus location browser backend with a safe chat-message renderer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,

        /// Auth token for admin routes (required for non-loopback)
        #[arg(long, env = "WAYFINDER_TOKEN")]
        token: Option<String>,

        /// Directory of location catalogues (overrides config)
        #[arg(long)]
        locations: Option<PathBuf>,

        /// Directory of knowledge-base documents (overrides config)
        #[arg(long)]
        documents: Option<PathBuf>,
    },

    /// Render a chat message to HTML
    Render {
        /// File to read; stdin when omitted
        path: Option<PathBuf>,
    },

    /// List the locations found in a directory
    Locations {
        /// Directory of location catalogues (defaults to config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Show resolved configuration
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            bind,
            token,
            locations,
            documents,
        } => {
            let mut config = config::load()?;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            if let Some(dir) = locations {
                config.locations.dir = dir;
            }
            if let Some(dir) = documents {
                config.documents.dir = dir;
            }
            gateway::run(config, token).await
        }
        Commands::Render { path } => {
            let text = match path {
                Some(path) => std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .map_err(|e| anyhow::anyhow!("failed to read stdin: {e}"))?;
                    buf
                }
            };
            println!("{}", render::render(&text));
            Ok(())
        }
        Commands::Locations { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => config::load()?.locations.dir,
            };
            let store = LocationStore::load_dir(dir);
            println!("{}", serde_json::to_string_pretty(store.all())?);
            Ok(())
        }
        Commands::Status => {
            let config = config::load()?;
            println!("wayfinder v{}", env!("CARGO_PKG_VERSION"));
            println!("config: {}", config::config_path().display());
            println!(
                "gateway: {}:{}",
                config.gateway.bind, config.gateway.port
            );
            println!(
                "provider: {} ({}), api key {}",
                config.agent.provider,
                config.agent.model,
                if config.agent.api_key.is_some() { "set" } else { "missing" }
            );
            println!("locations: {}", config.locations.dir.display());
            println!("documents: {}", config.documents.dir.display());
            Ok(())
        }
    }
}
