//! CLI entry point for mdblog

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mdblog")]
#[command(version)]
#[command(about = "A minimal blog server for Markdown posts", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the blog over HTTP
    #[command(alias = "s")]
    Serve {
        /// Port to listen on (overrides _config.yml)
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to bind to (overrides _config.yml)
        #[arg(short, long)]
        ip: Option<String>,

        /// Reload templates and browsers when files change
        #[arg(short, long)]
        watch: bool,
    },

    /// List posts from their front-matter
    List,

    /// Render every post and report the ones that fail
    Check,

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "mdblog=debug,tower_http=debug,info"
    } else {
        "mdblog=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Serve { port, ip, watch } => {
            let blog = mdblog::Blog::new(&base_dir)?;
            let port = port.unwrap_or(blog.config.port);
            let ip = ip.unwrap_or_else(|| blog.config.ip.clone());

            tracing::info!("Starting server at http://{}:{}", ip, port);
            mdblog::server::start(&blog, &ip, port, watch).await?;
        }

        Commands::List => {
            let blog = mdblog::Blog::new(&base_dir)?;
            mdblog::commands::list::run(&blog)?;
        }

        Commands::Check => {
            let blog = mdblog::Blog::new(&base_dir)?;
            mdblog::commands::check::run(&blog)?;
        }

        Commands::Version => {
            println!("mdblog version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
