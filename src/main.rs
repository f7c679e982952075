//! CLI entry point for mdpreview

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdpreview::commands::show::ShowFormat;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mdpreview")]
#[command(version)]
#[command(about = "Preview Markdown posts with YAML front-matter", long_about = None)]
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
    /// Start the preview server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,
    },

    /// Save a .md file into the local store
    #[command(alias = "u")]
    Upload {
        /// Markdown file to upload
        file: PathBuf,
    },

    /// Load a stored post and print it
    Show {
        /// Slug of the post
        slug: String,

        /// Print the load state as JSON
        #[arg(long, conflicts_with = "html")]
        json: bool,

        /// Print the rendered body HTML
        #[arg(long)]
        html: bool,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "mdpreview=debug,info"
    } else {
        "mdpreview=info"
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
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    match cli.command {
        Commands::Serve { port, ip, open } => {
            let previewer = mdpreview::Previewer::new(&base_dir)?;
            tracing::info!("Starting preview server at http://{}:{}", ip, port);
            mdpreview::server::start(&previewer, &ip, port, open).await?;
        }

        Commands::Upload { file } => {
            let previewer = mdpreview::Previewer::new(&base_dir)?;
            let file = if file.is_absolute() {
                file
            } else {
                base_dir.join(file)
            };
            mdpreview::commands::upload::run(&previewer, &file).await?;
        }

        Commands::Show { slug, json, html } => {
            let previewer = mdpreview::Previewer::new(&base_dir)?;
            let format = if json {
                ShowFormat::Json
            } else if html {
                ShowFormat::Html
            } else {
                ShowFormat::Summary
            };
            mdpreview::commands::show::run(&previewer, &slug, format)?;
        }

        Commands::Version => {
            println!("mdpreview version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
