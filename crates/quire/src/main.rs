//! Quire CLI - static site builder.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use quire_static::Stage;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Build a documentation site from Markdown, Sass, scripts and elements")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, lint and build everything (default)
    Build,

    /// Remove the output directory and generated CSS
    Clean,

    /// Compile Sass to CSS
    Style,

    /// Write the syntax highlighting style module
    StyleModules,

    /// Copy images into the output
    Images,

    /// Check scripts for syntax errors
    Lint,

    /// Lint and minify scripts
    Js,

    /// Bundle HTML imports into one document and script
    Bundle,

    /// Copy site files into the output
    Copy,

    /// Generate HTML pages from Markdown
    #[command(alias = "md")]
    Pages,

    /// Build, then rebuild on change while serving the output
    Watch {
        /// Reload browser tabs after each rebuild
        #[arg(long)]
        reload: bool,

        /// Open a browser tab on start
        #[arg(long)]
        open: bool,

        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Preview the built site
    Serve {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve (defaults to the output directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt().with_env_filter(filter).with_target(false).init();

    let settings = config::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Build) {
        Commands::Build => commands::build::run(settings.site).await?,
        Commands::Clean => commands::stage::run(settings.site, &[Stage::Clean]).await?,
        Commands::Style => commands::stage::run(settings.site, &[Stage::Style]).await?,
        Commands::StyleModules => {
            commands::stage::run(settings.site, &[Stage::StyleModules]).await?
        }
        Commands::Images => commands::stage::run(settings.site, &[Stage::Images]).await?,
        Commands::Lint => commands::stage::run(settings.site, &[Stage::Lint]).await?,
        Commands::Js => {
            commands::stage::run(settings.site, &[Stage::Lint, Stage::Scripts]).await?
        }
        Commands::Bundle => commands::stage::run(settings.site, &[Stage::Bundle]).await?,
        Commands::Copy => commands::stage::run(settings.site, &[Stage::Copy]).await?,
        Commands::Pages => commands::stage::run(settings.site, &[Stage::Pages]).await?,
        Commands::Watch { reload, open, port } => {
            let port = port.unwrap_or(settings.port);
            commands::watch::run(settings.site, reload, open, port).await?;
        }
        Commands::Serve { port, dir } => {
            let port = port.unwrap_or(settings.port);
            let dir = dir.unwrap_or_else(|| settings.site.output_dir.clone());
            commands::serve::run(port, dir).await?;
        }
    }

    Ok(())
}
