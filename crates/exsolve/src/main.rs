//! Exsolve CLI - answer exercise images with a vision model.
//!
//! Exsolve sends each image to Gemini under a shared rate limit, collects one
//! answer per image and writes them, in input order, to a document headed
//! with the student's name and group.
//!
//! # Usage
//!
//! ```bash
//! # Answer a few pages
//! exsolve solve page_1.png page_2.png --student "Ana Pop" --group 10B
//!
//! # Answer a directory, with extra instructions, as JSON
//! exsolve solve ./homework/ -i "Answer in English." --format json
//!
//! # Store the API key
//! exsolve config set-key
//!
//! # See which models will be used
//! exsolve models list
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Exsolve - answer exercise images with a vision model.
#[derive(Parser, Debug)]
#[command(name = "exsolve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer images and write the answers to a document
    Solve(cli::solve::SolveArgs),

    /// Inspect the vision models available to your API key
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match exsolve_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `exsolve config path`."
            );
            exsolve_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Exsolve v{}", exsolve_core::VERSION);

    match cli.command {
        Commands::Solve(args) => cli::solve::execute(args, config).await,
        Commands::Models(args) => cli::models::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
