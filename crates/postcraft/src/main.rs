//! Postcraft CLI - AI-assisted social media posts from your images.
//!
//! Postcraft sends up to three images to a hosted vision model, keeps the
//! analyses, composes a final post from an analysis plus your caption and
//! hashtags, and appends finished posts to a CSV file.
//!
//! # Usage
//!
//! ```bash
//! # Analyze an image with Gemini
//! postcraft analyze beach.jpg -p "Describe the mood"
//!
//! # Analyze, compose a post and save it
//! postcraft analyze beach.jpg -p "Describe" --caption "Day off" --hashtags "sea,sun" --compose --save
//!
//! # Chat with Groq
//! postcraft chat -m "Suggest a caption for a sunset photo"
//!
//! # List saved posts
//! postcraft posts
//!
//! # Interactive workbench
//! postcraft
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use std::io::IsTerminal;

mod cli;
mod logging;

/// Postcraft - AI-assisted social media posts from your images.
#[derive(Parser, Debug)]
#[command(name = "postcraft")]
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
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze images with a vision model, optionally composing and saving a post
    Analyze(cli::analyze::AnalyzeArgs),

    /// Chat with Groq, streaming the reply
    Chat(cli::chat::ChatArgs),

    /// List saved posts
    Posts(cli::posts::PostsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match postcraft_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `postcraft config path`."
            );
            postcraft_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Postcraft v{}", postcraft_core::VERSION);

    match cli.command {
        Some(Commands::Analyze(args)) => cli::analyze::execute(args, &config).await,
        Some(Commands::Chat(args)) => cli::chat::execute(args, &config).await,
        Some(Commands::Posts(args)) => cli::posts::execute(args, &config).await,
        Some(Commands::Config(args)) => cli::config::execute(args).await,
        None if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() => {
            cli::interactive::run(config).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
