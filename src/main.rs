//! # Handbook RAG CLI (`handbook`)
//!
//! ## Usage
//!
//! ```bash
//! handbook [--config ./config/handbook.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `handbook serve` | Start the HTTP chat server |
//! | `handbook ask "<message>"` | Answer one message and print the sources |
//! | `handbook search "<query>"` | Show the excerpts a query would retrieve |
//! | `handbook inspect` | Load the document and print its state |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use handbook_rag::config;
use handbook_rag::retriever::{DocumentStatus, Retriever};
use handbook_rag::server;

/// Handbook RAG: answer questions grounded in a reference document.
///
/// Model credentials come from `AZURE_INFERENCE_SDK_ENDPOINT` and
/// `AZURE_INFERENCE_SDK_KEY` (a `.env` file is read if present).
#[derive(Parser)]
#[command(
    name = "handbook",
    about = "Handbook RAG: answer questions grounded in a reference document",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server.
    Serve,

    /// Answer a single message.
    Ask {
        /// The question to ask.
        message: String,

        /// Answer without consulting the document.
        #[arg(long)]
        no_rag: bool,
    },

    /// Show the excerpts retrieved for a query, with scores.
    ///
    /// Does not call the model.
    Search {
        /// The search query string.
        query: String,
    },

    /// Load the document and report its state.
    Inspect,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { message, no_rag } => {
            let chat = server::build_chat_service(&cfg)?;
            let answer = chat.answer(&message, !no_rag).await?;
            println!("{}", answer.reply);
            if !answer.sources.is_empty() {
                println!();
                println!("Sources:");
                for (i, source) in answer.sources.iter().enumerate() {
                    println!("  {}. \"{}\"", i + 1, excerpt(source));
                }
            }
        }
        Commands::Search { query } => {
            let retriever = Retriever::from_config(&cfg);
            let results = retriever.retrieve_scored(&query).await;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, result) in results.iter().enumerate() {
                println!("{}. [{}] chunk #{}", i + 1, result.score, result.index);
                println!("    excerpt: \"{}\"", excerpt(&result.text));
                println!();
            }
        }
        Commands::Inspect => {
            let retriever = Retriever::from_config(&cfg);
            retriever.ensure_loaded().await;
            println!("document: {}", cfg.document.path.display());
            match retriever.status() {
                DocumentStatus::Loaded {
                    chunks,
                    chars,
                    digest,
                    loaded_at,
                } => {
                    println!("state:    loaded");
                    println!("chunks:   {} (max {} chars)", chunks, cfg.chunking.chunk_size);
                    println!("chars:    {}", chars);
                    println!("sha256:   {}", digest);
                    println!("loaded:   {}", loaded_at.to_rfc3339());
                }
                DocumentStatus::Unavailable { reason } => {
                    println!("state:    unavailable");
                    println!("reason:   {}", reason);
                }
                other => println!("state:    {:?}", other),
            }
        }
    }

    Ok(())
}

/// First 240 characters of a chunk, for terminal display.
fn excerpt(text: &str) -> String {
    const MAX: usize = 240;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
