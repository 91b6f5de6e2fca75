mod action_cmds;
mod config;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::{CliOverrides, DeckforgeConfig};

#[derive(Parser)]
#[command(name = "deckforge", about = "Turn documents into slide decks with a hosted LLM")]
struct Cli {
    /// API key (overrides DECKFORGE_API_KEY / GEMINI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Base URL of the generation API (overrides DECKFORGE_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a deckforge config file
    Init {
        /// API key to store (defaults to the one from the environment)
        #[arg(long = "key")]
        key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Serve the actions over HTTP
    Serve {
        /// Address to bind (defaults to server.bind from the config file)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (defaults to server.port from the config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate slides from a document (.docx or plain text)
    Slides {
        /// Path to the document
        file: PathBuf,
    },
    /// Generate an image from a prompt
    Image {
        /// What the image should show
        prompt: String,
        /// Write the decoded image here instead of printing the data URI
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Research data and statistics for a presentation topic
    Research {
        /// Topic to research
        topic: String,
    },
    /// Ask the presentation-tips chatbot
    Chat {
        /// Your question
        query: String,
    },
    /// Ask a question about deckforge
    Faq {
        /// Your question
        question: String,
        /// Extra context for the answer
        #[arg(long)]
        context: Option<String>,
        /// JSON file with earlier turns: [{"question": ..., "answer": ...}]
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Run the web search helper
    Search {
        /// Search query
        query: String,
    },
}

/// Execute the `deckforge init` command: write config file.
fn cmd_init(key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let api_key = key
        .or_else(deckforge_core::BackendConfig::api_key_from_env)
        .ok_or_else(|| {
            anyhow::anyhow!("no API key given; pass --key or set DECKFORGE_API_KEY / GEMINI_API_KEY")
        })?;

    let cfg = config::ConfigFile {
        backend: config::BackendSection {
            api_key: api_key.clone(),
            base_url: None,
            text_model: None,
            image_model: None,
            timeout_secs: None,
        },
        server: config::ServerSection::default(),
        limits: config::LimitsSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  backend.api_key = {}", mask(&api_key));
    println!();
    println!("Next: run `deckforge serve` or `deckforge slides <file>`.");

    Ok(())
}

/// Show only the ends of a secret.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = CliOverrides {
        api_key: cli.api_key,
        base_url: cli.base_url,
    };

    let ok = match cli.command {
        Commands::Init { key, force } => {
            cmd_init(key.or(overrides.api_key), force)?;
            true
        }
        Commands::Search { query } => {
            action_cmds::run_search(&query).await?;
            true
        }
        Commands::Serve { bind, port } => {
            let resolved = DeckforgeConfig::resolve(&overrides)?;
            let bind = bind.unwrap_or_else(|| resolved.server.bind.clone());
            let port = port.unwrap_or(resolved.server.port);
            let actions = action_cmds::build_actions(&resolved);
            serve_cmd::run_serve(actions, &bind, port).await?;
            true
        }
        command => {
            let resolved = DeckforgeConfig::resolve(&overrides)?;
            let actions = action_cmds::build_actions(&resolved);
            match command {
                Commands::Slides { file } => action_cmds::run_slides(&actions, &file).await?,
                Commands::Image { prompt, out } => {
                    action_cmds::run_image(&actions, &prompt, out.as_deref()).await?
                }
                Commands::Research { topic } => action_cmds::run_research(&actions, &topic).await?,
                Commands::Chat { query } => action_cmds::run_chat(&actions, &query).await?,
                Commands::Faq {
                    question,
                    context,
                    history,
                } => {
                    action_cmds::run_faq(&actions, &question, context.as_deref(), history.as_deref())
                        .await?
                }
                Commands::Init { .. } | Commands::Search { .. } | Commands::Serve { .. } => true,
            }
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
