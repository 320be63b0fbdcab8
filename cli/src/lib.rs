//! Command-line driver for the personal assistant.
//!
//! Each subcommand maps onto one assistant operation and yields its JSON
//! response.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::debug;

use pai_retrieval::{Assistant, ChatRequest, MemoryRequest, RetrievalConfig};

/// Personal assistant with long-term knowledge and short-term memory.
#[derive(Debug, Parser)]
#[command(name = "pai", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
pub enum Command {
    /// Store content in the knowledge base.
    Store {
        content: String,

        #[arg(long)]
        category: Option<String>,
    },

    /// Search the knowledge base by similarity.
    Search {
        query: String,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<f32>,
    },

    /// Show a conversation or a knowledge category.
    Retrieve {
        #[arg(long, conflicts_with = "category")]
        session: Option<String>,

        #[arg(long)]
        category: Option<String>,
    },

    /// Send a chat message.
    Chat {
        message: String,

        /// Continue an existing session.
        #[arg(long)]
        session: Option<String>,

        /// Ground the reply in the knowledge base.
        #[arg(long)]
        knowledge: bool,
    },

    /// Remove expired conversation messages.
    Purge,
}

impl Cli {
    /// Resolve the configuration this invocation runs with.
    pub fn load_config(&self) -> Result<RetrievalConfig> {
        let mut config = match self.config {
            Some(ref path) => RetrievalConfig::load(path)?,
            None => RetrievalConfig::default(),
        };
        if let Some(ref data_dir) = self.data_dir {
            config.data_dir = data_dir.clone();
        }
        Ok(config)
    }
}

/// Run one command and return its JSON output.
pub async fn run(cli: Cli) -> Result<Value> {
    let config = cli.load_config()?;
    debug!("Using data directory {}", config.data_dir.display());

    let assistant = Assistant::new(config).await?;
    execute(&assistant, cli.command).await
}

/// Run `command` against an existing assistant.
pub async fn execute(assistant: &Assistant, command: Command) -> Result<Value> {
    let output = match command {
        Command::Store { content, category } => serde_json::to_value(
            assistant
                .handle(MemoryRequest::Store { content, category })
                .await?,
        )?,
        Command::Search {
            query,
            top_k,
            category,
            threshold,
        } => serde_json::to_value(
            assistant
                .handle(MemoryRequest::Search {
                    query,
                    top_k,
                    category,
                    threshold,
                })
                .await?,
        )?,
        Command::Retrieve { session, category } => serde_json::to_value(
            assistant
                .handle(MemoryRequest::Retrieve {
                    session_id: session,
                    category,
                })
                .await?,
        )?,
        Command::Chat {
            message,
            session,
            knowledge,
        } => {
            let mut request = ChatRequest::new(message).with_knowledge_base(knowledge);
            request.session_id = session;
            serde_json::to_value(assistant.chat(request).await?)?
        }
        Command::Purge => json!({ "purged": assistant.purge_expired().await? }),
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_search() {
        let cli = Cli::parse_from([
            "pai",
            "search",
            "green tea",
            "--top-k",
            "3",
            "--threshold",
            "0.25",
        ]);
        assert_eq!(
            cli.command,
            Command::Search {
                query: "green tea".to_string(),
                top_k: Some(3),
                category: None,
                threshold: Some(0.25),
            }
        );
    }

    #[test]
    fn test_parse_chat_with_global_options() {
        let cli = Cli::parse_from([
            "pai",
            "chat",
            "hello",
            "--knowledge",
            "--session",
            "s1",
            "--data-dir",
            "/tmp/pai",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/pai")));
        assert_eq!(
            cli.command,
            Command::Chat {
                message: "hello".to_string(),
                session: Some("s1".to_string()),
                knowledge: true,
            }
        );
    }

    #[test]
    fn test_retrieve_rejects_both_keys() {
        let result = Cli::try_parse_from(["pai", "retrieve", "--session", "s", "--category", "c"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_store_then_search() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().to_str().unwrap();

        let stored = run(Cli::parse_from([
            "pai",
            "--data-dir",
            data_dir,
            "store",
            "prefers window seats",
            "--category",
            "travel",
        ]))
        .await
        .unwrap();
        assert_eq!(stored["success"], json!(true));

        let found = run(Cli::parse_from([
            "pai",
            "--data-dir",
            data_dir,
            "search",
            "prefers window seats",
            "--threshold",
            "0.0",
        ]))
        .await
        .unwrap();
        assert_eq!(found["count"], json!(1));
        assert_eq!(found["results"][0]["category"], json!("travel"));

        let purged = run(Cli::parse_from(["pai", "--data-dir", data_dir, "purge"]))
            .await
            .unwrap();
        assert_eq!(purged, json!({ "purged": 0 }));
    }

    #[tokio::test]
    async fn test_validation_error_surfaces() {
        let temp_dir = TempDir::new().unwrap();
        let result = run(Cli::parse_from([
            "pai",
            "--data-dir",
            temp_dir.path().to_str().unwrap(),
            "retrieve",
        ]))
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Either sessionId or category is required");
    }
}
