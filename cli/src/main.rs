#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use futures::StreamExt;
use std::{
    env,
    io::{self, Write},
    path::PathBuf,
};
use tracing::info;
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use ::parley::{Config, Message, Orchestrator, Retriever};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Embed every sentence of the markdown files in a directory into an embeddings file.
    Build { input_dir: PathBuf, output: PathBuf },
    /// Create the search index if it does not exist.
    CreateIndex {
        #[arg(long)]
        dimensions: Option<usize>,
    },
    /// Upload an embeddings file into the search index.
    Upload { file: PathBuf },
    /// Create the index and upload an embeddings file, unless the index already has documents.
    Bootstrap {
        file: PathBuf,
        #[arg(long)]
        dimensions: Option<usize>,
    },
    /// Delete the search index and all of its documents.
    DeleteIndex,
    /// Print the context found for a question.
    Query { query: String },
    /// Stream an answer to a question.
    Ask { query: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    if env::var("RUNNING_IN_PRODUCTION").is_err() {
        dotenv().ok();
    }
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "cli=info,parley=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    match cli.command {
        Commands::Build { input_dir, output } => {
            let count = retriever(&config)?
                .build_embeddings_file(&input_dir, &output)
                .await?;

            info!("Wrote {count} embeddings to {}", output.display());
        }
        Commands::CreateIndex { dimensions } => {
            let retriever = retriever(&config)?;
            if !retriever.ensure_index(dimensions).await? {
                info!("Index {} already exists", retriever.index_name());
            }
        }
        Commands::Upload { file } => {
            retriever(&config)?.upload_documents(&file).await?;
        }
        Commands::Bootstrap { file, dimensions } => {
            let retriever = retriever(&config)?;
            retriever.ensure_index(dimensions).await?;

            if retriever.is_index_empty().await? {
                retriever.upload_documents(&file).await?;
            } else {
                info!("Index {} already has documents, skipping upload", retriever.index_name());
            }
        }
        Commands::DeleteIndex => {
            retriever(&config)?.delete_index().await?;
        }
        Commands::Query { query } => {
            let context = retriever(&config)?.search(&[Message::user(query)]).await?;

            if context.is_empty() {
                println!("No matching documents.");
            } else {
                println!("{context}");
            }
        }
        Commands::Ask { query } => {
            let mut stream = Orchestrator::from_config(&config).chat(vec![Message::user(query)]);
            let mut stdout = io::stdout();

            while let Some(chunk) = stream.next().await {
                if chunk.is_error() {
                    println!();
                    bail!(chunk.delta.content.unwrap_or_default());
                }

                if let Some(content) = chunk.delta.content {
                    write!(stdout, "{content}")?;
                    stdout.flush()?;
                }
            }
            println!();
        }
    }

    Ok(())
}

fn retriever(config: &Config) -> Result<Retriever> {
    Retriever::from_config(config).context(
        "Search is not configured: set $AZURE_AI_SEARCH_ENDPOINT, $AZURE_AI_SEARCH_API_KEY, \
         $AZURE_AI_SEARCH_INDEX_NAME and $AZURE_AI_EMBED_DEPLOYMENT_NAME",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn every_command_has_help() {
        let cli = Cli::command();
        cli.clone().debug_assert();

        for command in cli.get_subcommands() {
            assert!(
                command.get_about().is_some(),
                "{} has no help text",
                command.get_name()
            );
        }
    }
}
