use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
    slice::Chunks,
};
use tracing::{debug, info};

use crate::{
    config::{Config, RetrievalConfig},
    error::RetrievalError,
    parser::read_sentences,
    search::{IndexedDocument, Search, SearchHit},
    stream::ContextRetriever,
    Inference, Message, Role,
};

pub const CONTEXT_SEPARATOR: &str = "\n------\n";
pub const NEAREST_NEIGHBOURS: usize = 5;

/// Index dimensionality used when the embedding model's is not configured.
pub const DEFAULT_DIMENSIONS: usize = 100;

const EMBED_BATCH_SIZE: usize = 2000;

/// One line of an embeddings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub token: String,
    pub embedding: Vec<f32>,
}

/// Looks up context for a conversation in a vector index, and bootstraps that index.
#[derive(Debug, Clone)]
pub struct Retriever {
    inference: Inference,
    search: Search,
    index_name: String,
    model: String,
    dimensions: Option<usize>,
}

impl Retriever {
    #[must_use]
    pub fn new(inference: Inference, search: Search, config: &RetrievalConfig) -> Self {
        Self {
            inference,
            search,
            index_name: config.index_name.clone(),
            model: config.embedding.model.clone(),
            dimensions: config.embedding.dimensions,
        }
    }

    /// Builds a retriever when the configuration enables retrieval.
    #[must_use]
    pub fn from_config(config: &Config) -> Option<Self> {
        let retrieval = config.retrieval()?;

        Some(Self::new(
            Inference::from_config(&config.inference),
            Search::from_config(&retrieval.search),
            &retrieval,
        ))
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Finds the documents closest to the latest user message and joins their text.
    ///
    /// # Errors
    ///
    /// Returns an error if the Embeddings or Search API fails.
    pub async fn search(&self, messages: &[Message]) -> Result<String, RetrievalError> {
        let Some(question) = latest_user_message(messages) else {
            debug!("No user message to search for");
            return Ok(String::new());
        };

        let vector = self
            .inference
            .raw_embed(&self.model, self.dimensions, &question.content)
            .await?;

        let hits = self
            .search
            .index(&self.index_name)
            .query(vector, NEAREST_NEIGHBOURS)
            .await?;

        Ok(join_context(hits))
    }

    /// Creates the index unless it already exists. Returns whether it was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions conflict or the Search API fails.
    pub async fn ensure_index(&self, dimensions: Option<usize>) -> Result<bool, RetrievalError> {
        if self.search.index_exists(&self.index_name).await? {
            debug!("Index {} already exists", self.index_name);
            return Ok(false);
        }

        let dimensions = resolve_dimensions(self.dimensions, dimensions)?;
        self.search.create_index(&self.index_name, dimensions).await?;
        info!("Created index {} ({dimensions} dimensions)", self.index_name);

        Ok(true)
    }

    /// # Errors
    ///
    /// Returns an error if the Search API fails.
    pub async fn index_exists(&self) -> Result<bool, RetrievalError> {
        Ok(self.search.index_exists(&self.index_name).await?)
    }

    /// # Errors
    ///
    /// Returns an error if the index is missing or the Search API fails.
    pub async fn delete_index(&self) -> Result<(), RetrievalError> {
        self.require_index().await?;
        self.search.delete_index(&self.index_name).await?;
        info!("Deleted index {}", self.index_name);

        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the index is missing or the Search API fails.
    pub async fn is_index_empty(&self) -> Result<bool, RetrievalError> {
        self.require_index().await?;

        Ok(self.search.index(&self.index_name).count().await? == 0)
    }

    /// Uploads an embeddings file into the index. Returns the number of documents uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is missing, the file is invalid or the upload fails.
    pub async fn upload_documents(&self, embeddings_file: &Path) -> Result<usize, RetrievalError> {
        self.require_index().await?;

        let documents = to_documents(read_records(embeddings_file)?);

        self.search.index(&self.index_name).upload(&documents).await?;
        info!("Uploaded {} documents to {}", documents.len(), self.index_name);

        Ok(documents.len())
    }

    /// Embeds every sentence of the markdown files in `input_dir` into an embeddings file.
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be read or written or the Embeddings API fails.
    pub async fn build_embeddings_file(
        &self,
        input_dir: &Path,
        output_file: &Path,
    ) -> Result<usize, RetrievalError> {
        let sentences = read_sentences(input_dir)?;
        let mut records = Vec::with_capacity(sentences.len());

        for batch in embedding_batches(&sentences) {
            let embeddings = self
                .inference
                .embed(&self.model, self.dimensions, batch)
                .await?;

            records.extend(
                batch
                    .iter()
                    .zip(embeddings)
                    .map(|(token, embedding)| EmbeddingRecord {
                        token: token.clone(),
                        embedding,
                    }),
            );
            debug!("Embedded {}/{} sentences", records.len(), sentences.len());
        }

        write_records(output_file, &records)?;

        Ok(records.len())
    }

    async fn require_index(&self) -> Result<(), RetrievalError> {
        if self.search.index_exists(&self.index_name).await? {
            Ok(())
        } else {
            Err(RetrievalError::MissingIndex(self.index_name.clone()))
        }
    }
}

#[async_trait]
impl ContextRetriever for Retriever {
    async fn retrieve(&self, messages: &[Message]) -> Result<String, RetrievalError> {
        self.search(messages).await
    }
}

fn latest_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.role == Role::User)
}

fn join_context(hits: Vec<SearchHit>) -> String {
    hits.into_iter()
        .map(|hit| hit.token)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Numbers records in file order, starting at zero.
fn to_documents(records: Vec<EmbeddingRecord>) -> Vec<IndexedDocument> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| IndexedDocument {
            embed_id: i.to_string(),
            token: record.token,
            embedding: record.embedding,
        })
        .collect()
}

fn embedding_batches(sentences: &[String]) -> Chunks<'_, String> {
    sentences.chunks(EMBED_BATCH_SIZE)
}

/// Picks the index dimensionality from configuration and an explicit override.
///
/// # Errors
///
/// Returns an error when both are given and disagree.
pub fn resolve_dimensions(
    configured: Option<usize>,
    requested: Option<usize>,
) -> Result<usize, RetrievalError> {
    match (configured, requested) {
        (Some(configured), Some(requested)) if configured != requested => {
            Err(RetrievalError::DimensionMismatch {
                configured,
                requested,
            })
        }
        (Some(dimensions), _) | (None, Some(dimensions)) => Ok(dimensions),
        (None, None) => Ok(DEFAULT_DIMENSIONS),
    }
}

/// Reads an embeddings file, one JSON record per line.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is not a valid record.
pub fn read_records(path: &Path) -> Result<Vec<EmbeddingRecord>, RetrievalError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        records.push(
            serde_json::from_str(&line)
                .map_err(|source| RetrievalError::Record { line: i + 1, source })?,
        );
    }

    Ok(records)
}

/// Writes an embeddings file, one JSON record per line.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_records(path: &Path, records: &[EmbeddingRecord]) -> Result<(), RetrievalError> {
    let mut writer = BufWriter::new(File::create(path)?);

    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}
