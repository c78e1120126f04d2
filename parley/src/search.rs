use futures::future::try_join_all;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{config::SearchConfig, error::SearchError};

const API_VERSION: &str = "2023-11-01";
const UPLOAD_BATCH_SIZE: usize = 1000;

pub const KEY_FIELD: &str = "embedId";
pub const VECTOR_FIELD: &str = "embedding";
pub const TEXT_FIELD: &str = "token";

const VECTOR_PROFILE: &str = "embedding_config";
const VECTOR_ALGORITHM: &str = "embed-algorithms-config";

/// Client for an AI Search service.
#[derive(Debug, Clone)]
pub struct Search {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Search {
    #[must_use]
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(&config.endpoint, &config.api_key)
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/indexes/{name}?api-version={API_VERSION}", self.base_url)
    }

    /// Checks whether an index exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the Search API returns anything but success or not found.
    pub async fn index_exists(&self, name: &str) -> Result<bool, SearchError> {
        let response = self
            .client
            .get(self.index_url(name))
            .header("api-key", &self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        check(response).await?;
        Ok(true)
    }

    /// Creates a vector index with a key, an HNSW-searchable embedding and a text field.
    ///
    /// # Errors
    ///
    /// Returns an error if the Search API returns an error.
    pub async fn create_index(&self, name: &str, dimensions: usize) -> Result<(), SearchError> {
        let response = self
            .client
            .put(self.index_url(name))
            .header("api-key", &self.api_key)
            .json(&index_definition(name, dimensions))
            .send()
            .await?;

        check(response).await?;
        debug!("Created index {name} with {dimensions} dimensions");

        Ok(())
    }

    /// Deletes an index and all of its documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the Search API returns an error.
    pub async fn delete_index(&self, name: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(self.index_url(name))
            .header("api-key", &self.api_key)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Index {
        Index::new(
            self.client.clone(),
            format!("{}/indexes/{name}/docs", self.base_url),
            self.api_key.clone(),
        )
    }
}

/// A document as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(rename = "embedId")]
    pub embed_id: String,
    pub token: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "@search.score", default)]
    pub score: f64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<SearchHit>,
}

#[derive(Serialize)]
struct UploadAction<'a> {
    #[serde(rename = "@search.action")]
    action: &'static str,
    #[serde(flatten)]
    document: &'a IndexedDocument,
}

pub struct Index {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Index {
    pub const fn new(client: Client, url: String, api_key: String) -> Self {
        Self {
            client,
            base_url: url,
            api_key,
        }
    }

    fn url(&self, operation: &str) -> String {
        format!("{}{operation}?api-version={API_VERSION}", self.base_url)
    }

    /// Counts the documents in the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the Search API fails or returns a malformed count.
    pub async fn count(&self) -> Result<u64, SearchError> {
        let response = self
            .client
            .get(self.url("/$count"))
            .header("api-key", &self.api_key)
            .send()
            .await?;

        let body = check(response).await?.text().await?;
        let count = body.trim_start_matches('\u{feff}').trim();

        count
            .parse()
            .map_err(|_| SearchError::InvalidCount(count.to_string()))
    }

    /// Uploads documents in batches.
    ///
    /// # Errors
    ///
    /// Returns an error if any batch is rejected.
    pub async fn upload(&self, documents: &[IndexedDocument]) -> Result<(), SearchError> {
        try_join_all(upload_batches(documents).map(|batch| async move {
            let response = self
                .client
                .post(self.url("/index"))
                .header("api-key", &self.api_key)
                .json(&batch)
                .send()
                .await?;

            check(response).await.map(drop)
        }))
        .await?;

        debug!("Uploaded {} documents", documents.len());

        Ok(())
    }

    /// Runs a k-nearest-neighbour query against the embedding field.
    ///
    /// # Errors
    ///
    /// Returns an error if the Search API returns an error.
    pub async fn query(&self, vector: Vec<f32>, count: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .post(self.url("/search"))
            .header("api-key", &self.api_key)
            .json(&vector_query(vector, count))
            .send()
            .await?;

        let results: SearchResponse = check(response).await?.json().await?;

        Ok(results.value)
    }
}

async fn check(response: Response) -> Result<Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SearchError::Api { status, body })
}

fn upload_batches(documents: &[IndexedDocument]) -> impl Iterator<Item = Value> + '_ {
    documents.chunks(UPLOAD_BATCH_SIZE).map(|chunk| {
        let actions = chunk
            .iter()
            .map(|document| UploadAction {
                action: "upload",
                document,
            })
            .collect::<Vec<_>>();

        json!({ "value": actions })
    })
}

fn index_definition(name: &str, dimensions: usize) -> Value {
    json!({
        "name": name,
        "fields": [
            {
                "name": KEY_FIELD,
                "type": "Edm.String",
                "key": true,
                "filterable": true,
            },
            {
                "name": VECTOR_FIELD,
                "type": "Collection(Edm.Single)",
                "searchable": true,
                "retrievable": true,
                "dimensions": dimensions,
                "vectorSearchProfile": VECTOR_PROFILE,
            },
            {
                "name": TEXT_FIELD,
                "type": "Edm.String",
                "searchable": false,
                "retrievable": true,
            },
        ],
        "vectorSearch": {
            "algorithms": [{ "name": VECTOR_ALGORITHM, "kind": "hnsw" }],
            "profiles": [{ "name": VECTOR_PROFILE, "algorithm": VECTOR_ALGORITHM }],
        },
    })
}

fn vector_query(vector: Vec<f32>, count: usize) -> Value {
    json!({
        "select": TEXT_FIELD,
        "vectorQueries": [{
            "kind": "vector",
            "vector": vector,
            "k": count,
            "fields": VECTOR_FIELD,
        }],
    })
}
