use async_fn_stream::try_fn_stream;
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{config::InferenceConfig, error::InferenceError, stream::ChatProvider, Message};

const API_VERSION: &str = "2024-05-01-preview";
const DONE_MARKER: &str = "[DONE]";

pub type ChunkStream = BoxStream<'static, Result<ChatCompletionChunk, InferenceError>>;

/// Client for the model inference endpoint of an AI project.
#[derive(Debug, Clone)]
pub struct Inference {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

impl Inference {
    #[must_use]
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    #[must_use]
    pub fn from_config(config: &InferenceConfig) -> Self {
        Self::new(&config.endpoint, &config.api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}?api-version={API_VERSION}", self.endpoint)
    }

    /// Embeds a batch of texts, returning one vector per input in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the Embeddings API fails or omits an input.
    pub async fn embed(
        &self,
        model: &str,
        dimensions: Option<usize>,
        input: &[String],
    ) -> Result<Vec<Vec<f32>>, InferenceError> {
        let response = self
            .client
            .post(self.url("embeddings"))
            .header("api-key", &self.api_key)
            .json(&EmbeddingRequest {
                model,
                input,
                dimensions,
            })
            .send()
            .await?;

        let response: EmbeddingResponse = check(response).await?.json().await?;
        let mut embeddings = vec![None; input.len()];
        for data in response.data {
            if let Some(slot) = embeddings.get_mut(data.index) {
                *slot = Some(data.embedding);
            }
        }

        embeddings
            .into_iter()
            .enumerate()
            .map(|(i, embedding)| embedding.ok_or(InferenceError::MissingEmbedding(i)))
            .collect()
    }

    /// Embeds a single string.
    ///
    /// # Errors
    ///
    /// Returns an error if the Embeddings API fails.
    pub async fn raw_embed(
        &self,
        model: &str,
        dimensions: Option<usize>,
        text: &str,
    ) -> Result<Vec<f32>, InferenceError> {
        let mut embeddings = self
            .embed(model, dimensions, &[text.to_string()])
            .await?;

        embeddings.pop().ok_or(InferenceError::MissingEmbedding(0))
    }

    /// Starts a streaming chat completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or is rejected before streaming starts.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<ChunkStream, InferenceError> {
        let response = self
            .client
            .post(self.url("chat/completions"))
            .header("api-key", &self.api_key)
            .json(&ChatCompletionRequest {
                model,
                messages,
                stream: true,
            })
            .send()
            .await?;

        let mut bytes = check(response).await?.bytes_stream();

        Ok(try_fn_stream(|emitter| async move {
            let mut decoder = EventDecoder::default();

            while let Some(chunk) = bytes.next().await {
                for data in decoder.feed(&chunk?)? {
                    if data == DONE_MARKER {
                        return Ok(());
                    }
                    emitter.emit(parse_chunk(&data)?).await;
                }
            }

            for data in decoder.finish()? {
                if data != DONE_MARKER {
                    emitter.emit(parse_chunk(&data)?).await;
                }
            }

            debug!("Chat stream closed without a done marker");
            Ok::<(), InferenceError>(())
        })
        .boxed())
    }
}

#[async_trait]
impl ChatProvider for Inference {
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<ChunkStream, InferenceError> {
        self.chat_stream(model, messages).await
    }
}

async fn check(response: Response) -> Result<Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(InferenceError::from_response(status, body))
}

fn parse_chunk(data: &str) -> Result<ChatCompletionChunk, InferenceError> {
    let payload: Value = serde_json::from_str(data)?;
    if payload.get("error").is_some() {
        return Err(InferenceError::from_stream_payload(data));
    }

    Ok(serde_json::from_value(payload)?)
}

/// Incremental decoder for `text/event-stream` bodies, yielding `data` payloads.
#[derive(Debug, Default)]
struct EventDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl EventDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, InferenceError> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<u8>>();
            self.push_line(&line, &mut events)?;
        }

        Ok(events)
    }

    fn finish(&mut self) -> Result<Vec<String>, InferenceError> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.buffer);

        self.push_line(&rest, &mut events)?;
        if !self.data.is_empty() {
            events.push(self.data.join("\n"));
            self.data.clear();
        }

        Ok(events)
    }

    fn push_line(&mut self, line: &[u8], events: &mut Vec<String>) -> Result<(), InferenceError> {
        let line = std::str::from_utf8(line)
            .map_err(|e| InferenceError::Stream(e.to_string()))?
            .trim_end_matches(['\n', '\r']);

        if line.is_empty() {
            if !self.data.is_empty() {
                events.push(self.data.join("\n"));
                self.data.clear();
            }
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_split_across_reads() {
        let mut decoder = EventDecoder::default();

        assert!(decoder.feed(b"data: {\"choices\"").unwrap().is_empty());
        assert_eq!(
            decoder.feed(b":[]}\r\n\r\n: keep-alive\n\ndata: [DONE]\n\n").unwrap(),
            vec!["{\"choices\":[]}".to_string(), "[DONE]".to_string()]
        );
    }

    #[test]
    fn flushes_trailing_event() {
        let mut decoder = EventDecoder::default();

        assert!(decoder.feed(b"data: {}").unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap(), vec!["{}".to_string()]);
    }

    #[test]
    fn keeps_multibyte_characters_split_across_reads() {
        let mut decoder = EventDecoder::default();
        let line = "data: ¡hola!\n\n".as_bytes();

        assert!(decoder.feed(&line[..7]).unwrap().is_empty());
        assert_eq!(decoder.feed(&line[7..]).unwrap(), vec!["¡hola!".to_string()]);
    }

    #[test]
    fn parses_role_only_chunks() {
        let chunk = parse_chunk(
            r#"{"id":"1","choices":[{"index":0,"delta":{"role":"assistant"},"finish_reason":null}]}"#,
        )
        .unwrap();

        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(chunk.choices[0].delta.content, None);
    }

    #[test]
    fn prompt_filter_chunks_have_no_choices() {
        let chunk = parse_chunk(r#"{"choices":[],"prompt_filter_results":[{"prompt_index":0}]}"#)
            .unwrap();

        assert!(chunk.choices.is_empty());
    }

    #[test]
    fn error_payloads_fail_the_stream() {
        let err = parse_chunk(r#"{"error":{"code":"server_error","message":"overloaded"}}"#)
            .unwrap_err();

        assert!(matches!(err, InferenceError::Stream(_)));
    }
}
