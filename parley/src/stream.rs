use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::{
    build_messages,
    config::Config,
    error::{InferenceError, RetrievalError},
    inference::ChunkStream,
    Inference, Message, Retriever, StreamChunk,
};

const CHANNEL_CAPACITY: usize = 32;

/// A chat-completion backend able to stream its reply.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<ChunkStream, InferenceError>;
}

/// A source of context for a conversation. An empty string means no context was found.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve(&self, messages: &[Message]) -> Result<String, RetrievalError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Shared, read-only handles used to answer chat requests.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    retriever: Option<Arc<dyn ContextRetriever>>,
    model: String,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            retriever: None,
            model: model.into(),
        }
    }

    #[must_use]
    pub fn with_retriever(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let orchestrator = Self::new(
            Arc::new(Inference::from_config(&config.inference)),
            config.chat_model.clone(),
        );

        match Retriever::from_config(config) {
            Some(retriever) => {
                info!("Using index {} for context", retriever.index_name());
                orchestrator.with_retriever(Arc::new(retriever))
            }
            None => {
                info!("No search index configured, context lookup disabled");
                orchestrator
            }
        }
    }

    #[must_use]
    pub fn has_retriever(&self) -> bool {
        self.retriever.is_some()
    }

    /// Builds the message list sent to the provider: a system prompt, then the conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the context lookup fails.
    pub async fn prepare(&self, messages: &[Message]) -> Result<Vec<Message>, RetrievalError> {
        let Some(retriever) = &self.retriever else {
            return Ok(build_messages(None, messages));
        };

        let context = retriever.retrieve(messages).await?;
        if context.is_empty() {
            info!("Unable to find relevant information in the index for the request");
        } else {
            debug!("Found {} bytes of context", context.len());
        }

        Ok(build_messages(Some(&context), messages))
    }

    /// Streams the reply to a conversation, one chunk per provider delta.
    ///
    /// A failure ends the stream with a single error chunk.
    pub fn chat(&self, messages: Vec<Message>) -> ReceiverStream<StreamChunk> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let orchestrator = self.clone();

        tokio::spawn(async move {
            if let Err(err) = orchestrator.produce(&messages, &tx).await {
                error!("Chat stream failed: {err}");
                let _ = tx.send(StreamChunk::error(&err.to_string())).await;
            }
        });

        ReceiverStream::new(rx)
    }

    async fn produce(
        &self,
        messages: &[Message],
        tx: &mpsc::Sender<StreamChunk>,
    ) -> Result<(), ChatError> {
        let prompt = self.prepare(messages).await?;
        let mut stream = self.provider.stream_chat(&self.model, &prompt).await?;

        while let Some(chunk) = stream.next().await {
            let Some(choice) = chunk?.choices.into_iter().next() else {
                continue;
            };

            let chunk = StreamChunk::new(choice.delta.content, choice.delta.role);
            if tx.send(chunk).await.is_err() {
                debug!("Client went away, dropping chat stream");
                return Ok(());
            }
        }

        Ok(())
    }
}
