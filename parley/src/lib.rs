#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod config;
pub mod error;
pub mod inference;
mod message;
mod parser;
mod prompt;
pub mod rag;
pub mod search;
pub mod stream;

pub use config::Config;
pub use inference::Inference;
pub use message::{ChatRequest, Delta, Message, Role, StreamChunk};
pub use parser::{extract_sentences, read_sentences, split_sentences};
pub use prompt::{build_messages, system_prompt, DEFAULT_SYSTEM_PROMPT};
pub use rag::Retriever;
pub use search::Search;
pub use stream::{ChatProvider, ContextRetriever, Orchestrator};
