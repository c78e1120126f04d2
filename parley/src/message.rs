use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single turn of a conversation, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub role: Option<String>,
}

/// One line of the chat stream sent back to the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub delta: Delta,
}

impl StreamChunk {
    pub const ERROR_ROLE: &'static str = "agent";

    pub const fn new(content: Option<String>, role: Option<String>) -> Self {
        Self {
            delta: Delta { content, role },
        }
    }

    /// Builds the chunk that terminates a failed stream.
    #[must_use]
    pub fn error(text: &str) -> Self {
        Self::new(
            Some(format!("<div class=\"error\">Error: {text}</div>")),
            Some(Self::ERROR_ROLE.to_string()),
        )
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.delta.role.as_deref() == Some(Self::ERROR_ROLE)
    }

    /// Serializes the chunk as a newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk cannot be serialized.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');

        Ok(line)
    }
}
