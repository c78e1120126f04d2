use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("couldn't parse provider payload: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("provider returned non-success status {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("provider failed mid-stream: {0}")]
    Stream(String),

    #[error("Safety issues were found in the response: {}", FilteredCategories(.0))]
    ContentFilter(Vec<FilteredCategory>),

    #[error("provider returned no embedding for input {0}")]
    MissingEmbedding(usize),
}

impl InferenceError {
    /// Classifies a non-success response from the inference endpoint.
    #[must_use]
    pub fn from_response(status: StatusCode, body: String) -> Self {
        content_filter(&body).unwrap_or(Self::Api { status, body })
    }

    /// Classifies an error payload received inside an event stream.
    #[must_use]
    pub fn from_stream_payload(data: &str) -> Self {
        content_filter(data).unwrap_or_else(|| Self::Stream(data.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("couldn't parse search payload: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("search service returned non-success status {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("unexpected document count: {0}")]
    InvalidCount(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error("invalid embeddings file at line {line}: {source}")]
    Record {
        line: usize,
        source: serde_json::Error,
    },

    #[error("embedding dimensions {requested} differ from the configured {configured}")]
    DimensionMismatch { configured: usize, requested: usize },

    #[error("index {0} does not exist")]
    MissingIndex(String),
}

/// A content-safety category the provider flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredCategory {
    pub name: String,
    pub severity: Option<String>,
}

impl fmt::Display for FilteredCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.severity {
            Some(severity) => write!(f, "{}, severity: {severity}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

struct FilteredCategories<'a>(&'a [FilteredCategory]);

impl fmt::Display for FilteredCategories<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, category) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{category}")?;
        }

        Ok(())
    }
}

fn content_filter(body: &str) -> Option<InferenceError> {
    let payload: Value = serde_json::from_str(body).ok()?;
    let error = payload.get("error")?;

    if error.get("code").and_then(Value::as_str) != Some("content_filter") {
        return None;
    }

    let categories = error
        .pointer("/innererror/content_filter_result")
        .and_then(filtered_categories);

    if categories.is_none() {
        warn!("Content filter rejection without category details, using raw error");
    }

    categories.map(InferenceError::ContentFilter)
}

/// Extracts the flagged categories from a `content_filter_result` object.
///
/// Returns `None` when the object is malformed or flags nothing.
#[must_use]
pub fn filtered_categories(result: &Value) -> Option<Vec<FilteredCategory>> {
    let categories = result
        .as_object()?
        .iter()
        .filter(|(_, verdict)| verdict.get("filtered").and_then(Value::as_bool) == Some(true))
        .map(|(name, verdict)| FilteredCategory {
            name: name.clone(),
            severity: verdict
                .get("severity")
                .and_then(Value::as_str)
                .map(ToString::to_string),
        })
        .collect::<Vec<_>>();

    (!categories.is_empty()).then_some(categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejection(result: &Value) -> String {
        json!({
            "error": {
                "code": "content_filter",
                "message": "The response was filtered due to the prompt triggering content management policy.",
                "status": 400,
                "innererror": {
                    "code": "ResponsibleAIPolicyViolation",
                    "content_filter_result": result
                }
            }
        })
        .to_string()
    }

    #[test]
    fn renders_filtered_categories() {
        let body = rejection(&json!({
            "hate": { "filtered": true, "severity": "medium" },
            "self_harm": { "filtered": false, "severity": "safe" },
            "jailbreak": { "filtered": true, "detected": true },
        }));

        let err = InferenceError::from_response(StatusCode::BAD_REQUEST, body);

        assert_eq!(
            err.to_string(),
            "Safety issues were found in the response: hate, severity: medium, jailbreak"
        );
    }

    #[test]
    fn falls_back_to_raw_text_without_details() {
        let body = rejection(&json!("unavailable"));
        let err = InferenceError::from_response(StatusCode::BAD_REQUEST, body.clone());

        assert!(matches!(err, InferenceError::Api { .. }));
        assert!(err.to_string().contains(&body));
    }

    #[test]
    fn other_errors_are_kept_verbatim() {
        let body = json!({ "error": { "code": "429", "message": "Rate limit exceeded" } }).to_string();
        let err = InferenceError::from_response(StatusCode::TOO_MANY_REQUESTS, body);

        assert!(matches!(
            err,
            InferenceError::Api { status, .. } if status == StatusCode::TOO_MANY_REQUESTS
        ));
    }

    #[test]
    fn classifies_stream_payloads() {
        let body = rejection(&json!({ "violence": { "filtered": true, "severity": "high" } }));

        assert_eq!(
            InferenceError::from_stream_payload(&body).to_string(),
            "Safety issues were found in the response: violence, severity: high"
        );
        assert!(matches!(
            InferenceError::from_stream_payload("{\"error\":{\"message\":\"overloaded\"}}"),
            InferenceError::Stream(_)
        ));
    }
}
