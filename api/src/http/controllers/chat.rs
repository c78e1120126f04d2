use axum::{body::StreamBody, extract::State, http::header, response::IntoResponse};
use axum_jsonschema::Json;
use parley::ChatRequest;
use tokio_stream::StreamExt;

use crate::axum::{
    errors::{ApiError, ApiResult},
    state::AppState,
};

#[allow(clippy::unused_async)]
pub async fn stream(
    State(state): State<AppState>,
    Json(ChatRequest { messages }): Json<ChatRequest>,
) -> ApiResult<impl IntoResponse> {
    if messages.is_empty() {
        return Err(ApiError::EmptyConversation);
    }

    let stream = state
        .orchestrator
        .chat(messages)
        .map(|chunk| chunk.to_line());

    Ok((
        [(header::CONTENT_TYPE, "text/event-stream")],
        StreamBody::new(stream),
    ))
}
