use axum::http::StatusCode;
use axum_derive_error::ErrorResponse;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, ErrorResponse)]
pub enum ApiError {
    #[error("At least one message is required.")]
    #[status(StatusCode::BAD_REQUEST)]
    EmptyConversation,
}
