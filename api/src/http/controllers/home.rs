use axum::response::Html;

#[allow(clippy::unused_async)]
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../../static/index.html"))
}
