use axum::{http::StatusCode, routing::get, Router};

pub fn create_router() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> StatusCode {
    StatusCode::NO_CONTENT
}
