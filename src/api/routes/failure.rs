use axum::{extract::Request, routing::get, Router};

use crate::{
    api::middlewares::{with_tracing, RequestTracer},
    error::Error,
};

pub fn create_router(tracer: &RequestTracer) -> Router {
    Router::new().route("/error", get(with_tracing(tracer.clone(), fail)))
}

/// Always fails, to exercise error reporting end to end.
async fn fail(_req: Request) -> Result<(), Error> {
    Err(Error::Internal(
        "Something has gone terribly wrong!".to_string(),
    ))
}
