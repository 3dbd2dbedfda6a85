use axum::{
    extract::{Query, Request},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::{
    api::middlewares::{with_tracing, RequestTracer},
    error::Error,
};

pub fn create_router(tracer: &RequestTracer) -> Router {
    Router::new().route("/", get(with_tracing(tracer.clone(), greet)))
}

#[derive(Debug, Deserialize)]
struct GreetingQuery {
    name: Option<String>,
    #[serde(default)]
    excited: bool,
}

async fn greet(req: Request) -> Result<String, Error> {
    let Query(query) = Query::<GreetingQuery>::try_from_uri(req.uri())?;
    let name = query.name.as_deref().unwrap_or("world");

    tracing::info!(%name, "Greeting");

    let mut greeting = format!("Hello, {name}!");
    if query.excited {
        greeting.push('!');
    }

    Ok(greeting)
}
