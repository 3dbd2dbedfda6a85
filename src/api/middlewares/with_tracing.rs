use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_lite::{future::Boxed, FutureExt};
use tracing::Instrument;

use crate::{
    error::{HandlerPanic, HttpError},
    telemetry::{
        capture_exception,
        flush::{flush_with_timeout, Flush},
        RequestSpan, SpanStatus, TraceContext,
    },
};

pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(1000);

/// Per-process state of the tracing middleware: the telemetry backend to
/// flush after each request and how long a flush may take.
#[derive(Clone)]
pub struct RequestTracer {
    flusher: Arc<dyn Flush>,
    flush_timeout: Duration,
}

impl RequestTracer {
    pub fn new(flusher: Arc<dyn Flush>, flush_timeout: Duration) -> Self {
        Self {
            flusher,
            flush_timeout,
        }
    }

    pub fn flush_timeout(&self) -> Duration {
        self.flush_timeout
    }

    /// Runs `handler` for `req` inside a new request span.
    ///
    /// Handler errors and panics are reported on the span and turned into a
    /// plain-text error response, so this always yields a response. The span
    /// is finalized and telemetry flushed before the response is returned.
    pub async fn trace<H, Fut, T, E>(&self, mut req: Request, handler: H) -> Response
    where
        H: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send,
        T: IntoResponse + Send,
        E: HttpError,
    {
        let parent = TraceContext::from_headers(req.headers());
        let span = RequestSpan::start(req.method(), req.uri().path(), parent.as_ref());
        req.extensions_mut().insert(span.handle());

        let outcome = AssertUnwindSafe(handler(req).instrument(span.span().clone()))
            .catch_unwind()
            .await;

        let (response, status) = match outcome {
            Ok(Ok(value)) => {
                let response = value.into_response();
                let status = SpanStatus::from_response(response.status());
                (response, status)
            }
            Ok(Err(error)) => {
                let response = span.span().in_scope(|| error_response(&error));
                let status = SpanStatus::Error(response.status());
                (response, status)
            }
            Err(payload) => {
                let response = span
                    .span()
                    .in_scope(|| error_response(&HandlerPanic::from_payload(payload)));
                let status = SpanStatus::Error(response.status());
                (response, status)
            }
        };

        span.finish(status);

        if let Err(error) = flush_with_timeout(self.flusher.clone(), self.flush_timeout).await {
            tracing::warn!(%error, "Failed to flush telemetry");
        }

        response
    }
}

fn error_response<E: HttpError>(error: &E) -> Response {
    let status = error
        .status_code()
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    capture_exception(error);

    (status, error.to_string()).into_response()
}

/// Wraps `handler` so that every request it serves is traced by `tracer`.
///
/// The returned closure is itself an axum handler:
///
/// ```ignore
/// Router::new().route("/", get(with_tracing(tracer, greet)))
/// ```
pub fn with_tracing<H, Fut, T, E>(
    tracer: RequestTracer,
    handler: H,
) -> impl Fn(Request) -> Boxed<Response> + Clone + Send + Sync + 'static
where
    H: FnOnce(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: IntoResponse + Send + 'static,
    E: HttpError,
{
    move |req: Request| {
        let tracer = tracer.clone();
        let handler = handler.clone();
        async move { tracer.trace(req, handler).await }.boxed()
    }
}

impl HandlerPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "Handler panicked".to_string());

        Self::new(message)
    }
}
