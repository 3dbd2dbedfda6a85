use std::{error::Error as StdError, ops::Deref};

use axum::http::{Method, StatusCode};
use opentelemetry::trace::{TraceContextExt, TraceId};
use tracing::{field::Empty, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::trace_context::TraceContext;

/// Target of request spans. It is always enabled by the subscriber's filter so
/// that a quiet log level never suppresses the exported trace.
pub const SPAN_TARGET: &str = "otel::tracing";

/// Final status of a request span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    Ok(StatusCode),
    Error(StatusCode),
}

impl SpanStatus {
    /// Client and server error codes mark the span as failed.
    pub fn from_response(status: StatusCode) -> Self {
        if status.is_client_error() || status.is_server_error() {
            Self::Error(status)
        } else {
            Self::Ok(status)
        }
    }

    pub fn code(&self) -> StatusCode {
        match self {
            Self::Ok(code) | Self::Error(code) => *code,
        }
    }

    fn otel_status_code(&self) -> &'static str {
        match self {
            Self::Ok(_) => "OK",
            Self::Error(_) => "ERROR",
        }
    }
}

/// The server span of one request.
///
/// It is closed by [`RequestSpan::finish`], which consumes it, so a span can
/// only be finalized once. Dropping it unfinished (the request future was
/// cancelled) closes the span without a status.
#[derive(Debug)]
pub struct RequestSpan {
    span: Span,
    finished: bool,
}

impl RequestSpan {
    /// Starts the span for `method path`, as a child of `parent` when the
    /// caller propagated a trace and as a new root otherwise.
    pub fn start(method: &Method, path: &str, parent: Option<&TraceContext>) -> Self {
        let name = format!("{method} {path}");
        let span = tracing::info_span!(
            target: SPAN_TARGET,
            parent: None,
            "http_request",
            otel.name = name.as_str(),
            otel.kind = "server",
            otel.status_code = Empty,
            http.request.method = %method,
            url.path = %path,
            http.response.status_code = Empty,
            trace_id = Empty,
        );

        if let Some(parent) = parent {
            span.set_parent(parent.to_context());
        }

        let trace_id = span.context().span().span_context().trace_id();
        if trace_id != TraceId::INVALID {
            span.record("trace_id", tracing::field::display(trace_id));
        }

        Self {
            span,
            finished: false,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn handle(&self) -> TraceSpan {
        TraceSpan(self.span.clone())
    }

    /// Records the final status and closes the span.
    ///
    /// The span is exported once the handler has released every clone of it,
    /// which is the case once the handler future has completed.
    pub fn finish(mut self, status: SpanStatus) {
        self.span
            .record("otel.status_code", status.otel_status_code());
        self.span
            .record("http.response.status_code", i64::from(status.code().as_u16()));
        self.finished = true;
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                parent: &self.span,
                "Request was cancelled before completion, closing span without a status"
            );
        }
    }
}

/// Handle to the current request's span, available as a request extension.
#[derive(Debug, Clone)]
pub struct TraceSpan(Span);

impl TraceSpan {
    pub fn trace_id(&self) -> Option<TraceId> {
        let trace_id = self.0.context().span().span_context().trace_id();
        (trace_id != TraceId::INVALID).then_some(trace_id)
    }
}

impl Deref for TraceSpan {
    type Target = Span;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Reports `error` as an exception on the current span and logs it.
///
/// Inside a traced handler the current span is the request span, so nested
/// calls can report errors without being handed the span.
pub fn capture_exception(error: &(dyn StdError + 'static)) {
    tracing::error!(error = error, "{error}");
}
