//! Inbound distributed-trace context.
//!
//! Upstream services link their trace to ours through the `sentry-trace`
//! header (`<trace id>-<span id>[-<sampled>]`). The W3C `traceparent` header
//! is honoured as a fallback so OpenTelemetry-native callers are linked too.

use std::{fmt, str::FromStr};

use axum::http::HeaderMap;
use opentelemetry::{
    propagation::{Extractor, TextMapPropagator},
    trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
    Context,
};
use opentelemetry_sdk::propagation::TraceContextPropagator;

pub const SENTRY_TRACE_HEADER: &str = "sentry-trace";
pub const TRACEPARENT_HEADER: &str = "traceparent";

const TRACE_ID_LEN: usize = 32;
const SPAN_ID_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub parent_span_id: SpanId,
    /// `None` is treated as sampled, like an explicit `1`.
    pub sampled: Option<bool>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseTraceContextError {
    #[error("expected `<trace id>-<span id>[-<sampled>]`, got {0} segments")]
    Segments(usize),
    #[error("trace id must be 32 lowercase hex digits and not all zeros")]
    TraceId,
    #[error("span id must be 16 lowercase hex digits and not all zeros")]
    SpanId,
    #[error("sampled flag must be `0` or `1`, got `{0}`")]
    Sampled(String),
}

impl TraceContext {
    /// Reads the parent trace from request headers, preferring `sentry-trace`.
    ///
    /// Malformed headers are ignored: the request then starts a new root trace.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        if let Some(value) = headers.get(SENTRY_TRACE_HEADER) {
            match value.to_str().map(str::parse::<TraceContext>) {
                Ok(Ok(context)) => return Some(context),
                Ok(Err(error)) => {
                    tracing::debug!(%error, "Ignoring malformed {SENTRY_TRACE_HEADER} header")
                }
                Err(_) => tracing::debug!("Ignoring non-ASCII {SENTRY_TRACE_HEADER} header"),
            }
        }

        Self::from_traceparent(headers)
    }

    fn from_traceparent(headers: &HeaderMap) -> Option<Self> {
        if !headers.contains_key(TRACEPARENT_HEADER) {
            return None;
        }

        let context = TraceContextPropagator::new().extract(&HeaderExtractor(headers));
        let span = context.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            tracing::debug!("Ignoring malformed {TRACEPARENT_HEADER} header");
            return None;
        }

        Some(Self {
            trace_id: span_context.trace_id(),
            parent_span_id: span_context.span_id(),
            sampled: Some(span_context.is_sampled()),
        })
    }

    pub fn span_context(&self) -> SpanContext {
        let flags = match self.sampled {
            Some(false) => TraceFlags::default(),
            _ => TraceFlags::SAMPLED,
        };

        SpanContext::new(
            self.trace_id,
            self.parent_span_id,
            flags,
            true,
            TraceState::default(),
        )
    }

    /// An OpenTelemetry context whose remote span is the upstream parent.
    pub fn to_context(&self) -> Context {
        Context::new().with_remote_span_context(self.span_context())
    }
}

impl FromStr for TraceContext {
    type Err = ParseTraceContextError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = value.trim().split('-').collect();
        let (trace_id, span_id, sampled) = match segments.as_slice() {
            [trace_id, span_id] => (*trace_id, *span_id, None),
            [trace_id, span_id, sampled] => (*trace_id, *span_id, Some(*sampled)),
            other => return Err(ParseTraceContextError::Segments(other.len())),
        };

        let trace_id = Some(trace_id)
            .filter(|id| is_lower_hex(id, TRACE_ID_LEN))
            .and_then(|id| TraceId::from_hex(id).ok())
            .filter(|id| *id != TraceId::INVALID)
            .ok_or(ParseTraceContextError::TraceId)?;
        let parent_span_id = Some(span_id)
            .filter(|id| is_lower_hex(id, SPAN_ID_LEN))
            .and_then(|id| SpanId::from_hex(id).ok())
            .filter(|id| *id != SpanId::INVALID)
            .ok_or(ParseTraceContextError::SpanId)?;
        let sampled = match sampled {
            None => None,
            Some("1") => Some(true),
            Some("0") => Some(false),
            Some(other) => return Err(ParseTraceContextError::Sampled(other.to_string())),
        };

        Ok(Self {
            trace_id,
            parent_span_id,
            sampled,
        })
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.trace_id, self.parent_span_id)?;
        match self.sampled {
            Some(true) => write!(f, "-1"),
            Some(false) => write!(f, "-0"),
            None => Ok(()),
        }
    }
}

fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}
