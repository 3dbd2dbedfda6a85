mod with_tracing;

pub use with_tracing::{with_tracing, RequestTracer, DEFAULT_FLUSH_TIMEOUT};
