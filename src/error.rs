use axum::{extract::rejection::QueryRejection, http::StatusCode};

/// An error a traced handler can fail with.
///
/// When no status code is carried the failure is answered with a 500.
pub trait HttpError: std::error::Error + Send + Sync + 'static {
    fn status_code(&self) -> Option<StatusCode>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    InvalidQuery(#[from] QueryRejection),
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl HttpError for Error {
    fn status_code(&self) -> Option<StatusCode> {
        match self {
            Error::InvalidQuery(rejection) => Some(rejection.status()),
            Error::Internal(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            Error::Unknown(_) => None,
        }
    }
}

/// A handler that panicked instead of returning an error.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerPanic {
    message: String,
}

impl HandlerPanic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl HttpError for HandlerPanic {
    fn status_code(&self) -> Option<StatusCode> {
        None
    }
}
