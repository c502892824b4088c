use autoredirect_core::RedirectError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    Internal(String),
    #[error(transparent)]
    Redirect(#[from] RedirectError),
}

impl HttpError {
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
            Self::Redirect(
                RedirectError::TamperDetected
                | RedirectError::InvalidToken(_)
                | RedirectError::UnsupportedMethod(_),
            ) => 400,
            Self::Redirect(_) => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpServeError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),
    #[error("accept failed: {0}")]
    Accept(std::io::Error),
}
