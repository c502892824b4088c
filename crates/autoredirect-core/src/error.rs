//! Error types for redirection token operations.

/// Errors arising while encoding, decoding, matching or resolving
/// redirection information.
#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    /// The envelope failed its integrity check or could not be decrypted.
    #[error("redirection information has been tampered with or is corrupt")]
    TamperDetected,

    /// The token is absent or structurally not a descriptor record.
    #[error("invalid redirection token: {0}")]
    InvalidToken(String),

    /// An exclusion rule has a shape the matcher does not understand.
    #[error("malformed exclusion rule: {0}")]
    MalformedExclusionRule(String),

    /// A method outside GET/POST/PUT/DELETE reached the resolver.
    #[error("unsupported redirection method: {0}")]
    UnsupportedMethod(String),

    /// The route collaborator could not produce a path.
    #[error("route resolution failed: {0}")]
    Route(String),

    /// Configuration is present but unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The descriptor record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RedirectError {
    /// Whether this error marks a security boundary violation rather than
    /// a missing or malformed value.
    pub fn is_tamper(&self) -> bool {
        matches!(self, Self::TamperDetected)
    }
}

pub type Result<T, E = RedirectError> = std::result::Result<T, E>;
