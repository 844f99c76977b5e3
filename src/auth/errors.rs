/// Why a client could not be resolved. Only ever logged: every variant but `Store`
/// collapses to the same 401 at the token endpoint, `Store` is a 500.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionFailure {
    #[error("no credentials present in request")]
    CredentialsAbsent,
    #[error("client identifier is not a valid UUID")]
    InvalidIdentifier,
    #[error("client not found")]
    ClientNotFound,
    #[error("client secret mismatch")]
    SecretMismatch,
    #[error("client store unavailable: {0}")]
    Store(#[source] anyhow::Error),
}

impl ResolutionFailure {
    /// Short name for logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::CredentialsAbsent => "CredentialsAbsent",
            Self::InvalidIdentifier => "InvalidIdentifier",
            Self::ClientNotFound => "ClientNotFound",
            Self::SecretMismatch => "SecretMismatch",
            Self::Store(_) => "StoreUnavailable",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("failed to encode token: {0}")]
    Encoding(String),
}
