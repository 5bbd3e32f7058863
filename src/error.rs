use std::fmt;

use thiserror::Error;

/// Why a lease can no longer be extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    /// Server answered the renewal with `renewable: false` or a zero lease.
    NotRenewable,
    /// Server refused the renewal (token revoked or unknown).
    Revoked,
    /// Lease ran out before a renewal went through.
    Expired,
    /// Too many consecutive renewal failures before expiry.
    RenewFailures,
}

impl ExhaustReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExhaustReason::NotRenewable => "not_renewable",
            ExhaustReason::Revoked => "revoked",
            ExhaustReason::Expired => "expired",
            ExhaustReason::RenewFailures => "renew_failures",
        }
    }
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure raised by an auth method while building its login request.
#[derive(Debug, Error)]
pub enum MethodError {
    #[error("credential file '{path}' could not be read: {source}")]
    CredentialFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("credential '{0}' is empty")]
    EmptyCredential(&'static str),

    #[error("{0}")]
    Other(String),
}

/// Everything that can go wrong between an auth method and the server.
///
/// None of these ever reach the caller of `AuthHandler::run`: the handler
/// logs them and retries with backoff.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server rejected request ({status}): {}", .errors.join("; "))]
    ServerRejection { status: u16, errors: Vec<String> },

    #[error("unwrap failed: {0}")]
    Unwrap(Box<AuthError>),

    #[error("auth method failed: {0}")]
    Method(#[from] MethodError),

    #[error("invalid server response: {0}")]
    Decode(String),
}

impl AuthError {
    /// HTTP status of a server rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::ServerRejection { status, .. } => Some(*status),
            AuthError::Unwrap(inner) => inner.status(),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Short label used for metrics and structured log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Transport(_) => "transport",
            AuthError::ServerRejection { status, .. } if *status == 429 => "rate_limited",
            AuthError::ServerRejection { status, .. } if *status >= 500 => "server_error",
            AuthError::ServerRejection { .. } => "rejected",
            AuthError::Unwrap(_) => "unwrap",
            AuthError::Method(_) => "method",
            AuthError::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Decode(err.to_string())
        } else {
            AuthError::Transport(err.to_string())
        }
    }
}
