use clouddisk_protocol::BusinessFailure;

/// Coarse classification of a failure, shared by every engine error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network failure, timeout, cancellation or unexpected HTTP status.
    Transport,
    /// The server rejected the credentials.
    Auth,
    /// Local input rejected before any request was made.
    Validation,
    /// The server answered `success: false`.
    RemoteBusiness,
    /// Encryption or decryption failed.
    Crypto,
    /// The server answered with a payload this client cannot use.
    Protocol,
}

/// Errors from the clouddisk REST API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unauthorized, sign in again")]
    Auth,

    #[error("invalid auth token")]
    InvalidToken,

    #[error("{message}")]
    Business { code: String, message: String },

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Status { .. } | Self::Timeout | Self::Cancelled => {
                ErrorKind::Transport
            }
            Self::Auth | Self::InvalidToken => ErrorKind::Auth,
            Self::Business { .. } => ErrorKind::RemoteBusiness,
            Self::Protocol(_) | Self::Json(_) => ErrorKind::Protocol,
        }
    }

    /// Returns `true` for `success: false` answers.
    pub fn is_business(&self) -> bool {
        matches!(self, Self::Business { .. })
    }

    /// Maps a transport error, keeping timeouts distinct.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e)
        }
    }
}

impl From<BusinessFailure> for ApiError {
    fn from(f: BusinessFailure) -> Self {
        Self::Business {
            code: f.code,
            message: f.message,
        }
    }
}
