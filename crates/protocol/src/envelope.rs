use serde::{Deserialize, Serialize};

/// Business-level failure reported by the server (`success: false`).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct BusinessFailure {
    pub code: String,
    pub message: String,
}

/// Envelope wrapping every JSON response of the REST API.
///
/// `data` is absent on failures and on endpoints that return nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Splits the envelope into its payload or the server-supplied failure.
    pub fn into_result(self) -> Result<Option<T>, BusinessFailure> {
        if self.success {
            return Ok(self.data);
        }
        Err(BusinessFailure {
            code: self.code.unwrap_or_else(|| "UNKNOWN".into()),
            message: self
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "request failed".into()),
        })
    }
}
