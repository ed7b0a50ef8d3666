use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle of a local resumable upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Initialized,
    Uploading,
    Completing,
    Complete,
    Failed,
}

/// Encryption sidecar uploaded next to a client-encrypted file.
///
/// Immutable once produced. Salt and IV are Base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    pub algorithm: String,
    pub key_derivation: String,
    pub salt: String,
    pub iv: String,
    pub iterations: u32,
    #[serde(default)]
    pub convergent: bool,
    pub original_size: u64,
    pub encrypted_size: u64,
    pub original_hash: String,
}

/// Kind of change announced on the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncEventType {
    Upload,
    QuickUpload,
    EncryptedUpload,
    Delete,
    Mkdir,
    DeltaUpdate,
    /// Any type this client does not act on.
    Unknown(String),
}

impl SyncEventType {
    /// Wire name of the event type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Upload => "upload",
            Self::QuickUpload => "quick-upload",
            Self::EncryptedUpload => "encrypted-upload",
            Self::Delete => "delete",
            Self::Mkdir => "mkdir",
            Self::DeltaUpdate => "delta-update",
            Self::Unknown(s) => s,
        }
    }

    /// Returns `true` for events that change the remote listing.
    pub fn triggers_refresh(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<&str> for SyncEventType {
    fn from(s: &str) -> Self {
        match s {
            "upload" => Self::Upload,
            "quick-upload" => Self::QuickUpload,
            "encrypted-upload" => Self::EncryptedUpload,
            "delete" => Self::Delete,
            "mkdir" => Self::Mkdir,
            "delta-update" => Self::DeltaUpdate,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl Serialize for SyncEventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SyncEventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// A change notification pushed by the server. Consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub event_type: SyncEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
