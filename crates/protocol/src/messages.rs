use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::EncryptionMetadata;

// ---------------------------------------------------------------------------
// Quick upload
// ---------------------------------------------------------------------------

/// `POST /files/quick-check`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickCheckRequest {
    pub hash: String,
}

/// Response to quick-check and convergent-check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickCheckResponse {
    #[serde(default)]
    pub can_quick_upload: bool,
}

/// `POST /files/quick-upload`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickUploadRequest {
    pub hash: String,
    pub file_name: String,
    pub path: String,
}

/// `POST /files/convergent-check`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergentCheckRequest {
    pub original_hash: String,
}

// ---------------------------------------------------------------------------
// Resumable upload
// ---------------------------------------------------------------------------

/// `POST /files/resumable/init`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumableInitRequest {
    pub file_name: String,
    pub path: String,
    pub file_size: u64,
}

/// Server view of a resumable upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default)]
    pub uploaded_chunks: u32,
    /// `ACTIVE`, `COMPLETED` or `EXPIRED`.
    #[serde(default)]
    pub status: String,
}

impl UploadSessionInfo {
    /// Returns `true` if the server has not finished this session.
    pub fn is_unfinished(&self) -> bool {
        self.status != "COMPLETED"
    }
}

// ---------------------------------------------------------------------------
// Delta sync
// ---------------------------------------------------------------------------

/// One remote chunk signature from `GET /files/{id}/signatures`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSignature {
    pub chunk_index: u32,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// `POST /files/{id}/delta`
///
/// Keys are chunk indices rendered as strings; JSON objects cannot carry
/// numeric keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaRequest {
    /// Index → Base64 bytes of chunks the server does not hold.
    pub delta_chunks: BTreeMap<String, String>,
    /// Index → hex hash of every chunk of the new version.
    pub chunk_hashes: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// File metadata returned by upload endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub version: u32,
}

/// `GET /files/{id}/encryption`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionEnvelope {
    pub file_id: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub client_encrypted: bool,
    #[serde(flatten)]
    pub metadata: Option<EncryptionMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_upload_request_uses_camel_case() {
        let req = QuickUploadRequest {
            hash: "ab".into(),
            file_name: "a.txt".into(),
            path: "/docs".into(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["fileName"], "a.txt");
        assert_eq!(v["path"], "/docs");
    }

    #[test]
    fn signature_parses_server_shape() {
        let json = r#"[{"chunkIndex":0,"hash":"aa","size":4194304,"offset":0},{"chunkIndex":1,"hash":"bb"}]"#;
        let sigs: Vec<ChunkSignature> = serde_json::from_str(json).unwrap();
        assert_eq!(sigs.len(), 2);
        assert_eq!(sigs[0].size, Some(4_194_304));
        assert_eq!(sigs[1].chunk_index, 1);
        assert!(sigs[1].offset.is_none());
    }

    #[test]
    fn delta_request_string_keys() {
        let mut req = DeltaRequest::default();
        req.delta_chunks.insert("2".into(), "AQID".into());
        req.chunk_hashes.insert("0".into(), "h0".into());
        req.chunk_hashes.insert("2".into(), "h2".into());
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(
            json,
            r#"{"deltaChunks":{"2":"AQID"},"chunkHashes":{"0":"h0","2":"h2"}}"#
        );
    }

    #[test]
    fn session_info_unfinished() {
        let json = r#"{"sessionId":"s1","fileName":"big.iso","fileSize":10,"totalChunks":5,"uploadedChunks":2,"status":"ACTIVE"}"#;
        let s: UploadSessionInfo = serde_json::from_str(json).unwrap();
        assert!(s.is_unfinished());
        let done = UploadSessionInfo {
            status: "COMPLETED".into(),
            ..s
        };
        assert!(!done.is_unfinished());
    }

    #[test]
    fn encryption_envelope_without_metadata() {
        let json = r#"{"fileId":"f1","encrypted":false}"#;
        let env: EncryptionEnvelope = serde_json::from_str(json).unwrap();
        assert!(!env.encrypted);
        assert!(env.metadata.is_none());
    }

    #[test]
    fn encryption_envelope_with_metadata() {
        let json = r#"{
            "fileId":"f1","encrypted":true,"clientEncrypted":true,
            "algorithm":"AES-256-GCM","keyDerivation":"PBKDF2",
            "salt":"c2FsdA==","iv":"aXY=","iterations":100000,"convergent":false,
            "originalSize":3,"encryptedSize":19,"originalHash":"abc"
        }"#;
        let env: EncryptionEnvelope = serde_json::from_str(json).unwrap();
        let meta = env.metadata.unwrap();
        assert_eq!(meta.algorithm, "AES-256-GCM");
        assert_eq!(meta.iterations, 100_000);
        assert_eq!(meta.encrypted_size, 19);
    }
}
