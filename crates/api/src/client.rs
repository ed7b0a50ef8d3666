//! HTTP implementation of [`CloudApi`].
//!
//! Async client using `reqwest` with Bearer token authentication. Every JSON
//! response is unwrapped from the `{success, message, code, data}` envelope.

use std::time::Duration;

use futures_util::StreamExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use clouddisk_protocol::constants::{DOWNLOAD_TIMEOUT, endpoints};
use clouddisk_protocol::messages::{
    ChunkSignature, ConvergentCheckRequest, DeltaRequest, EncryptionEnvelope, FileMetadata,
    QuickCheckRequest, QuickCheckResponse, QuickUploadRequest, ResumableInitRequest,
    UploadSessionInfo,
};
use clouddisk_protocol::{ApiResponse, EncryptionMetadata};

use crate::remote::{ApiFuture, ByteStream, CloudApi};
use crate::ApiError;

/// clouddisk REST API client.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    download_timeout: Duration,
}

impl HttpClient {
    /// Creates a client for `base_url`, authenticating with `token` if given.
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| ApiError::InvalidToken)?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            download_timeout: DOWNLOAD_TIMEOUT,
        })
    }

    /// Overrides the timeout applied to [`CloudApi::download_file`].
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Sends a request and maps auth failures and error statuses.
    async fn execute(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.send().await.map_err(ApiError::from_transport)?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %resp.url(), "request rejected as unauthorized");
            return Err(ApiError::Auth);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // Error statuses usually still carry the envelope.
            if let Ok(envelope) = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                && let Err(failure) = envelope.into_result()
            {
                return Err(failure.into());
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp)
    }

    /// Sends a request and unwraps the response envelope.
    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Option<T>, ApiError> {
        let resp = self.execute(req).await?;
        let body = resp.bytes().await.map_err(ApiError::from_transport)?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&body)?;
        Ok(envelope.into_result()?)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>, ApiError> {
        debug!(endpoint, "GET");
        self.call(self.http.get(self.url(endpoint))).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Option<T>, ApiError> {
        debug!(endpoint, "POST");
        self.call(self.http.post(self.url(endpoint)).json(body)).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: Form,
    ) -> Result<Option<T>, ApiError> {
        debug!(endpoint, "POST multipart");
        self.call(self.http.post(self.url(endpoint)).multipart(form))
            .await
    }

    async fn fetch_bytes(&self, req: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let resp = self.execute(req).await?;
        Ok(resp
            .bytes()
            .await
            .map_err(ApiError::from_transport)?
            .to_vec())
    }
}

/// Characters escaped in identifiers used as path segments.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn segment(id: &str) -> String {
    utf8_percent_encode(id, SEGMENT).to_string()
}

fn required<T>(data: Option<T>, endpoint: &str) -> Result<T, ApiError> {
    data.ok_or_else(|| ApiError::Protocol(format!("{endpoint}: response carried no data")))
}

fn file_part(name: &str, data: &[u8]) -> Part {
    Part::bytes(data.to_vec()).file_name(name.to_string())
}

impl CloudApi for HttpClient {
    fn quick_check<'a>(&'a self, hash: &'a str) -> ApiFuture<'a, bool> {
        Box::pin(async move {
            let req = QuickCheckRequest { hash: hash.into() };
            let resp: Option<QuickCheckResponse> =
                self.post_json(endpoints::QUICK_CHECK, &req).await?;
            Ok(resp.unwrap_or_default().can_quick_upload)
        })
    }

    fn quick_upload<'a>(&'a self, req: &'a QuickUploadRequest) -> ApiFuture<'a, FileMetadata> {
        Box::pin(async move {
            let meta: Option<FileMetadata> = self.post_json(endpoints::QUICK_UPLOAD, req).await?;
            Ok(meta.unwrap_or_default())
        })
    }

    fn upload_file<'a>(
        &'a self,
        file_name: &'a str,
        path: &'a str,
        data: &'a [u8],
    ) -> ApiFuture<'a, FileMetadata> {
        Box::pin(async move {
            let form = Form::new()
                .part("file", file_part(file_name, data))
                .text("path", path.to_string());
            let meta: Option<FileMetadata> = self.post_form(endpoints::UPLOAD, form).await?;
            Ok(meta.unwrap_or_default())
        })
    }

    fn init_resumable<'a>(
        &'a self,
        req: &'a ResumableInitRequest,
    ) -> ApiFuture<'a, UploadSessionInfo> {
        Box::pin(async move {
            let info = self.post_json(endpoints::RESUMABLE_INIT, req).await?;
            required(info, endpoints::RESUMABLE_INIT)
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        session_id: &'a str,
        index: usize,
        data: &'a [u8],
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let endpoint = endpoints::resumable_chunk(&segment(session_id), index);
            let form = Form::new().part("chunk", file_part("blob", data));
            let _: Option<serde_json::Value> = self.post_form(&endpoint, form).await?;
            Ok(())
        })
    }

    fn complete_resumable<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, FileMetadata> {
        Box::pin(async move {
            let endpoint = endpoints::resumable_complete(&segment(session_id));
            debug!(endpoint = %endpoint, "POST");
            let meta: Option<FileMetadata> =
                self.call(self.http.post(self.url(&endpoint))).await?;
            Ok(meta.unwrap_or_default())
        })
    }

    fn list_sessions(&self) -> ApiFuture<'_, Vec<UploadSessionInfo>> {
        Box::pin(async move {
            let sessions = self.get_json(endpoints::RESUMABLE_SESSIONS).await?;
            Ok(sessions.unwrap_or_default())
        })
    }

    fn get_signatures<'a>(&'a self, file_id: &'a str) -> ApiFuture<'a, Vec<ChunkSignature>> {
        Box::pin(async move {
            let endpoint = endpoints::signatures(&segment(file_id));
            let sigs = self.get_json(&endpoint).await?;
            required(sigs, &endpoint)
        })
    }

    fn apply_delta<'a>(
        &'a self,
        file_id: &'a str,
        delta: &'a DeltaRequest,
    ) -> ApiFuture<'a, FileMetadata> {
        Box::pin(async move {
            let endpoint = endpoints::delta(&segment(file_id));
            let meta: Option<FileMetadata> = self.post_json(&endpoint, delta).await?;
            Ok(meta.unwrap_or_default())
        })
    }

    fn upload_encrypted<'a>(
        &'a self,
        path: &'a str,
        ciphertext: &'a [u8],
        metadata: &'a EncryptionMetadata,
    ) -> ApiFuture<'a, FileMetadata> {
        Box::pin(async move {
            let sidecar = serde_json::to_string(metadata)?;
            let form = Form::new()
                .part("file", file_part(&metadata.file_name, ciphertext))
                .text("metadata", sidecar)
                .text("path", path.to_string());
            let meta: Option<FileMetadata> =
                self.post_form(endpoints::UPLOAD_ENCRYPTED, form).await?;
            Ok(meta.unwrap_or_default())
        })
    }

    fn get_encryption_metadata<'a>(
        &'a self,
        file_id: &'a str,
    ) -> ApiFuture<'a, EncryptionEnvelope> {
        Box::pin(async move {
            let endpoint = endpoints::encryption(&segment(file_id));
            let envelope = self.get_json(&endpoint).await?;
            required(envelope, &endpoint)
        })
    }

    fn convergent_check<'a>(&'a self, original_hash: &'a str) -> ApiFuture<'a, bool> {
        Box::pin(async move {
            let req = ConvergentCheckRequest {
                original_hash: original_hash.into(),
            };
            let resp: Option<QuickCheckResponse> =
                self.post_json(endpoints::CONVERGENT_CHECK, &req).await?;
            Ok(resp.unwrap_or_default().can_quick_upload)
        })
    }

    fn download_file<'a>(
        &'a self,
        file_id: &'a str,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let endpoint = endpoints::download(&segment(file_id));
            let req = self
                .http
                .get(self.url(&endpoint))
                .timeout(self.download_timeout);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(file = file_id, "download cancelled");
                    Err(ApiError::Cancelled)
                }
                result = self.fetch_bytes(req) => result,
            }
        })
    }

    fn open_sync_stream(&self) -> ApiFuture<'_, ByteStream> {
        Box::pin(async move {
            let req = self
                .http
                .get(self.url(endpoints::SYNC))
                .header(ACCEPT, "text/event-stream");
            let resp = self.execute(req).await?;
            let stream = resp
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(ApiError::from_transport));
            Ok(Box::pin(stream) as ByteStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Reads one full HTTP request (headers plus `Content-Length` body).
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 4096];
        loop {
            let n = stream.read(&mut tmp).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Starts a mock HTTP server answering one request; the handle yields
    /// the raw request it received.
    async fn mock_server(
        status: u16,
        content_type: &str,
        body: &str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let body = body.to_string();
        let content_type = content_type.to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;

            let resp = format!(
                "HTTP/1.1 {status} Mock\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
            request
        });

        (url, handle)
    }

    async fn mock_json(body: &str) -> (String, tokio::task::JoinHandle<String>) {
        mock_server(200, "application/json", body).await
    }

    /// Accepts one connection and never answers.
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_request(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        format!("http://127.0.0.1:{port}")
    }

    fn client(url: &str) -> HttpClient {
        HttpClient::new(url, Some("tok-123")).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = HttpClient::new("http://host/api/", None).unwrap();
        assert_eq!(c.base_url(), "http://host/api");
        assert_eq!(c.url("/files/sync"), "http://host/api/files/sync");
    }

    #[test]
    fn invalid_token_rejected() {
        let err = HttpClient::new("http://host", Some("bad\ntoken")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[test]
    fn segment_encodes_reserved_characters() {
        assert_eq!(segment("abc123"), "abc123");
        assert_eq!(segment("7f3e-41_a.b"), "7f3e-41_a.b");
        assert_eq!(segment("a/b"), "a%2Fb");
    }

    #[tokio::test]
    async fn quick_check_sends_hash_with_bearer() {
        let (url, handle) =
            mock_json(r#"{"success":true,"data":{"canQuickUpload":true}}"#).await;
        let known = client(&url).quick_check("abc").await.unwrap();
        assert!(known);

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /files/quick-check "));
        assert!(request.to_lowercase().contains("authorization: bearer tok-123"));
        assert!(request.contains(r#"{"hash":"abc"}"#));
    }

    #[tokio::test]
    async fn business_failure_is_mapped() {
        let (url, _h) = mock_json(
            r#"{"success":false,"message":"file already exists","code":"VALIDATION_ERROR"}"#,
        )
        .await;
        let req = QuickUploadRequest {
            hash: "h".into(),
            file_name: "a.txt".into(),
            path: "/".into(),
        };
        let err = client(&url).quick_upload(&req).await.unwrap_err();
        match err {
            ApiError::Business { code, message } => {
                assert_eq!(code, "VALIDATION_ERROR");
                assert_eq!(message, "file already exists");
            }
            other => panic!("expected business failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_with_envelope_is_business() {
        let (url, _h) = mock_server(
            400,
            "application/json",
            r#"{"success":false,"message":"bad path","code":"VALIDATION_ERROR"}"#,
        )
        .await;
        let err = client(&url).list_sessions().await.unwrap_err();
        assert!(err.is_business());
    }

    #[tokio::test]
    async fn unauthorized_is_auth_error() {
        let (url, _h) = mock_server(401, "application/json", "{}").await;
        let err = client(&url).quick_check("abc").await.unwrap_err();
        assert!(matches!(err, ApiError::Auth));
    }

    #[tokio::test]
    async fn plain_error_status() {
        let (url, _h) = mock_server(502, "text/plain", "bad gateway").await;
        let err = client(&url).get_signatures("f1").await.unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_json_error() {
        let (url, _h) = mock_json("not json").await;
        let err = client(&url).list_sessions().await.unwrap_err();
        assert!(matches!(err, ApiError::Json(_)));
    }

    #[tokio::test]
    async fn init_without_data_is_protocol_error() {
        let (url, _h) = mock_json(r#"{"success":true}"#).await;
        let req = ResumableInitRequest {
            file_name: "big.iso".into(),
            path: "/".into(),
            file_size: 10,
        };
        let err = client(&url).init_resumable(&req).await.unwrap_err();
        assert!(matches!(err, ApiError::Protocol(_)));
    }

    #[tokio::test]
    async fn init_resumable_parses_session() {
        let (url, handle) = mock_json(
            r#"{"success":true,"data":{"sessionId":"s-1","fileName":"big.iso","fileSize":10,"totalChunks":3,"uploadedChunks":0,"status":"ACTIVE"}}"#,
        )
        .await;
        let req = ResumableInitRequest {
            file_name: "big.iso".into(),
            path: "/isos".into(),
            file_size: 10,
        };
        let info = client(&url).init_resumable(&req).await.unwrap();
        assert_eq!(info.session_id, "s-1");
        assert_eq!(info.total_chunks, 3);

        let request = handle.await.unwrap();
        assert!(request.contains(r#""fileSize":10"#));
        assert!(request.contains(r#""fileName":"big.iso""#));
    }

    #[tokio::test]
    async fn upload_chunk_is_multipart() {
        let (url, handle) = mock_json(r#"{"success":true}"#).await;
        client(&url)
            .upload_chunk("s-1", 2, b"CHUNKBYTES")
            .await
            .unwrap();

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /files/resumable/s-1/chunk/2 "));
        assert!(request.contains(r#"name="chunk""#));
        assert!(request.contains("CHUNKBYTES"));
    }

    #[tokio::test]
    async fn upload_file_sends_file_and_path() {
        let (url, handle) = mock_json(
            r#"{"success":true,"data":{"fileId":"f1","name":"a.txt","path":"/docs","size":5}}"#,
        )
        .await;
        let meta = client(&url)
            .upload_file("a.txt", "/docs", b"hello")
            .await
            .unwrap();
        assert_eq!(meta.file_id, "f1");

        let request = handle.await.unwrap();
        assert!(request.contains(r#"name="file"; filename="a.txt""#));
        assert!(request.contains(r#"name="path""#));
        assert!(request.contains("/docs"));
    }

    #[tokio::test]
    async fn signatures_parse() {
        let (url, handle) = mock_json(
            r#"{"success":true,"data":[{"chunkIndex":0,"hash":"aa","size":4,"offset":0},{"chunkIndex":1,"hash":"bb","size":2,"offset":4}]}"#,
        )
        .await;
        let sigs = client(&url).get_signatures("f1").await.unwrap();
        assert_eq!(sigs.len(), 2);
        assert_eq!(sigs[1].hash, "bb");
        assert!(handle.await.unwrap().starts_with("GET /files/f1/signatures "));
    }

    #[tokio::test]
    async fn signatures_without_data_rejected() {
        let (url, _handle) = mock_json(r#"{"success":true,"data":null}"#).await;
        let err = client(&url).get_signatures("f1").await.unwrap_err();
        assert!(matches!(err, ApiError::Protocol(_)));
        assert_eq!(err.kind(), crate::ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn empty_signature_list_accepted() {
        let (url, _handle) = mock_json(r#"{"success":true,"data":[]}"#).await;
        assert!(client(&url).get_signatures("f1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_delta_posts_both_maps() {
        let (url, handle) = mock_json(r#"{"success":true,"data":{"fileId":"f1"}}"#).await;
        let mut delta = DeltaRequest::default();
        delta.delta_chunks.insert("1".into(), "QkI=".into());
        delta.chunk_hashes.insert("0".into(), "h0".into());
        delta.chunk_hashes.insert("1".into(), "h1".into());
        client(&url).apply_delta("f1", &delta).await.unwrap();

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /files/f1/delta "));
        assert!(request.contains(r#""deltaChunks":{"1":"QkI="}"#));
        assert!(request.contains(r#""chunkHashes":{"0":"h0","1":"h1"}"#));
    }

    #[tokio::test]
    async fn upload_encrypted_attaches_metadata() {
        let (url, handle) = mock_json(r#"{"success":true,"data":{"fileId":"f9"}}"#).await;
        let metadata = EncryptionMetadata {
            file_name: "secret.txt".into(),
            algorithm: "AES-256-GCM".into(),
            key_derivation: "PBKDF2".into(),
            salt: "c2FsdA==".into(),
            iv: "aXY=".into(),
            iterations: 100_000,
            convergent: false,
            original_size: 3,
            encrypted_size: 19,
            original_hash: "abc".into(),
        };
        let meta = client(&url)
            .upload_encrypted("/vault", b"CIPHERTEXT", &metadata)
            .await
            .unwrap();
        assert_eq!(meta.file_id, "f9");

        let request = handle.await.unwrap();
        assert!(request.contains(r#"filename="secret.txt""#));
        assert!(request.contains(r#"name="metadata""#));
        assert!(request.contains(r#""keyDerivation":"PBKDF2""#));
        assert!(request.contains("CIPHERTEXT"));
    }

    #[tokio::test]
    async fn convergent_check_sends_original_hash() {
        let (url, handle) =
            mock_json(r#"{"success":true,"data":{"canQuickUpload":false}}"#).await;
        assert!(!client(&url).convergent_check("ff00").await.unwrap());
        assert!(handle.await.unwrap().contains(r#"{"originalHash":"ff00"}"#));
    }

    #[tokio::test]
    async fn download_returns_raw_bytes() {
        let (url, handle) = mock_server(200, "application/octet-stream", "RAWDATA").await;
        let cancel = CancellationToken::new();
        let data = client(&url).download_file("f1", &cancel).await.unwrap();
        assert_eq!(data, b"RAWDATA");
        assert!(handle.await.unwrap().starts_with("GET /files/f1/download "));
    }

    #[tokio::test]
    async fn download_cancelled() {
        let url = silent_server().await;
        let cancel = CancellationToken::new();
        let c = client(&url);
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });
        let err = c.download_file("f1", &cancel).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
    }

    #[tokio::test]
    async fn download_times_out() {
        let url = silent_server().await;
        let c = client(&url).with_download_timeout(Duration::from_millis(100));
        let err = c
            .download_file("f1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
    }

    #[tokio::test]
    async fn sync_stream_yields_body() {
        let body = "data:connected\n\ndata: {\"type\":\"upload\"}\n\n";
        let (url, handle) = mock_server(200, "text/event-stream", body).await;
        let mut stream = client(&url).open_sync_stream().await.unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(String::from_utf8(received).unwrap(), body);

        let request = handle.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /files/sync "));
        assert!(request.contains("accept: text/event-stream"));
    }
}
