//! Transport layer between the client and the controller
//!
//! The channels never talk HTTP directly. They go through
//! [`ControllerTransport`], which has three operations matching the three
//! things the controller exposes:
//! - a one-way stream of server-sent events ([`ControllerTransport::open_event_stream`])
//! - JSON request/response endpoints ([`ControllerTransport::post_json`])
//! - a raw binary upload endpoint ([`ControllerTransport::upload`])
//!
//! [`http::HttpTransport`] is the production implementation; tests supply
//! in-memory transports.

pub mod http;
pub mod sse;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use laserdeck_core::ConnectionError;

pub use sse::{ServerEvent, SseDecoder};

/// Stream of decoded server-sent events
///
/// Ends (or yields an error) when the underlying connection goes away.
pub type EventStream = BoxStream<'static, Result<ServerEvent, ConnectionError>>;

/// Stream of body chunks for an upload
pub type ByteStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

impl BackendResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body has no content besides whitespace
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(|b| b.is_ascii_whitespace())
    }

    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Reason the controller gave for a failure, if any
    ///
    /// Looks for an `error`, `message` or `reason` string in a JSON body,
    /// otherwise uses a short plain-text body as is.
    pub fn reason(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        if let Ok(serde_json::Value::Object(object)) = serde_json::from_slice(&self.body) {
            return ["error", "message", "reason"]
                .iter()
                .find_map(|key| object.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string);
        }
        let text = self.text();
        let text = text.trim();
        (text.len() <= 200 && !text.starts_with('<')).then(|| text.to_string())
    }
}

/// Body and metadata of a binary upload
pub struct UploadBody {
    /// Destination file name, sent in the `Content-Disposition` header
    pub filename: String,
    /// Body length, when known up front
    pub content_length: Option<u64>,
    /// Body chunks
    pub body: ByteStream,
}

impl std::fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadBody")
            .field("filename", &self.filename)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Connection to a controller
#[async_trait]
pub trait ControllerTransport: Send + Sync {
    /// Open the server-sent state stream
    async fn open_event_stream(&self) -> Result<EventStream, ConnectionError>;

    /// POST a JSON document to `path` and collect the response
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<BackendResponse, ConnectionError>;

    /// POST a raw binary body to the upload endpoint
    ///
    /// Dropping the returned future aborts the transfer.
    async fn upload(&self, upload: UploadBody) -> Result<BackendResponse, ConnectionError>;
}
