//! HTTP transport built on reqwest
//!
//! The client only carries a connect timeout. The per-request timeout is
//! applied to command requests alone: the state stream stays open for as long
//! as the controller keeps it open, and uploads of large jobs may legitimately
//! take minutes.

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use laserdeck_core::ConnectionError;
use laserdeck_settings::ConnectionSettings;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Url};
use std::collections::VecDeque;
use std::time::Duration;

use super::{BackendResponse, ControllerTransport, EventStream, SseDecoder, UploadBody};

/// [`ControllerTransport`] talking to the controller's web server
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    settings: ConnectionSettings,
}

impl HttpTransport {
    /// Build a transport for the controller described by `settings`
    pub fn new(settings: ConnectionSettings) -> Result<Self, ConnectionError> {
        Url::parse(&settings.base_url).map_err(|_| ConnectionError::InvalidUrl {
            url: settings.base_url.clone(),
        })?;

        let client = Client::builder()
            .user_agent(concat!("laserdeck/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(settings.connect_timeout())
            .build()
            .map_err(|e| ConnectionError::Other {
                message: format!("failed to build http client: {e}"),
            })?;

        Ok(Self { client, settings })
    }

    /// Connection settings this transport was built from
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn request_error(url: &str, timeout: Option<Duration>, err: reqwest::Error) -> ConnectionError {
        match timeout {
            Some(timeout) if err.is_timeout() => ConnectionError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            },
            _ if err.is_builder() => ConnectionError::Other {
                message: format!("invalid request to {url}: {err}"),
            },
            _ => ConnectionError::Unreachable {
                url: url.to_string(),
                reason: err.to_string(),
            },
        }
    }

    async fn collect(
        url: &str,
        timeout: Option<Duration>,
        response: reqwest::Response,
    ) -> Result<BackendResponse, ConnectionError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::request_error(url, timeout, e))?;
        Ok(BackendResponse::new(status, body.to_vec()))
    }
}

#[async_trait]
impl ControllerTransport for HttpTransport {
    async fn open_event_stream(&self) -> Result<EventStream, ConnectionError> {
        let url = self.settings.url(&self.settings.state_path);
        tracing::debug!("Opening state stream at {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| Self::request_error(&url, None, e))?;

        if !response.status().is_success() {
            return Err(ConnectionError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }

        let events = stream::unfold(
            Some((response.bytes_stream(), SseDecoder::new(), VecDeque::new())),
            |state| async move {
                let (mut bytes, mut decoder, mut pending) = state?;
                loop {
                    if let Some(event) = pending.pop_front() {
                        return Some((Ok(event), Some((bytes, decoder, pending))));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.feed(&chunk)),
                        Some(Err(e)) => {
                            let reason = e.to_string();
                            return Some((Err(ConnectionError::StreamFailed { reason }), None));
                        }
                        None => return Some((Err(ConnectionError::StreamClosed), None)),
                    }
                }
            },
        );

        Ok(events.boxed())
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<BackendResponse, ConnectionError> {
        let url = self.settings.url(path);
        let timeout = self.settings.request_timeout();
        tracing::debug!("POST {} {}", url, body);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::request_error(&url, Some(timeout), e))?;

        Self::collect(&url, Some(timeout), response).await
    }

    async fn upload(&self, upload: UploadBody) -> Result<BackendResponse, ConnectionError> {
        let url = self.settings.url(&self.settings.upload_path);
        tracing::debug!(
            "Uploading {} to {} ({:?} bytes)",
            upload.filename,
            url,
            upload.content_length
        );

        let disposition = format!(
            "attachment; filename=\"{}\"",
            upload.filename.replace('"', "_")
        );
        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_DISPOSITION, disposition);
        if let Some(length) = upload.content_length {
            request = request.header(CONTENT_LENGTH, length);
        }

        let response = request
            .body(Body::wrap_stream(upload.body))
            .send()
            .await
            .map_err(|e| Self::request_error(&url, None, e))?;

        Self::collect(&url, None, response).await
    }
}
