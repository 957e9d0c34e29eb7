#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use laserdeck_communication::{
    BackendResponse, ControllerTransport, EventStream, ServerEvent, UploadBody,
};
use laserdeck_core::{AppEvent, ConnectionError, EventBus, EventCategory, EventFilter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What one `open_event_stream` call does
pub enum StreamScript {
    /// Opening fails
    Fail(ConnectionError),
    /// Stream delivers these events, then the controller closes it
    Close(Vec<ServerEvent>),
    /// Stream delivers these events, then stays open
    Hold(Vec<ServerEvent>),
}

/// What an upload does
#[derive(Clone)]
pub enum UploadScript {
    /// Read the whole body, then answer
    Respond(BackendResponse),
    /// Read the whole body, then never answer
    ConsumeThenHang,
    /// Fail without reading
    Fail(ConnectionError),
}

struct OpenGuard {
    open: Arc<AtomicUsize>,
}

impl OpenGuard {
    fn new(open: &Arc<AtomicUsize>, max_open: &Arc<AtomicUsize>) -> Self {
        let now = open.fetch_add(1, Ordering::SeqCst) + 1;
        max_open.fetch_max(now, Ordering::SeqCst);
        Self { open: open.clone() }
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted in-memory controller
pub struct MockTransport {
    streams: Mutex<VecDeque<StreamScript>>,
    fail_when_exhausted: bool,
    pub stream_opens: Mutex<Vec<Instant>>,
    pub open_streams: Arc<AtomicUsize>,
    pub max_open_streams: Arc<AtomicUsize>,
    responses: Mutex<VecDeque<Result<BackendResponse, ConnectionError>>>,
    pub posts: Mutex<Vec<(String, serde_json::Value)>>,
    hold_posts: AtomicBool,
    upload_script: Mutex<UploadScript>,
    pub uploads: Mutex<Vec<(String, Option<u64>)>>,
    pub uploaded_bytes: AtomicUsize,
}

impl MockTransport {
    /// Streams stay open once the script runs out
    pub fn new(streams: Vec<StreamScript>) -> Self {
        Self::build(streams, false)
    }

    /// Every open fails once the script runs out
    pub fn failing(streams: Vec<StreamScript>) -> Self {
        Self::build(streams, true)
    }

    fn build(streams: Vec<StreamScript>, fail_when_exhausted: bool) -> Self {
        Self {
            streams: Mutex::new(streams.into()),
            fail_when_exhausted,
            stream_opens: Mutex::new(Vec::new()),
            open_streams: Arc::new(AtomicUsize::new(0)),
            max_open_streams: Arc::new(AtomicUsize::new(0)),
            responses: Mutex::new(VecDeque::new()),
            posts: Mutex::new(Vec::new()),
            hold_posts: AtomicBool::new(false),
            upload_script: Mutex::new(UploadScript::Respond(BackendResponse::new(200, ""))),
            uploads: Mutex::new(Vec::new()),
            uploaded_bytes: AtomicUsize::new(0),
        }
    }

    /// Queue the answer to the next command request
    pub fn respond(&self, response: Result<BackendResponse, ConnectionError>) {
        self.responses.lock().push_back(response);
    }

    /// Command requests are recorded but never answered
    pub fn hold_posts(&self) {
        self.hold_posts.store(true, Ordering::SeqCst);
    }

    pub fn set_upload(&self, script: UploadScript) {
        *self.upload_script.lock() = script;
    }

    pub fn opens(&self) -> Vec<Instant> {
        self.stream_opens.lock().clone()
    }

    pub fn posted(&self) -> Vec<(String, serde_json::Value)> {
        self.posts.lock().clone()
    }
}

pub fn unreachable() -> ConnectionError {
    ConnectionError::Unreachable {
        url: "http://controller/state".to_string(),
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl ControllerTransport for MockTransport {
    async fn open_event_stream(&self) -> Result<EventStream, ConnectionError> {
        self.stream_opens.lock().push(Instant::now());

        let script = self.streams.lock().pop_front();
        let script = match script {
            Some(script) => script,
            None if self.fail_when_exhausted => StreamScript::Fail(unreachable()),
            None => StreamScript::Hold(Vec::new()),
        };

        let (events, close) = match script {
            StreamScript::Fail(e) => return Err(e),
            StreamScript::Close(events) => (events, true),
            StreamScript::Hold(events) => (events, false),
        };

        let guard = OpenGuard::new(&self.open_streams, &self.max_open_streams);
        let events = stream::iter(events.into_iter().map(Ok));
        let tail = if close {
            stream::once(async { Err(ConnectionError::StreamClosed) }).boxed()
        } else {
            stream::pending().boxed()
        };
        Ok(events
            .chain(tail)
            .map(move |item| {
                let _open = &guard;
                item
            })
            .boxed())
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<BackendResponse, ConnectionError> {
        self.posts.lock().push((path.to_string(), body.clone()));
        if self.hold_posts.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        let response = self.responses.lock().pop_front();
        response.unwrap_or_else(|| Ok(BackendResponse::new(200, "")))
    }

    async fn upload(&self, upload: UploadBody) -> Result<BackendResponse, ConnectionError> {
        self.uploads
            .lock()
            .push((upload.filename.clone(), upload.content_length));
        let script = self.upload_script.lock().clone();

        if let UploadScript::Fail(e) = &script {
            return Err(e.clone());
        }

        let mut body = upload.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ConnectionError::Other {
                message: e.to_string(),
            })?;
            self.uploaded_bytes.fetch_add(chunk.len(), Ordering::SeqCst);
        }

        match script {
            UploadScript::Respond(response) => Ok(response),
            _ => std::future::pending().await,
        }
    }
}

/// Collect every event of the given categories published on `bus`
pub fn record(bus: &EventBus, categories: Vec<EventCategory>) -> Arc<Mutex<Vec<AppEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(EventFilter::Categories(categories), move |event| {
        sink.lock().push(event);
    });
    seen
}

/// Poll `condition` until it holds, panicking after a generous bound
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..60_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
