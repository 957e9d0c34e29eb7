//! Job file upload
//!
//! One upload at a time. The file is posted as a raw binary body with its
//! name in the `Content-Disposition` header; progress is reported as a whole
//! percentage when the length is known and as indeterminate otherwise.
//!
//! A cancel takes effect immediately: the manager moves to `Cancelled` before
//! the transfer task notices, and the in-flight request future is dropped.

use futures_util::{stream, StreamExt};
use laserdeck_core::{
    AppEvent, EventBus, Notice, NoticeLevel, PageAction, ThreadSafe, UploadError, UploadEvent,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::communication::{BackendResponse, ByteStream, ControllerTransport, UploadBody};

/// Upload lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UploadState {
    /// Nothing uploaded yet, or reset after a finished upload
    #[default]
    Idle,
    /// Transfer running; percentage when the length is known
    InProgress(Option<u8>),
    /// Operator cancelled the transfer
    Cancelled,
    /// Transfer or controller failure
    Failed(String),
    /// Controller accepted the file
    Completed,
}

impl UploadState {
    /// A transfer is running
    pub fn is_in_progress(&self) -> bool {
        matches!(self, UploadState::InProgress(_))
    }

    /// The last transfer has finished one way or another
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Cancelled | UploadState::Failed(_) | UploadState::Completed
        )
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadState::Idle => write!(f, "idle"),
            UploadState::InProgress(Some(percent)) => write!(f, "uploading ({}%)", percent),
            UploadState::InProgress(None) => write!(f, "uploading"),
            UploadState::Cancelled => write!(f, "cancelled"),
            UploadState::Failed(reason) => write!(f, "failed: {}", reason),
            UploadState::Completed => write!(f, "completed"),
        }
    }
}

/// Make a name safe for the controller's flat file store
fn sanitize_filename(name: &str) -> String {
    let name = name.replace(['/', '\\', '"'], "_");
    if name.trim().is_empty() {
        "upload.bin".to_string()
    } else {
        name
    }
}

/// File chosen for upload
pub struct UploadSource {
    filename: String,
    length: Option<u64>,
    body: ByteStream,
}

impl UploadSource {
    /// Stream a local file in `chunk_size` pieces
    pub async fn from_path(path: &Path, chunk_size: usize) -> Result<Self, UploadError> {
        let source_error = |e: std::io::Error| UploadError::Source {
            reason: format!("{}: {}", path.display(), e),
        };
        let file = tokio::fs::File::open(path).await.map_err(source_error)?;
        let length = file.metadata().await.map_err(source_error)?.len();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let chunk_size = chunk_size.max(1);
        let body = stream::unfold(Some(file), move |file| async move {
            let mut file = file?;
            let mut buf = vec![0u8; chunk_size];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(buf), Some(file)))
                }
                Err(e) => Some((Err(e), None)),
            }
        });

        Ok(Self {
            filename: sanitize_filename(&filename),
            length: Some(length),
            body: body.boxed(),
        })
    }

    /// Upload an in-memory buffer
    pub fn from_bytes(filename: &str, bytes: impl Into<Vec<u8>>, chunk_size: usize) -> Self {
        let bytes = bytes.into();
        let length = bytes.len() as u64;
        let chunks: Vec<std::io::Result<Vec<u8>>> = bytes
            .chunks(chunk_size.max(1))
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Self {
            filename: sanitize_filename(filename),
            length: Some(length),
            body: stream::iter(chunks).boxed(),
        }
    }

    /// Upload a stream of unknown length
    pub fn from_stream(filename: &str, body: ByteStream) -> Self {
        Self {
            filename: sanitize_filename(filename),
            length: None,
            body,
        }
    }

    /// Name the file will have on the controller
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Total length, when known
    pub fn length(&self) -> Option<u64> {
        self.length
    }
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSource")
            .field("filename", &self.filename)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Handle to a running upload
#[derive(Debug)]
pub struct UploadTask {
    id: Uuid,
    handle: JoinHandle<UploadState>,
}

impl UploadTask {
    /// Identifier of this upload
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the terminal state of this upload
    pub async fn wait(self) -> UploadState {
        match self.handle.await {
            Ok(state) => state,
            Err(e) => UploadState::Failed(format!("upload task ended unexpectedly: {}", e)),
        }
    }
}

struct Slot {
    id: Option<Uuid>,
    filename: String,
    cancel: Option<watch::Sender<bool>>,
}

struct Shared {
    transport: Arc<dyn ControllerTransport>,
    bus: Arc<EventBus>,
    slot: ThreadSafe<Slot>,
    state_tx: watch::Sender<UploadState>,
}

impl Shared {
    fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.bus.publish(AppEvent::Notice(Notice::new(level, message)));
    }

    fn report_progress(&self, id: Uuid, loaded: u64, total: Option<u64>) {
        {
            let slot = self.slot.lock();
            if slot.id != Some(id) {
                return;
            }
            let percent = total.map(|total| (loaded.min(total) * 100 / total) as u8);
            self.state_tx.send_if_modified(|state| {
                if state.is_in_progress() && *state != UploadState::InProgress(percent) {
                    *state = UploadState::InProgress(percent);
                    true
                } else {
                    false
                }
            });
        }
        self.bus
            .publish(AppEvent::Upload(UploadEvent::Progress { loaded, total }));
    }

    /// Record the outcome of transfer `id` unless it was cancelled or superseded
    fn finish(&self, id: Uuid, terminal: UploadState) -> UploadState {
        let filename = {
            let mut slot = self.slot.lock();
            let current = self.state_tx.borrow().clone();
            if slot.id != Some(id) || !current.is_in_progress() {
                return current;
            }
            slot.cancel = None;
            self.state_tx.send_replace(terminal.clone());
            slot.filename.clone()
        };

        match &terminal {
            UploadState::Completed => {
                tracing::info!("Upload of {} accepted", filename);
                self.bus
                    .publish(AppEvent::Upload(UploadEvent::Completed { filename }));
                self.bus.publish(AppEvent::Page(PageAction::Refresh));
            }
            UploadState::Failed(reason) => {
                tracing::warn!("Upload of {} failed: {}", filename, reason);
                self.bus.publish(AppEvent::Upload(UploadEvent::Failed {
                    filename,
                    reason: reason.clone(),
                }));
                self.notice(NoticeLevel::Error, format!("Upload failed, {}", reason));
            }
            _ => {}
        }
        terminal
    }
}

fn rejection_reason(response: &BackendResponse) -> String {
    match response.status {
        413 => "disk full".to_string(),
        status => response
            .reason()
            .unwrap_or_else(|| format!("controller answered HTTP {}", status)),
    }
}

async fn transfer(
    shared: Arc<Shared>,
    id: Uuid,
    source: UploadSource,
    mut cancel_rx: watch::Receiver<bool>,
) -> UploadState {
    let total = source.length.filter(|length| *length > 0);
    let body = {
        let shared = shared.clone();
        let mut loaded = 0u64;
        source
            .body
            .inspect(move |chunk| {
                if let Ok(chunk) = chunk {
                    loaded += chunk.len() as u64;
                    shared.report_progress(id, loaded, total);
                }
            })
            .boxed()
    };
    let upload = UploadBody {
        filename: source.filename,
        content_length: source.length,
        body,
    };

    let cancelled = async {
        let closed = cancel_rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    };

    let outcome = tokio::select! {
        result = shared.transport.upload(upload) => Some(result),
        _ = cancelled => None,
    };

    let result = match outcome {
        None => return shared.finish(id, UploadState::Cancelled),
        Some(Ok(response)) if response.status == 200 => Ok(()),
        Some(Ok(response)) => Err(UploadError::Rejected {
            status: response.status,
            reason: rejection_reason(&response),
        }),
        Some(Err(e)) => Err(UploadError::Transport(e)),
    };
    let terminal = match result {
        Ok(()) => UploadState::Completed,
        Err(UploadError::Rejected { reason, .. }) => UploadState::Failed(reason),
        Err(e) => UploadState::Failed(e.to_string()),
    };
    shared.finish(id, terminal)
}

/// Runs job file uploads, one at a time
#[derive(Clone)]
pub struct UploadManager {
    shared: Arc<Shared>,
}

impl UploadManager {
    /// Create an idle manager
    pub fn new(transport: Arc<dyn ControllerTransport>, bus: Arc<EventBus>) -> Self {
        let (state_tx, _) = watch::channel(UploadState::Idle);
        Self {
            shared: Arc::new(Shared {
                transport,
                bus,
                slot: laserdeck_core::thread_safe(Slot {
                    id: None,
                    filename: String::new(),
                    cancel: None,
                }),
                state_tx,
            }),
        }
    }

    /// Start uploading `source`
    ///
    /// Without a source, or while another upload runs, a notice is published,
    /// an error returned and the state left untouched. Must be called from
    /// within a tokio runtime.
    pub fn start_upload(&self, source: Option<UploadSource>) -> Result<UploadTask, UploadError> {
        let Some(source) = source else {
            self.shared
                .notice(NoticeLevel::Warning, UploadError::NoFileSelected.to_string());
            return Err(UploadError::NoFileSelected);
        };

        let id = Uuid::new_v4();
        let cancel_rx = {
            let mut slot = self.shared.slot.lock();
            if self.shared.state_tx.borrow().is_in_progress() {
                drop(slot);
                tracing::debug!("Ignoring upload of {}, another is running", source.filename);
                self.shared
                    .notice(NoticeLevel::Warning, UploadError::AlreadyInProgress.to_string());
                return Err(UploadError::AlreadyInProgress);
            }

            let (cancel_tx, cancel_rx) = watch::channel(false);
            slot.id = Some(id);
            slot.filename = source.filename.clone();
            slot.cancel = Some(cancel_tx);
            let initial = source.length.filter(|length| *length > 0).map(|_| 0);
            self.shared
                .state_tx
                .send_replace(UploadState::InProgress(initial));
            cancel_rx
        };

        tracing::info!("Uploading {} ({:?} bytes)", source.filename, source.length);
        self.shared.bus.publish(AppEvent::Upload(UploadEvent::Started {
            filename: source.filename.clone(),
            total: source.length,
        }));

        let handle = tokio::spawn(transfer(self.shared.clone(), id, source, cancel_rx));
        Ok(UploadTask { id, handle })
    }

    /// Cancel the running upload
    ///
    /// Returns false when nothing was in progress.
    pub fn cancel(&self) -> bool {
        let filename = {
            let slot = self.shared.slot.lock();
            if !self.shared.state_tx.borrow().is_in_progress() {
                return false;
            }
            self.shared.state_tx.send_replace(UploadState::Cancelled);
            if let Some(cancel) = &slot.cancel {
                let _ = cancel.send(true);
            }
            slot.filename.clone()
        };

        tracing::info!("Upload of {} cancelled", filename);
        self.shared.bus.publish(AppEvent::Upload(UploadEvent::Cancelled {
            filename: filename.clone(),
        }));
        self.shared
            .notice(NoticeLevel::Info, format!("Upload of {} cancelled", filename));
        true
    }

    /// Return a finished upload to `Idle`
    pub fn reset(&self) -> bool {
        let mut slot = self.shared.slot.lock();
        if !self.shared.state_tx.borrow().is_terminal() {
            return false;
        }
        slot.id = None;
        slot.cancel = None;
        slot.filename.clear();
        self.shared.state_tx.send_replace(UploadState::Idle);
        true
    }

    /// Current upload state
    pub fn state(&self) -> UploadState {
        self.shared.state_tx.borrow().clone()
    }

    /// Receiver that follows the upload state
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.shared.state_tx.subscribe()
    }

    /// A transfer is running
    pub fn is_uploading(&self) -> bool {
        self.state().is_in_progress()
    }
}

impl std::fmt::Debug for UploadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadManager")
            .field("state", &self.state())
            .finish()
    }
}
