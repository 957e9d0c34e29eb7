//! Event type definitions for the event bus.
//!
//! Events are grouped by the channel that produces them. Notices and page
//! actions are addressed to whatever front end is attached: a notice is text
//! the operator must see, a page action asks the front end to refresh or move.

use serde::{Deserialize, Serialize};

/// Root event enum for all application events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// State channel connection lifecycle
    Connection(ConnectionEvent),
    /// Mirrored machine state changed
    Machine(MachineEvent),
    /// Command dispatch outcomes
    Command(CommandEvent),
    /// Upload transfer lifecycle
    Upload(UploadEvent),
    /// Operator-visible message
    Notice(Notice),
    /// Request for the front end to refresh or navigate
    Page(PageAction),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Connection(_) => EventCategory::Connection,
            AppEvent::Machine(_) => EventCategory::Machine,
            AppEvent::Command(_) => EventCategory::Command,
            AppEvent::Upload(_) => EventCategory::Upload,
            AppEvent::Notice(_) => EventCategory::Notice,
            AppEvent::Page(_) => EventCategory::Page,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Connection(e) => e.description(),
            AppEvent::Machine(e) => e.description(),
            AppEvent::Command(e) => e.description(),
            AppEvent::Upload(e) => e.description(),
            AppEvent::Notice(n) => format!("{}: {}", n.level, n.message),
            AppEvent::Page(p) => p.description(),
        }
    }

    /// Shorthand for an error notice
    pub fn error_notice(message: impl Into<String>) -> Self {
        AppEvent::Notice(Notice::new(NoticeLevel::Error, message))
    }

    /// Shorthand for an informational notice
    pub fn info_notice(message: impl Into<String>) -> Self {
        AppEvent::Notice(Notice::new(NoticeLevel::Info, message))
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// State channel events.
    Connection,
    /// Machine state events.
    Machine,
    /// Command events.
    Command,
    /// Upload events.
    Upload,
    /// Operator notices.
    Notice,
    /// Page actions.
    Page,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Connection => write!(f, "Connection"),
            EventCategory::Machine => write!(f, "Machine"),
            EventCategory::Command => write!(f, "Command"),
            EventCategory::Upload => write!(f, "Upload"),
            EventCategory::Notice => write!(f, "Notice"),
            EventCategory::Page => write!(f, "Page"),
        }
    }
}

/// State channel connection events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// Opening the event stream.
    Connecting {
        /// One-based attempt counter over the channel's lifetime.
        attempt: u64,
    },
    /// Event stream is open.
    Connected {
        /// Attempt that succeeded.
        attempt: u64,
    },
    /// Event stream failed or ended.
    Disconnected {
        /// Why the stream went away.
        reason: String,
    },
    /// Controller closed a stream after delivering events.
    StreamEnded {
        /// Events the stream delivered.
        events: u64,
    },
    /// A reconnect attempt is scheduled.
    ReconnectScheduled {
        /// Delay before the next attempt in milliseconds.
        delay_ms: u64,
    },
    /// A pushed payload could not be mirrored and was dropped.
    PayloadDropped {
        /// Why the payload was rejected.
        reason: String,
    },
}

impl ConnectionEvent {
    fn description(&self) -> String {
        match self {
            ConnectionEvent::Connecting { attempt } => {
                format!("Connecting to state stream (attempt {})", attempt)
            }
            ConnectionEvent::Connected { attempt } => {
                format!("State stream open (attempt {})", attempt)
            }
            ConnectionEvent::Disconnected { reason } => {
                format!("State stream lost: {}", reason)
            }
            ConnectionEvent::StreamEnded { events } => {
                format!("State stream ended after {} events", events)
            }
            ConnectionEvent::ReconnectScheduled { delay_ms } => {
                format!("Reconnecting in {}ms", delay_ms)
            }
            ConnectionEvent::PayloadDropped { reason } => {
                format!("Dropped state payload: {}", reason)
            }
        }
    }
}

/// Where a store update came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateSource {
    /// Pushed over the event stream
    Push,
    /// Returned in a command response
    CommandEcho,
}

/// Machine state events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineEvent {
    /// The store applied an update.
    StateUpdated {
        /// Store revision after the update.
        revision: u64,
        /// Who produced the update.
        source: UpdateSource,
    },
}

impl MachineEvent {
    fn description(&self) -> String {
        match self {
            MachineEvent::StateUpdated { revision, source } => {
                format!("State revision {} ({:?})", revision, source)
            }
        }
    }
}

/// Command dispatch events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandEvent {
    /// Request issued.
    Sent {
        /// Wire name of the command.
        command: String,
    },
    /// Controller accepted the command.
    Succeeded {
        /// Wire name of the command.
        command: String,
        /// Response carried a fresh state that was applied.
        echoed: bool,
    },
    /// Request failed or was rejected.
    Failed {
        /// Wire name of the command.
        command: String,
        /// Error message.
        error: String,
    },
    /// Operator declined the confirmation prompt.
    Declined {
        /// Wire name of the command.
        command: String,
    },
}

impl CommandEvent {
    fn description(&self) -> String {
        match self {
            CommandEvent::Sent { command } => format!("Sent {}", command),
            CommandEvent::Succeeded { command, echoed } => {
                if *echoed {
                    format!("{} accepted with state echo", command)
                } else {
                    format!("{} accepted", command)
                }
            }
            CommandEvent::Failed { command, error } => format!("{} failed: {}", command, error),
            CommandEvent::Declined { command } => format!("{} not confirmed", command),
        }
    }
}

/// Upload lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadEvent {
    /// Transfer started.
    Started {
        /// Destination file name.
        filename: String,
        /// Total bytes, when known.
        total: Option<u64>,
    },
    /// More bytes were handed to the transport.
    Progress {
        /// Bytes sent so far.
        loaded: u64,
        /// Total bytes, when known.
        total: Option<u64>,
    },
    /// Controller accepted the file.
    Completed {
        /// Destination file name.
        filename: String,
    },
    /// Operator cancelled the transfer.
    Cancelled {
        /// Destination file name.
        filename: String,
    },
    /// Transfer failed.
    Failed {
        /// Destination file name.
        filename: String,
        /// Why it failed.
        reason: String,
    },
}

impl UploadEvent {
    fn description(&self) -> String {
        match self {
            UploadEvent::Started { filename, total } => match total {
                Some(total) => format!("Uploading {} ({} bytes)", filename, total),
                None => format!("Uploading {}", filename),
            },
            UploadEvent::Progress { loaded, total } => match total {
                Some(total) => format!("Uploaded {}/{} bytes", loaded, total),
                None => format!("Uploaded {} bytes", loaded),
            },
            UploadEvent::Completed { filename } => format!("Upload of {} accepted", filename),
            UploadEvent::Cancelled { filename } => format!("Upload of {} cancelled", filename),
            UploadEvent::Failed { filename, reason } => {
                format!("Upload of {} failed: {}", filename, reason)
            }
        }
    }
}

/// Severity of an operator notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    /// Neutral information
    Info,
    /// Something the operator should look at
    Warning,
    /// An operation failed
    Error,
}

impl std::fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoticeLevel::Info => write!(f, "info"),
            NoticeLevel::Warning => write!(f, "warning"),
            NoticeLevel::Error => write!(f, "error"),
        }
    }
}

/// Message that must reach the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text shown to the operator.
    pub message: String,
}

impl Notice {
    /// Create a notice
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Navigation requested from the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageAction {
    /// Re-read controller listings now (file list changed).
    Refresh,
    /// Reload everything after a delay (controller is restarting).
    ReloadAfter {
        /// Delay in milliseconds.
        delay_ms: u64,
    },
    /// Leave for another address after a delay.
    RedirectAfter {
        /// Target address.
        url: String,
        /// Delay in milliseconds.
        delay_ms: u64,
    },
}

impl PageAction {
    fn description(&self) -> String {
        match self {
            PageAction::Refresh => "Refresh".to_string(),
            PageAction::ReloadAfter { delay_ms } => format!("Reload in {}ms", delay_ms),
            PageAction::RedirectAfter { url, delay_ms } => {
                format!("Redirect to {} in {}ms", url, delay_ms)
            }
        }
    }
}
