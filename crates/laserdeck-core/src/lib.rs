//! # LaserDeck Core
//!
//! Core types shared by every LaserDeck crate: the controller's machine
//! state model, the state store that mirrors it, the error taxonomy and
//! the event bus that carries notices to the front end.

pub mod data;
pub mod error;
pub mod event_bus;
pub mod store;
pub mod types;

pub use data::{
    ComponentStatus, DiodeTest, MachineState, PrintJob, StateUpdate, WifiStatus,
    LEGACY_FLAT_KEYS,
};

pub use error::{CommandError, ConnectionError, Error, PayloadError, Result, UploadError};

pub use event_bus::{
    AppEvent, CommandEvent, ConnectionEvent, EventBus, EventBusConfig, EventCategory,
    EventFilter, MachineEvent, Notice, NoticeLevel, PageAction, SubscriptionId, UpdateSource,
    UploadEvent,
};

pub use store::UiStateStore;

pub use types::{
    thread_safe, thread_safe_rw, thread_safe_rw_map, DataCallback, ThreadSafe, ThreadSafeRw,
    ThreadSafeRwMap,
};
