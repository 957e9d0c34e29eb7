//! # LaserDeck Communication
//!
//! The three channels between the client and the controller:
//! - [`StateChannel`]: server-push state stream with fixed-delay reconnect
//! - [`CommandDispatcher`]: one request per operator command
//! - [`UploadManager`]: cancellable binary upload of job files
//!
//! All of them talk through a [`ControllerTransport`]; [`HttpTransport`] is
//! the production implementation.

pub mod commands;
pub mod communication;
pub mod dispatcher;
pub mod state_channel;
pub mod upload;

pub use commands::{
    control_for_id, jog_vector_for_id, resolve, Command, Control, ControlPanel, Endpoint,
    PrintRequest, UiEvent, CONTROL_BINDINGS, JOG_BINDINGS, STEP_SIZES,
};

pub use communication::{
    http::HttpTransport, BackendResponse, ByteStream, ControllerTransport, EventStream,
    ServerEvent, SseDecoder, UploadBody,
};

pub use dispatcher::{AutoConfirm, CommandDispatcher, Confirmer, Dispatch, DispatcherConfig};

pub use state_channel::{ConnectionState, StateChannel, StateChannelConfig};

pub use upload::{UploadManager, UploadSource, UploadState, UploadTask};
