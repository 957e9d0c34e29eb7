//! Server-push state channel
//!
//! Holds at most one open event stream to the controller and feeds every
//! pushed snapshot into the [`UiStateStore`]. When the stream fails or ends
//! the channel closes it and schedules exactly one reconnect after a fixed
//! delay, forever, until [`StateChannel::disconnect`] is called.
//!
//! A stream that delivered events and was then closed by the controller is
//! routine: it is reported as `StreamEnded`, not `Disconnected`.
//!
//! ```text
//!            connect()                 stream opened
//!  Closed ─────────────► Connecting ─────────────────► Open
//!    ▲  ▲                    │                           │
//!    │  └────────────────────┘ open failed               │ error / end
//!    │                                                    │
//!    └──────────────── Closed + reconnect timer ◄─────────┘
//! ```
//!
//! The whole lifecycle runs in one spawned task whose handle the channel
//! owns. Every (re)connect bumps a generation counter; a task only changes
//! state while its generation is current, so a superseded timer can never
//! open a second stream.

use futures_util::StreamExt;
use laserdeck_core::{
    AppEvent, ConnectionError, ConnectionEvent, EventBus, MachineEvent, StateUpdate,
    ThreadSafe, UiStateStore, UpdateSource,
};
use laserdeck_settings::ConnectionSettings;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::communication::{ControllerTransport, ServerEvent};

/// Connection state of the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No stream; a reconnect may be pending
    Closed,
    /// Stream is being opened
    Connecting,
    /// Stream is open and delivering events
    Open,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
        }
    }
}

/// State channel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChannelConfig {
    /// Fixed wait between a lost stream and the next attempt
    pub reconnect_delay: Duration,
}

impl StateChannelConfig {
    /// Configuration from the connection settings
    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self {
            reconnect_delay: settings.reconnect_delay(),
        }
    }
}

impl Default for StateChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(2000),
        }
    }
}

struct Slot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct Shared {
    transport: Arc<dyn ControllerTransport>,
    store: UiStateStore,
    bus: Arc<EventBus>,
    config: StateChannelConfig,
    slot: ThreadSafe<Slot>,
    state_tx: watch::Sender<ConnectionState>,
    attempts: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Move to `to` if `generation` is still current
    fn transition(&self, generation: u64, to: ConnectionState) -> bool {
        let slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }
        self.state_tx.send_replace(to);
        true
    }

    /// Leave `Closed` for a reconnect if nobody else has moved on
    fn begin_reconnect(&self, generation: u64) -> bool {
        let slot = self.slot.lock();
        if slot.generation != generation || self.state() != ConnectionState::Closed {
            return false;
        }
        self.state_tx.send_replace(ConnectionState::Connecting);
        true
    }

    fn handle_event(&self, event: ServerEvent) {
        if event.event_type() != "message" {
            tracing::trace!("Ignoring '{}' event on state stream", event.event_type());
            return;
        }

        match StateUpdate::from_json(&event.data) {
            Ok(update) => {
                let revision = self.store.update(update);
                self.bus.publish(AppEvent::Machine(MachineEvent::StateUpdated {
                    revision,
                    source: UpdateSource::Push,
                }));
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Dropping state payload: {}", e);
                self.bus
                    .publish(AppEvent::Connection(ConnectionEvent::PayloadDropped {
                        reason: e.to_string(),
                    }));
            }
        }
    }
}

async fn run(shared: Arc<Shared>, generation: u64) {
    loop {
        let attempt = shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Opening state stream (attempt {})", attempt);
        shared
            .bus
            .publish(AppEvent::Connection(ConnectionEvent::Connecting { attempt }));

        let (reason, routine) = match shared.transport.open_event_stream().await {
            Ok(mut events) => {
                if !shared.transition(generation, ConnectionState::Open) {
                    return;
                }
                tracing::info!("State stream open");
                shared
                    .bus
                    .publish(AppEvent::Connection(ConnectionEvent::Connected { attempt }));

                let mut delivered = 0u64;
                let error = loop {
                    match events.next().await {
                        Some(Ok(event)) => {
                            delivered += 1;
                            shared.handle_event(event);
                        }
                        Some(Err(e)) => break e,
                        None => break ConnectionError::StreamClosed,
                    }
                };
                drop(events);
                // controllers that push one snapshot per request end every stream
                let routine = delivered > 0 && matches!(error, ConnectionError::StreamClosed);
                (error.to_string(), routine.then_some(delivered))
            }
            Err(e) => (e.to_string(), None),
        };

        if !shared.transition(generation, ConnectionState::Closed) {
            return;
        }
        let delay = shared.config.reconnect_delay;
        match routine {
            Some(events) => {
                tracing::debug!(
                    "State stream ended after {} events, reopening in {}ms",
                    events,
                    delay.as_millis()
                );
                shared
                    .bus
                    .publish(AppEvent::Connection(ConnectionEvent::StreamEnded { events }));
            }
            None => {
                tracing::warn!(
                    "State stream lost ({}), retrying in {}ms",
                    reason,
                    delay.as_millis()
                );
                shared
                    .bus
                    .publish(AppEvent::Connection(ConnectionEvent::Disconnected { reason }));
            }
        }
        shared
            .bus
            .publish(AppEvent::Connection(ConnectionEvent::ReconnectScheduled {
                delay_ms: delay.as_millis() as u64,
            }));

        tokio::time::sleep(delay).await;

        if !shared.begin_reconnect(generation) {
            return;
        }
    }
}

/// Push channel from the controller's state stream into the store
///
/// Must be used from within a tokio runtime. Dropping the channel
/// disconnects it.
pub struct StateChannel {
    shared: Arc<Shared>,
}

impl StateChannel {
    /// Create a closed channel
    pub fn new(
        transport: Arc<dyn ControllerTransport>,
        store: UiStateStore,
        bus: Arc<EventBus>,
        config: StateChannelConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            shared: Arc::new(Shared {
                transport,
                store,
                bus,
                config,
                slot: laserdeck_core::thread_safe(Slot {
                    generation: 0,
                    task: None,
                }),
                state_tx,
                attempts: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Open the stream unless one is already open or being opened
    ///
    /// A pending reconnect timer is cancelled and replaced by an immediate
    /// attempt.
    pub fn connect(&self) {
        let mut slot = self.shared.slot.lock();
        if self.shared.state() != ConnectionState::Closed {
            tracing::trace!("connect() ignored, channel is {}", self.shared.state());
            return;
        }

        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.generation += 1;
        let generation = slot.generation;
        self.shared.state_tx.send_replace(ConnectionState::Connecting);
        slot.task = Some(tokio::spawn(run(self.shared.clone(), generation)));
    }

    /// Close the stream and stop reconnecting
    ///
    /// Bus handlers see the `Disconnected` event after the channel lock is
    /// released and may call back into the channel.
    pub fn disconnect(&self) {
        let previous = {
            let mut slot = self.shared.slot.lock();
            slot.generation += 1;
            if let Some(task) = slot.task.take() {
                task.abort();
            }
            self.shared.state_tx.send_replace(ConnectionState::Closed)
        };
        if previous != ConnectionState::Closed {
            tracing::info!("State stream closed by client");
            self.shared
                .bus
                .publish(AppEvent::Connection(ConnectionEvent::Disconnected {
                    reason: "closed by client".to_string(),
                }));
        }
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Receiver that follows the connection state
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Connection attempts made over the channel's lifetime
    pub fn attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Pushed payloads that could not be mirrored
    pub fn dropped_payloads(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Reconnect delay in use
    pub fn config(&self) -> &StateChannelConfig {
        &self.shared.config
    }
}

impl Drop for StateChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for StateChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateChannel")
            .field("state", &self.connection_state())
            .field("attempts", &self.attempts())
            .field("dropped_payloads", &self.dropped_payloads())
            .finish()
    }
}
