//! Command dispatcher
//!
//! Sends one request per [`Command`], applies any state echo carried by the
//! response and tells the front end what to do next. There is no queue: each
//! call is an independent request and concurrent calls run concurrently.

use async_trait::async_trait;
use laserdeck_core::{
    AppEvent, CommandError, CommandEvent, EventBus, MachineEvent, PageAction, StateUpdate,
    UiStateStore, UpdateSource,
};
use laserdeck_settings::{ClientSettings, CommandEnvelope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::commands::{resolve, Command, ControlPanel, Endpoint, UiEvent};
use crate::communication::{BackendResponse, ControllerTransport};

/// Asks the operator to approve a destructive command
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Show `prompt` and return the operator's answer
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Confirmer that always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!("Auto-answering '{}' with {}", prompt, self.0);
        self.0
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Key carrying the command name
    pub envelope: CommandEnvelope,
    /// Generic command endpoint
    pub command_path: String,
    /// Movement endpoint
    pub move_path: String,
    /// Reboot endpoint
    pub reset_path: String,
    /// Wait before reloading after a reboot
    pub reboot_reload_delay: Duration,
    /// Remote shell port, shown to the operator
    pub webrepl_port: u16,
    /// Remote shell address
    pub webrepl_url: String,
    /// Wait before redirecting to the remote shell
    pub webrepl_redirect_delay: Duration,
}

impl DispatcherConfig {
    /// Configuration from the client settings
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            envelope: settings.commands.envelope,
            command_path: settings.connection.command_path.clone(),
            move_path: settings.connection.move_path.clone(),
            reset_path: settings.connection.reset_path.clone(),
            reboot_reload_delay: Duration::from_millis(settings.session.reboot_reload_delay_ms),
            webrepl_port: settings.session.webrepl_port,
            webrepl_url: settings.webrepl_url(),
            webrepl_redirect_delay: Duration::from_millis(
                settings.session.webrepl_redirect_delay_ms,
            ),
        }
    }

    fn path(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Command => &self.command_path,
            Endpoint::Move => &self.move_path,
            Endpoint::Reset => &self.reset_path,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_settings(&ClientSettings::default())
    }
}

/// Outcome of a dispatched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Controller accepted the command
    Sent {
        /// Response carried a state snapshot that was applied
        echoed: bool,
        /// What the front end should do next
        follow_up: Option<PageAction>,
    },
    /// Operator declined the confirmation; nothing was sent
    Declined,
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sends operator commands to the controller
pub struct CommandDispatcher {
    transport: Arc<dyn ControllerTransport>,
    store: UiStateStore,
    bus: Arc<EventBus>,
    confirmer: Arc<dyn Confirmer>,
    config: DispatcherConfig,
    in_flight: Arc<AtomicUsize>,
}

impl CommandDispatcher {
    /// Create a dispatcher
    pub fn new(
        transport: Arc<dyn ControllerTransport>,
        store: UiStateStore,
        bus: Arc<EventBus>,
        confirmer: Arc<dyn Confirmer>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            transport,
            store,
            bus,
            confirmer,
            config,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Send `command`
    ///
    /// Commands that need confirmation ask the [`Confirmer`] first and
    /// return [`Dispatch::Declined`] without any request when refused.
    /// Failures are published as error notices before being returned.
    pub async fn send(&self, command: &Command) -> Result<Dispatch, CommandError> {
        let name = command.name();

        if let Some(prompt) = command.confirmation_prompt() {
            if !self.confirmer.confirm(&prompt).await {
                tracing::info!("{} not confirmed, nothing sent", name);
                self.bus.publish(AppEvent::Command(CommandEvent::Declined {
                    command: name.to_string(),
                }));
                return Ok(Dispatch::Declined);
            }
        }

        let _in_flight = InFlight::enter(&self.in_flight);
        let path = self.config.path(command.endpoint());
        let body = command.to_body(self.config.envelope);

        tracing::debug!("Sending {} to {}", name, path);
        self.bus.publish(AppEvent::Command(CommandEvent::Sent {
            command: name.to_string(),
        }));

        let response = match self.request(path, &body).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("{} failed: {}", name, e);
                self.bus.publish(AppEvent::Command(CommandEvent::Failed {
                    command: name.to_string(),
                    error: e.to_string(),
                }));
                self.bus
                    .publish(AppEvent::error_notice(format!("Command failed: {}", e)));
                return Err(e);
            }
        };

        let echoed = self.apply_echo(name, &response);
        self.bus.publish(AppEvent::Command(CommandEvent::Succeeded {
            command: name.to_string(),
            echoed,
        }));

        let follow_up = self.follow_up(command);
        if let Some(action) = &follow_up {
            self.bus.publish(AppEvent::Page(action.clone()));
        }

        Ok(Dispatch::Sent { echoed, follow_up })
    }

    /// Resolve a front-end event and send the resulting command
    ///
    /// Returns `Ok(None)` for events that do not talk to the controller.
    pub async fn send_event(
        &self,
        event: &UiEvent,
        panel: &ControlPanel,
    ) -> Result<Option<Dispatch>, CommandError> {
        match resolve(event, panel) {
            Some(command) => self.send(&command).await.map(Some),
            None => Ok(None),
        }
    }

    /// Number of requests currently awaiting a response
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Dispatcher configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    async fn request(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<BackendResponse, CommandError> {
        let response = self.transport.post_json(path, body).await?;
        if response.is_success() {
            return Ok(response);
        }
        let status = response.status;
        Err(CommandError::Rejected {
            status,
            reason: response
                .reason()
                .unwrap_or_else(|| format!("controller answered HTTP {}", status)),
        })
    }

    fn apply_echo(&self, name: &str, response: &BackendResponse) -> bool {
        if response.is_blank() {
            return false;
        }
        match StateUpdate::from_json(&response.text()) {
            Ok(update) => {
                let revision = self.store.update(update);
                self.bus.publish(AppEvent::Machine(MachineEvent::StateUpdated {
                    revision,
                    source: UpdateSource::CommandEcho,
                }));
                true
            }
            Err(e) => {
                tracing::debug!("{} response is not a state echo: {}", name, e);
                false
            }
        }
    }

    fn follow_up(&self, command: &Command) -> Option<PageAction> {
        match command {
            _ if command.changes_listing() => Some(PageAction::Refresh),
            Command::Reboot => {
                let delay = self.config.reboot_reload_delay;
                self.bus.publish(AppEvent::info_notice(format!(
                    "System is rebooting. Page will reload in {} seconds.",
                    delay.as_secs()
                )));
                Some(PageAction::ReloadAfter {
                    delay_ms: delay.as_millis() as u64,
                })
            }
            Command::StartWebRepl => {
                self.bus.publish(AppEvent::info_notice(format!(
                    "Please connect to webrepl port {}.",
                    self.config.webrepl_port
                )));
                Some(PageAction::RedirectAfter {
                    url: self.config.webrepl_url.clone(),
                    delay_ms: self.config.webrepl_redirect_delay.as_millis() as u64,
                })
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
