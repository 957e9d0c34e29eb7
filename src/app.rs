//! Session wiring
//!
//! A [`Session`] owns one of each channel, all sharing the same store, event
//! bus and transport. Front ends hold a session and never build channels
//! themselves.

use anyhow::Context;
use laserdeck_communication::{
    CommandDispatcher, Confirmer, ControllerTransport, DispatcherConfig, HttpTransport,
    StateChannel, StateChannelConfig, UploadManager, UploadSource, UploadTask,
};
use laserdeck_core::{EventBus, UiStateStore};
use laserdeck_settings::ClientSettings;
use std::path::Path;
use std::sync::Arc;

/// Running connection to one controller
pub struct Session {
    settings: ClientSettings,
    store: UiStateStore,
    bus: Arc<EventBus>,
    channel: StateChannel,
    dispatcher: CommandDispatcher,
    uploads: UploadManager,
}

impl Session {
    /// Build a session talking HTTP to the controller in `settings`
    pub fn new(settings: ClientSettings, confirmer: Arc<dyn Confirmer>) -> anyhow::Result<Self> {
        settings.validate().context("invalid client settings")?;
        let transport = HttpTransport::new(settings.connection.clone())
            .with_context(|| format!("cannot use controller at {}", settings.connection.base_url))?;
        Ok(Self::with_transport(settings, Arc::new(transport), confirmer))
    }

    /// Build a session over any transport
    pub fn with_transport(
        settings: ClientSettings,
        transport: Arc<dyn ControllerTransport>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        let store = UiStateStore::new();
        let bus = Arc::new(EventBus::new());

        let channel = StateChannel::new(
            transport.clone(),
            store.clone(),
            bus.clone(),
            StateChannelConfig::from_settings(&settings.connection),
        );
        let dispatcher = CommandDispatcher::new(
            transport.clone(),
            store.clone(),
            bus.clone(),
            confirmer,
            DispatcherConfig::from_settings(&settings),
        );
        let uploads = UploadManager::new(transport, bus.clone());

        Self {
            settings,
            store,
            bus,
            channel,
            dispatcher,
            uploads,
        }
    }

    /// Start mirroring the controller state
    pub fn start(&self) {
        tracing::info!("Connecting to {}", self.settings.connection.base_url);
        self.channel.connect();
    }

    /// Drop the state stream and open a fresh one
    ///
    /// Used after the controller restarted.
    pub fn reload(&self) {
        tracing::info!("Reloading controller state");
        self.channel.disconnect();
        self.channel.connect();
    }

    /// Stop everything that is running
    pub fn shutdown(&self) {
        self.uploads.cancel();
        self.channel.disconnect();
    }

    /// Upload a local job file, or report that none was chosen
    pub async fn upload_file(&self, path: Option<&Path>) -> laserdeck_core::Result<UploadTask> {
        let source = match path {
            Some(path) => Some(UploadSource::from_path(path, self.settings.upload.chunk_size).await?),
            None => None,
        };
        Ok(self.uploads.start_upload(source)?)
    }

    /// Client settings in use
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Mirrored machine state
    pub fn store(&self) -> &UiStateStore {
        &self.store
    }

    /// Event bus shared by the channels
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Push channel
    pub fn channel(&self) -> &StateChannel {
        &self.channel
    }

    /// Command dispatcher
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Upload manager
    pub fn uploads(&self) -> &UploadManager {
        &self.uploads
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("controller", &self.settings.connection.base_url)
            .field("channel", &self.channel)
            .field("uploads", &self.uploads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use laserdeck_communication::{AutoConfirm, BackendResponse, EventStream, ServerEvent, UploadBody};
    use laserdeck_core::{ConnectionError, Error, UploadError};

    struct OneShotController;

    #[async_trait]
    impl ControllerTransport for OneShotController {
        async fn open_event_stream(&self) -> Result<EventStream, ConnectionError> {
            let event = ServerEvent::message(r#"{"printing":true,"files":["a.bin"]}"#);
            Ok(stream::iter(vec![Ok(event)]).chain(stream::pending()).boxed())
        }

        async fn post_json(
            &self,
            _path: &str,
            _body: &serde_json::Value,
        ) -> Result<BackendResponse, ConnectionError> {
            Ok(BackendResponse::new(200, ""))
        }

        async fn upload(&self, _upload: UploadBody) -> Result<BackendResponse, ConnectionError> {
            Ok(BackendResponse::new(200, ""))
        }
    }

    fn session() -> Session {
        Session::with_transport(
            ClientSettings::default(),
            Arc::new(OneShotController),
            Arc::new(AutoConfirm(true)),
        )
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let mut settings = ClientSettings::default();
        settings.connection.base_url = "controller.local".to_string();
        assert!(Session::new(settings, Arc::new(AutoConfirm(true))).is_err());
    }

    #[tokio::test]
    async fn test_start_mirrors_state() {
        let session = session();
        session.start();
        let mut revisions = session.store().subscribe();
        revisions.wait_for(|revision| *revision >= 1).await.unwrap();
        assert!(session.store().is_printing());
        assert_eq!(session.store().files(), vec!["a.bin".to_string()]);
        session.shutdown();
    }

    #[tokio::test]
    async fn test_upload_without_file() {
        let session = session();
        assert_eq!(
            session.upload_file(None).await.unwrap_err(),
            Error::Upload(UploadError::NoFileSelected)
        );

        let missing = session
            .upload_file(Some(Path::new("/nonexistent/job.bin")))
            .await
            .unwrap_err();
        assert!(matches!(missing, Error::Upload(UploadError::Source { .. })));
        assert!(!session.uploads().is_uploading());
    }
}
