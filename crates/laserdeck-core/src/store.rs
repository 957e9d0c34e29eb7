//! State store mirroring the controller
//!
//! [`UiStateStore`] is the one mutable copy of the machine state on the client.
//! It is created explicitly and handed to whoever needs it; the state channel
//! and the command dispatcher are its only writers, and both go through
//! [`UiStateStore::update`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::data::{ComponentStatus, MachineState, PrintJob, StateUpdate, WifiStatus};
use crate::types::{thread_safe_rw, ThreadSafeRw};

struct StoreInner {
    state: ThreadSafeRw<MachineState>,
    revision: watch::Sender<u64>,
}

/// Cloneable handle to the mirrored machine state
///
/// Clones share the same state. Reads take a short read lock and hand out
/// copies, so no lock is ever held across an await point.
#[derive(Clone)]
pub struct UiStateStore {
    inner: Arc<StoreInner>,
}

impl UiStateStore {
    /// Create a store holding zero-valued defaults
    pub fn new() -> Self {
        Self::with_state(MachineState::default())
    }

    /// Create a store seeded with `state`
    pub fn with_state(state: MachineState) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                state: thread_safe_rw(state),
                revision,
            }),
        }
    }

    /// Merge a partial update into the mirror
    ///
    /// Never fails. Fields absent from `update` keep their current value.
    /// Returns the new revision number.
    pub fn update(&self, update: StateUpdate) -> u64 {
        {
            let mut state = self.inner.state.write();
            state.apply(update);
        }
        let mut revision = 0;
        self.inner.revision.send_modify(|r| {
            *r += 1;
            revision = *r;
        });
        tracing::trace!("State store at revision {}", revision);
        revision
    }

    /// Copy of the full mirrored state
    pub fn snapshot(&self) -> MachineState {
        self.inner.state.read().clone()
    }

    /// Number of updates applied so far
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    /// Receiver that wakes whenever an update is applied
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Job progress as a whole percentage, 0 when the job length is unknown
    pub fn progress_percent(&self) -> u32 {
        self.inner.state.read().job.progress_percent()
    }

    /// A job is being exposed
    pub fn is_printing(&self) -> bool {
        self.inner.state.read().printing
    }

    /// The running job is paused
    pub fn is_paused(&self) -> bool {
        self.inner.state.read().paused
    }

    /// Current job record
    pub fn job(&self) -> PrintJob {
        self.inner.state.read().job.clone()
    }

    /// Current hardware status
    pub fn components(&self) -> ComponentStatus {
        self.inner.state.read().components
    }

    /// Job files on the controller
    pub fn files(&self) -> Vec<String> {
        self.inner.state.read().files.clone()
    }

    /// Wireless status
    pub fn wifi(&self) -> WifiStatus {
        self.inner.state.read().wifi.clone()
    }

    /// Elapsed print time of the current job
    pub fn elapsed(&self) -> Duration {
        self.inner.state.read().job.elapsed()
    }
}

impl Default for UiStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UiStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiStateStore")
            .field("revision", &self.revision())
            .field("state", &*self.inner.state.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DiodeTest;

    #[test]
    fn test_store_starts_zeroed() {
        let store = UiStateStore::new();
        assert_eq!(store.snapshot(), MachineState::default());
        assert_eq!(store.revision(), 0);
        assert_eq!(store.progress_percent(), 0);
    }

    #[test]
    fn test_example_progress_from_push() {
        let store = UiStateStore::new();
        let update =
            StateUpdate::from_json(r#"{"printing":true,"job":{"currentline":50,"totallines":200}}"#)
                .unwrap();
        store.update(update);
        assert!(store.is_printing());
        assert_eq!(store.progress_percent(), 25);
    }

    #[test]
    fn test_missing_job_leaves_previous_job() {
        let store = UiStateStore::new();
        store.update(
            StateUpdate::from_json(r#"{"job":{"filename":"a.bin","totallines":10}}"#).unwrap(),
        );
        store.update(StateUpdate::from_json(r#"{"components":{"laser":true}}"#).unwrap());

        assert_eq!(store.job().filename, "a.bin");
        assert_eq!(store.job().total_lines, 10);
        assert!(store.components().laser);
        assert_eq!(store.components().diode_test, DiodeTest::NotRun);
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let store = UiStateStore::new();
        let other = store.clone();
        store.update(StateUpdate {
            paused: Some(true),
            ..Default::default()
        });
        assert!(other.is_paused());
    }

    #[tokio::test]
    async fn test_subscribers_see_revisions() {
        let store = UiStateStore::new();
        let mut rx = store.subscribe();
        store.update(StateUpdate {
            printing: Some(true),
            ..Default::default()
        });
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
