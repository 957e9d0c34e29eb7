//! Data models for the controller's pushed machine state
//!
//! This module provides:
//! - The full machine state mirrored by the client ([`MachineState`])
//! - Print job and component status records
//! - The three-valued diode self-test result
//! - Partial state documents as pushed or echoed by the controller ([`StateUpdate`])
//!
//! Field names on the wire are the controller's lowercase keys
//! (`currentline`, `totallines`, `diodetest`, ...).

mod wire;

pub use wire::LEGACY_FLAT_KEYS;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use wire::lenient_uint;

/// Outcome of the laser diode self-test
///
/// Carried on the wire as `null` (not run), `true` (pass) or `false` (fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum DiodeTest {
    /// Test has not been run (or is running)
    #[default]
    NotRun,
    /// Diode responded
    Passed,
    /// Diode did not respond
    Failed,
}

impl From<Option<bool>> for DiodeTest {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => DiodeTest::NotRun,
            Some(true) => DiodeTest::Passed,
            Some(false) => DiodeTest::Failed,
        }
    }
}

impl From<DiodeTest> for Option<bool> {
    fn from(value: DiodeTest) -> Self {
        match value {
            DiodeTest::NotRun => None,
            DiodeTest::Passed => Some(true),
            DiodeTest::Failed => Some(false),
        }
    }
}

impl fmt::Display for DiodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiodeTest::NotRun => write!(f, "Diode test not run."),
            DiodeTest::Passed => write!(f, "Diode test successful."),
            DiodeTest::Failed => write!(f, "Diode test failed."),
        }
    }
}

/// Details of the job currently being exposed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintJob {
    /// Name of the job file on the controller
    pub filename: String,
    /// Line currently being exposed
    #[serde(rename = "currentline", deserialize_with = "lenient_uint")]
    pub current_line: u32,
    /// Number of lines in the job
    #[serde(rename = "totallines", deserialize_with = "lenient_uint")]
    pub total_lines: u32,
    /// Seconds elapsed since the print started
    #[serde(rename = "printingtime", deserialize_with = "lenient_uint")]
    pub elapsed_seconds: u64,
    /// How many times each line is exposed
    #[serde(rename = "exposureperline", deserialize_with = "lenient_uint")]
    pub exposure_per_line: u32,
    /// Laser power in controller units
    #[serde(rename = "laserpower", deserialize_with = "lenient_uint")]
    pub laser_power: u32,
    /// Expose with a single prism facet
    #[serde(rename = "singlefacet")]
    pub single_facet: bool,
}

impl PrintJob {
    /// Progress through the job as a whole percentage
    ///
    /// Defined as 0 when the job has no lines.
    pub fn progress_percent(&self) -> u32 {
        if self.total_lines == 0 {
            return 0;
        }
        (f64::from(self.current_line) / f64::from(self.total_lines) * 100.0).round() as u32
    }

    /// Elapsed print time
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs(self.elapsed_seconds)
    }

    /// Restore `current_line <= total_lines` for jobs with a known length.
    ///
    /// Returns true if the job had to be clamped.
    pub(crate) fn clamp_progress(&mut self) -> bool {
        if self.total_lines > 0 && self.current_line > self.total_lines {
            self.current_line = self.total_lines;
            return true;
        }
        false
    }
}

/// Status of the laser head hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentStatus {
    /// Prism motor is turning
    pub rotating: bool,
    /// Laser is enabled
    pub laser: bool,
    /// Result of the last diode self-test
    #[serde(rename = "diodetest")]
    pub diode_test: DiodeTest,
}

/// Wireless network status reported by the controller
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiStatus {
    /// Controller is associated with an access point
    pub connected: bool,
    /// Networks visible to the controller
    pub available: Vec<String>,
    /// Configured network name
    pub ssid: String,
}

/// Complete mirror of the controller state
///
/// Starts zero-valued and is only ever changed by applying a [`StateUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MachineState {
    /// A job is being exposed
    pub printing: bool,
    /// The running job is paused
    pub paused: bool,
    /// Current or last job
    pub job: PrintJob,
    /// Hardware status
    pub components: ComponentStatus,
    /// Job files stored on the controller
    pub files: Vec<String>,
    /// Wireless status
    pub wifi: WifiStatus,
}

impl MachineState {
    /// Merge a partial update into this state
    ///
    /// Last write wins per top-level field; absent fields keep their value.
    /// Nested records are replaced as a whole, never merged field by field.
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            printing,
            paused,
            job,
            components,
            files,
            wifi,
        } = update;

        if let Some(printing) = printing {
            self.printing = printing;
        }
        if let Some(paused) = paused {
            self.paused = paused;
        }
        if let Some(job) = job {
            self.job = job;
        }
        if let Some(components) = components {
            self.components = components;
        }
        if let Some(files) = files {
            self.files = files;
        }
        if let Some(wifi) = wifi {
            self.wifi = wifi;
        }
    }
}

/// Partial state document pushed over the event stream or echoed by a command
///
/// Every top-level field is optional. Use [`StateUpdate::from_json`] to parse
/// wire payloads; it also migrates the legacy flat document shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateUpdate {
    /// A job is being exposed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printing: Option<bool>,
    /// The running job is paused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    /// Replacement job record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<PrintJob>,
    /// Replacement component record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentStatus>,
    /// Replacement file listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Replacement wireless status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<WifiStatus>,
}

impl StateUpdate {
    /// True when the update carries no field at all
    pub fn is_empty(&self) -> bool {
        self.printing.is_none()
            && self.paused.is_none()
            && self.job.is_none()
            && self.components.is_none()
            && self.files.is_none()
            && self.wifi.is_none()
    }

    /// Update that carries every field of `state`
    pub fn full(state: &MachineState) -> Self {
        Self {
            printing: Some(state.printing),
            paused: Some(state.paused),
            job: Some(state.job.clone()),
            components: Some(state.components),
            files: Some(state.files.clone()),
            wifi: Some(state.wifi.clone()),
        }
    }
}

impl From<MachineState> for StateUpdate {
    fn from(state: MachineState) -> Self {
        Self::full(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diode_test_wire_values() {
        let c: ComponentStatus = serde_json::from_str(r#"{"diodetest":null}"#).unwrap();
        assert_eq!(c.diode_test, DiodeTest::NotRun);
        let c: ComponentStatus = serde_json::from_str(r#"{"diodetest":true}"#).unwrap();
        assert_eq!(c.diode_test, DiodeTest::Passed);
        let c: ComponentStatus = serde_json::from_str(r#"{"diodetest":false}"#).unwrap();
        assert_eq!(c.diode_test, DiodeTest::Failed);
        let c: ComponentStatus = serde_json::from_str(r#"{"laser":true}"#).unwrap();
        assert_eq!(c.diode_test, DiodeTest::NotRun);

        let json = serde_json::to_value(ComponentStatus::default()).unwrap();
        assert!(json["diodetest"].is_null());
    }

    #[test]
    fn test_progress_percent_edges() {
        let mut job = PrintJob::default();
        assert_eq!(job.progress_percent(), 0);

        job.total_lines = 200;
        job.current_line = 50;
        assert_eq!(job.progress_percent(), 25);

        job.current_line = 200;
        assert_eq!(job.progress_percent(), 100);

        job.total_lines = 3;
        job.current_line = 1;
        assert_eq!(job.progress_percent(), 33);
        job.current_line = 2;
        assert_eq!(job.progress_percent(), 67);
    }

    #[test]
    fn test_apply_replaces_nested_records_whole() {
        let mut state = MachineState::default();
        state.job.filename = "old.bin".to_string();
        state.job.laser_power = 130;

        state.apply(StateUpdate {
            job: Some(PrintJob {
                filename: "new.bin".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert_eq!(state.job.filename, "new.bin");
        assert_eq!(state.job.laser_power, 0);
    }

    #[test]
    fn test_full_update_round_trips_state() {
        let mut state = MachineState::default();
        state.printing = true;
        state.files = vec!["a.bin".to_string()];

        let mut other = MachineState::default();
        other.apply(StateUpdate::full(&state));
        assert_eq!(other, state);
    }
}
