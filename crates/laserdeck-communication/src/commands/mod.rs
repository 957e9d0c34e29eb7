//! Controller commands
//!
//! Every operator action becomes one [`Command`]. A command knows its wire
//! name, the endpoint it is posted to and the parameters it carries; the
//! envelope key (`command` or `action`) is chosen by the caller's settings.

pub mod bindings;

use laserdeck_settings::CommandEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub use bindings::{
    control_for_id, jog_vector_for_id, resolve, Control, ControlPanel, UiEvent, CONTROL_BINDINGS,
    JOG_BINDINGS, STEP_SIZES,
};

/// Parameters of a print job start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintRequest {
    /// Job file on the controller
    pub file: String,
    /// Laser power level
    pub laser_power: u32,
    /// Exposures per scan line
    pub exposure_per_line: u32,
    /// Expose with a single prism facet
    pub single_facet: bool,
}

/// Endpoint a command is posted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Generic command endpoint
    Command,
    /// Movement endpoint
    Move,
    /// Reboot endpoint
    Reset,
}

/// Operator action sent to the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Jog the head by `steps` millimetres along the direction `vector`
    Move {
        /// Axis direction, one component per axis (x, y, z)
        vector: [i32; 3],
        /// Distance in millimetres
        steps: f64,
    },
    /// Switch the laser on or off
    ToggleLaser,
    /// Start or stop the prism motor
    TogglePrism,
    /// Run the laser diode self test
    DiodeTest,
    /// Start exposing a job file
    StartPrint(PrintRequest),
    /// Abort the running job
    StopPrint,
    /// Pause or resume the running job
    PausePrint,
    /// Delete a job file from controller storage
    DeleteFile {
        /// File name on the controller
        file: String,
    },
    /// Restart the controller
    Reboot,
    /// Join another wireless network
    ChangeWifi {
        /// Network name
        ssid: String,
        /// Network password
        password: String,
    },
    /// Start the remote Python shell service
    StartWebRepl,
}

impl Command {
    /// Name of the command on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Command::Move { .. } => "move",
            Command::ToggleLaser => "togglelaser",
            Command::TogglePrism => "toggleprism",
            Command::DiodeTest => "diodetest",
            Command::StartPrint(_) => "startprint",
            Command::StopPrint => "stopprint",
            Command::PausePrint => "pauseprint",
            Command::DeleteFile { .. } => "deletefile",
            Command::Reboot => "reboot",
            Command::ChangeWifi { .. } => "changewifi",
            Command::StartWebRepl => "startwebrepl",
        }
    }

    /// Endpoint the command is posted to
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Command::Move { .. } => Endpoint::Move,
            Command::Reboot => Endpoint::Reset,
            _ => Endpoint::Command,
        }
    }

    /// Parameters sent next to the command name
    pub fn params(&self) -> Map<String, Value> {
        let params = match self {
            Command::Move { vector, steps } => json!({ "vector": vector, "steps": steps }),
            Command::StartPrint(request) => json!({
                "file": request.file,
                "laserpower": request.laser_power,
                "exposureperline": request.exposure_per_line,
                "singlefacet": request.single_facet,
            }),
            Command::DeleteFile { file } => json!({ "file": file }),
            Command::ChangeWifi { ssid, password } => {
                json!({ "wifi": ssid, "password": password })
            }
            _ => return Map::new(),
        };
        match params {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Full request body
    pub fn to_body(&self, envelope: CommandEnvelope) -> Value {
        let mut body = Map::new();
        body.insert(envelope.key().to_string(), Value::from(self.name()));
        body.extend(self.params());
        Value::Object(body)
    }

    /// Question the operator must answer before the command is sent
    pub fn confirmation_prompt(&self) -> Option<String> {
        match self {
            Command::DeleteFile { file } => Some(format!("Delete {} from the controller?", file)),
            Command::Reboot => Some("Are you sure you want to reboot the system?".to_string()),
            Command::ChangeWifi { ssid, .. } => Some(format!(
                "Switch the controller to network {}? The connection will drop.",
                ssid
            )),
            _ => None,
        }
    }

    /// Command is destructive or disruptive
    pub fn requires_confirmation(&self) -> bool {
        self.confirmation_prompt().is_some()
    }

    /// Command changes the controller's file listing
    pub fn changes_listing(&self) -> bool {
        matches!(self, Command::DeleteFile { .. } | Command::StartPrint(_))
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bodies_use_envelope_key() {
        assert_eq!(
            Command::ToggleLaser.to_body(CommandEnvelope::Command),
            json!({"command": "togglelaser"})
        );
        assert_eq!(
            Command::ToggleLaser.to_body(CommandEnvelope::Action),
            json!({"action": "togglelaser"})
        );
    }

    #[test]
    fn test_parameterised_bodies() {
        let start = Command::StartPrint(PrintRequest {
            file: "job.bin".to_string(),
            laser_power: 120,
            exposure_per_line: 2,
            single_facet: true,
        });
        assert_eq!(
            start.to_body(CommandEnvelope::Command),
            json!({
                "command": "startprint",
                "file": "job.bin",
                "laserpower": 120,
                "exposureperline": 2,
                "singlefacet": true
            })
        );

        let jog = Command::Move {
            vector: [0, -1, 0],
            steps: 0.1,
        };
        assert_eq!(
            jog.to_body(CommandEnvelope::Command),
            json!({"command": "move", "vector": [0, -1, 0], "steps": 0.1})
        );

        let wifi = Command::ChangeWifi {
            ssid: "shop".to_string(),
            password: "hunter2".to_string(),
        };
        assert_eq!(
            wifi.to_body(CommandEnvelope::Action),
            json!({"action": "changewifi", "wifi": "shop", "password": "hunter2"})
        );
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(
            Command::Move {
                vector: [1, 0, 0],
                steps: 10.0
            }
            .endpoint(),
            Endpoint::Move
        );
        assert_eq!(Command::Reboot.endpoint(), Endpoint::Reset);
        assert_eq!(Command::StartWebRepl.endpoint(), Endpoint::Command);
    }

    #[test]
    fn test_confirmation_gate() {
        assert!(Command::Reboot.requires_confirmation());
        assert!(Command::DeleteFile {
            file: "a".to_string()
        }
        .requires_confirmation());
        assert!(!Command::ToggleLaser.requires_confirmation());
        assert!(!Command::StopPrint.requires_confirmation());
    }
}
