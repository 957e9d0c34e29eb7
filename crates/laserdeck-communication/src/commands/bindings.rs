//! Front-end control bindings
//!
//! Front ends do not build commands themselves. They look up the control id
//! the operator activated in [`CONTROL_BINDINGS`] or [`JOG_BINDINGS`], wrap it
//! in a [`UiEvent`] and hand it to [`resolve`] together with the current
//! [`ControlPanel`].

use serde::{Deserialize, Serialize};

use super::{Command, PrintRequest};

/// Jog step sizes offered to the operator, in millimetres
pub const STEP_SIZES: &[f64] = &[0.1, 1.0, 10.0, 100.0];

/// Button-like controls that map to a single command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    /// Laser on/off
    Laser,
    /// Prism motor on/off
    Prism,
    /// Diode self test
    DiodeTest,
    /// Abort the running job
    Stop,
    /// Pause or resume the running job
    Pause,
    /// Restart the controller
    Reboot,
    /// Start the remote shell
    WebRepl,
}

/// Control ids as used by front ends
pub const CONTROL_BINDINGS: &[(&str, Control)] = &[
    ("laser", Control::Laser),
    ("prism", Control::Prism),
    ("diode", Control::DiodeTest),
    ("stop", Control::Stop),
    ("pause", Control::Pause),
    ("reboot", Control::Reboot),
    ("webrepl", Control::WebRepl),
];

/// Jog button ids and the direction they move the head in
pub const JOG_BINDINGS: &[(&str, [i32; 3])] = &[
    ("x+", [1, 0, 0]),
    ("x-", [-1, 0, 0]),
    ("y+", [0, 1, 0]),
    ("y-", [0, -1, 0]),
    ("z+", [0, 0, 1]),
    ("z-", [0, 0, -1]),
];

/// Look up a button control by id
pub fn control_for_id(id: &str) -> Option<Control> {
    CONTROL_BINDINGS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(id))
        .map(|(_, control)| *control)
}

/// Look up a jog direction by button id
pub fn jog_vector_for_id(id: &str) -> Option<[i32; 3]> {
    JOG_BINDINGS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(id))
        .map(|(_, vector)| *vector)
}

/// Something the operator did in a front end
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// A button control was activated
    Control(Control),
    /// A jog button was pressed
    Jog {
        /// Direction of travel
        vector: [i32; 3],
    },
    /// A different jog step size was picked
    SelectStep(f64),
    /// The print form was submitted
    StartPrint(PrintRequest),
    /// A file was chosen for deletion
    DeleteFile(String),
    /// The wireless form was submitted
    ChangeWifi {
        /// Network name
        ssid: String,
        /// Network password
        password: String,
    },
}

/// Front-end state that commands depend on
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPanel {
    step: f64,
}

impl ControlPanel {
    /// Panel with the default 10 mm jog step
    pub fn new() -> Self {
        Self { step: 10.0 }
    }

    /// Current jog step in millimetres
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Record panel-local changes carried by `event`
    ///
    /// Returns true when the panel changed. Non-positive or non-finite
    /// step sizes are ignored.
    pub fn observe(&mut self, event: &UiEvent) -> bool {
        match event {
            UiEvent::SelectStep(step) if step.is_finite() && *step > 0.0 => {
                self.step = *step;
                true
            }
            _ => false,
        }
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a front-end event into the command it stands for
///
/// Pure: the panel is only read. Events that do not talk to the controller
/// (step selection, empty selections) resolve to `None`.
pub fn resolve(event: &UiEvent, panel: &ControlPanel) -> Option<Command> {
    let command = match event {
        UiEvent::Control(control) => match control {
            Control::Laser => Command::ToggleLaser,
            Control::Prism => Command::TogglePrism,
            Control::DiodeTest => Command::DiodeTest,
            Control::Stop => Command::StopPrint,
            Control::Pause => Command::PausePrint,
            Control::Reboot => Command::Reboot,
            Control::WebRepl => Command::StartWebRepl,
        },
        UiEvent::Jog { vector } => Command::Move {
            vector: *vector,
            steps: panel.step(),
        },
        UiEvent::SelectStep(_) => return None,
        UiEvent::StartPrint(request) => {
            if request.file.trim().is_empty() {
                return None;
            }
            Command::StartPrint(request.clone())
        }
        UiEvent::DeleteFile(file) => {
            if file.trim().is_empty() {
                return None;
            }
            Command::DeleteFile { file: file.clone() }
        }
        UiEvent::ChangeWifi { ssid, password } => {
            if ssid.trim().is_empty() {
                return None;
            }
            Command::ChangeWifi {
                ssid: ssid.clone(),
                password: password.clone(),
            }
        }
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_control_resolves() {
        let panel = ControlPanel::new();
        for (id, control) in CONTROL_BINDINGS {
            let command = resolve(&UiEvent::Control(*control), &panel);
            assert!(command.is_some(), "{} has no command", id);
        }
        assert_eq!(
            resolve(&UiEvent::Control(Control::Laser), &panel),
            Some(Command::ToggleLaser)
        );
    }

    #[test]
    fn test_jog_uses_panel_step() {
        let mut panel = ControlPanel::new();
        let jog = UiEvent::Jog {
            vector: jog_vector_for_id("y-").unwrap(),
        };
        assert_eq!(
            resolve(&jog, &panel),
            Some(Command::Move {
                vector: [0, -1, 0],
                steps: 10.0
            })
        );

        assert!(panel.observe(&UiEvent::SelectStep(0.1)));
        assert_eq!(resolve(&UiEvent::SelectStep(0.1), &panel), None);
        assert_eq!(
            resolve(&jog, &panel),
            Some(Command::Move {
                vector: [0, -1, 0],
                steps: 0.1
            })
        );
    }

    #[test]
    fn test_invalid_step_is_ignored() {
        let mut panel = ControlPanel::new();
        assert!(!panel.observe(&UiEvent::SelectStep(0.0)));
        assert!(!panel.observe(&UiEvent::SelectStep(f64::NAN)));
        assert_eq!(panel.step(), 10.0);
    }

    #[test]
    fn test_lookup_by_id() {
        assert_eq!(control_for_id("REBOOT"), Some(Control::Reboot));
        assert_eq!(control_for_id("self-destruct"), None);
        assert_eq!(jog_vector_for_id("z+"), Some([0, 0, 1]));
        assert_eq!(jog_vector_for_id("w+"), None);
    }

    #[test]
    fn test_empty_selections_send_nothing() {
        let panel = ControlPanel::new();
        assert_eq!(resolve(&UiEvent::DeleteFile("  ".to_string()), &panel), None);
        assert_eq!(
            resolve(
                &UiEvent::ChangeWifi {
                    ssid: String::new(),
                    password: "x".to_string()
                },
                &panel
            ),
            None
        );
    }
}
