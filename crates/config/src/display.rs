use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Display {
    /// Hide the status window's stop button for the whole OS install session.
    pub suppress_stop_button: bool,
}
