#![forbid(unsafe_code)]

use tracing::{debug, error, info};

/// Percent value meaning "progress unknown".
pub const INDETERMINATE: i32 = -1;

/// Channel to whatever shows progress to the user.
pub trait StatusDisplay: Send + Sync {
    /// `percent` is 0..=100, or [`INDETERMINATE`].
    fn percent(&self, percent: i32);
    fn major(&self, text: &str);
    fn minor(&self, text: &str);
    fn detail(&self, text: &str);
    fn error(&self, text: &str);
    fn set_stop_button_visible(&self, visible: bool);
}

/// Status display that only writes to the diagnostic log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusDisplay for TracingStatus {
    fn percent(&self, percent: i32) {
        if percent == INDETERMINATE {
            debug!("progress indeterminate");
        } else {
            debug!(percent, "progress");
        }
    }

    fn major(&self, text: &str) {
        info!("{text}");
    }

    fn minor(&self, text: &str) {
        info!("    {text}");
    }

    fn detail(&self, text: &str) {
        debug!("{text}");
    }

    fn error(&self, text: &str) {
        error!("{text}");
    }

    fn set_stop_button_visible(&self, visible: bool) {
        debug!(visible, "stop button");
    }
}
