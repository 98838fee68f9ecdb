#![forbid(unsafe_code)]

use crate::status::{INDETERMINATE, StatusDisplay};

const PERCENT_PREFIX: &str = "Preparing ";
const STAGE_PREFIX: &str = "Preparing to ";
const LICENSE_PREFIXES: &[&str] = &["By using the agreetolicense option", "If you do not agree,"];
const HANDSHAKE_PREFIXES: &[&str] = &[
    "Signaling PID:",
    "Waiting to reboot",
    "Process signaled okay",
];

/// What one line of installer output means for the status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    MajorStatus(String),
    MinorStatus(String),
    /// 0..=100, or [`INDETERMINATE`] when the value could not be read.
    PercentComplete(i32),
    DebugNote(String),
    Ignored,
}

impl Progress {
    /// Classify one output line. Prefixes are matched case-sensitively against
    /// the line without its terminator; the first rule that fits wins.
    pub fn classify(line: &str) -> Self {
        let msg = line.trim_end_matches(['\r', '\n']);
        if msg.starts_with(STAGE_PREFIX) {
            Self::MajorStatus(msg.to_owned())
        } else if let Some(value) = msg.strip_prefix(PERCENT_PREFIX) {
            Self::PercentComplete(parse_percent(value))
        } else if LICENSE_PREFIXES.iter().any(|p| msg.starts_with(p)) {
            Self::Ignored
        } else if HANDSHAKE_PREFIXES.iter().any(|p| msg.starts_with(p)) {
            Self::DebugNote(msg.to_owned())
        } else {
            Self::MinorStatus(msg.to_owned())
        }
    }

    pub fn report(&self, status: &dyn StatusDisplay) {
        match self {
            Self::MajorStatus(text) => status.major(text),
            Self::MinorStatus(text) => status.minor(text),
            Self::PercentComplete(percent) => status.percent(*percent),
            Self::DebugNote(text) => status.detail(&format!("startosinstall: {text}")),
            Self::Ignored => {}
        }
    }
}

/// `"42.0."` -> 42, clamped to 0..=100. Anything unparsable is indeterminate.
fn parse_percent(value: &str) -> i32 {
    value
        .trim_end()
        .trim_end_matches('.')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|percent| percent.is_finite())
        .map(|percent| percent.trunc().clamp(0.0, 100.0) as i32)
        .unwrap_or(INDETERMINATE)
}
