use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Logout {
    /// Executable that owns an interactive session. Killing it logs the user
    /// out. Matched as a prefix of the process executable.
    pub session_owner: String,

    /// Created right before sessions are killed so the status display can
    /// tell the user a forced logout is happening.
    pub marker: PathBuf,

    /// Sessions owned by this account are never killed.
    pub excluded_user: String,
}

impl Default for Logout {
    fn default() -> Self {
        Self {
            session_owner: "/System/Library/CoreServices/loginwindow.app/Contents/MacOS/loginwindow"
                .to_owned(),
            marker: PathBuf::from("/private/tmp/com.googlecode.munki.installatlogout"),
            excluded_user: "root".to_owned(),
        }
    }
}
