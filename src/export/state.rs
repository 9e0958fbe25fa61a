use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally observable session state, carried on every notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportState {
    Ready,
    Waiting,
    Exporting,
    Done,
    Error,
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExportState::Ready => "ready",
            ExportState::Waiting => "waiting",
            ExportState::Exporting => "exporting",
            ExportState::Done => "done",
            ExportState::Error => "error",
        };
        f.write_str(label)
    }
}
