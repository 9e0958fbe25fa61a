//! Domain model for export attempts: what gets exported, how much of it
//! there is, and what the resulting archive is called.

pub mod kind;
pub mod name;
pub mod state;
pub mod stats;

pub use kind::{ContentKind, FilterSet, ALL_KINDS};
pub use name::export_file_name;
pub use state::ExportState;
pub use stats::{percent, ExportStats};

use serde::{Deserialize, Serialize};

/// The single export target, chosen at discovery time and immutable for the
/// rest of the attempt. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum Selection {
    Space(String),
    Group(String),
    Contact(String),
    Everything,
}

impl Selection {
    /// Identifier of the targeted container, if the selection has one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Selection::Space(id) | Selection::Group(id) | Selection::Contact(id) => Some(id),
            Selection::Everything => None,
        }
    }
}
