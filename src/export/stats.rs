use crate::export::kind::{ContentKind, FilterSet};
use serde::{Deserialize, Serialize};

/// Snapshot of discovered or exported content, as reported by a worker.
///
/// Each report replaces the previous snapshot wholesale; snapshots are never
/// merged field by field. Message content carries a count but no byte cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    pub messages: u64,
    pub image_bytes: u64,
    pub video_bytes: u64,
    pub audio_bytes: u64,
    pub file_bytes: u64,
}

impl ExportStats {
    /// Byte size attributed to one content kind.
    pub fn bytes_for(&self, kind: ContentKind) -> u64 {
        match kind {
            // Messages have no meaningful byte cost for progress purposes.
            ContentKind::Message => 0,
            ContentKind::Image => self.image_bytes,
            ContentKind::Video => self.video_bytes,
            ContentKind::Audio => self.audio_bytes,
            ContentKind::File => self.file_bytes,
        }
    }

    /// Total bytes across the kinds present in `filter`. Kinds outside the
    /// filter contribute zero even when the worker reported a size for them.
    pub fn filtered_bytes(&self, filter: &FilterSet) -> u64 {
        filter.kinds().map(|kind| self.bytes_for(kind)).sum()
    }
}

/// Integer progress percentage against a frozen byte budget, capped at 100.
/// A zero budget reports 0 until the attempt finishes on its own.
pub fn percent(exported: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (exported.saturating_mul(100) / total).min(100) as u8
}
