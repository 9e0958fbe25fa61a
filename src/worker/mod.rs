//! The archive-worker boundary.
//!
//! Workers do the heavy lifting of an attempt: discovering what a selection
//! contains and writing it into the archive stream. The session only ever
//! talks to the capability traits below; every result comes back through
//! the [`EventSink`] the factory received, never as a return value.

pub mod fs;

use crate::archive::ArchiveStream;
use crate::export::{ExportState, ExportStats, FilterSet, Selection};
use crate::session::EventSink;

pub use fs::FsWorkerFactory;

/// Progress or error callback emitted by a worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Progress {
        state: ExportState,
        stats: ExportStats,
    },
    Error {
        message: String,
    },
}

/// One export attempt's traversal/writing engine.
///
/// Commands are fire-and-forget and must not block the caller;
/// implementations run their work on their own tasks.
pub trait ArchiveWorker: Send {
    /// Begins discovery of the given selection. Reports a `Waiting`
    /// progress state (with the discovered stats) when done.
    fn discover(&mut self, selection: &Selection);

    /// Replaces the content filter applied during the write phase.
    fn set_filter(&mut self, filter: FilterSet);

    /// Begins writing the discovered content into the stream. Reports
    /// `Exporting` progress along the way and `Done` or `Error` at the end.
    fn start(&mut self, stream: ArchiveStream);

    /// Stops in-flight work and releases worker resources. Idempotent;
    /// events sent after this may be dropped by the session.
    fn dispose(&mut self);

    /// Display name of the discovered selection, once known.
    fn selection_label(&self) -> Option<String>;
}

/// Creates one worker per export attempt.
pub trait WorkerFactory: Send + Sync {
    fn create(&self, events: EventSink) -> Box<dyn ArchiveWorker>;
}
