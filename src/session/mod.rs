//! The export session: a mailbox-serialized state machine driving one
//! background archive worker per attempt.
//!
//! Callers hold an [`ExportHandle`] and issue fire-and-forget actions; the
//! worker reports back through an [`EventSink`]. Both feed the same ordered
//! mailbox, so the state machine body never has to reason about concurrency.

mod actor;
mod job;
mod throttle;

use crate::export::{ExportState, ExportStats, FilterSet, Selection};
use crate::indicator::IndicatorHub;
use crate::power::PowerMonitor;
use crate::worker::{WorkerEvent, WorkerFactory};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One caller-issued action. Every action is idempotent against the current
/// state: acting in the wrong state re-announces instead of failing.
#[derive(Debug)]
pub enum Action {
    Discover(Selection),
    Configure(FilterSet),
    Start(PathBuf),
    Cancel,
    Stop,
}

/// Asynchronous notification delivered to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Notification {
    State {
        state: ExportState,
        stats: ExportStats,
    },
    Progress {
        state: ExportState,
        stats: ExportStats,
        percent: u8,
        export_name: Option<String>,
    },
    Error {
        message: String,
    },
}

/// Identity of one export attempt's job. Worker events tagged with a stale
/// id are dropped, which is what makes cancellation race-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobId(pub(crate) u64);

pub(crate) enum Msg {
    Action(Action),
    Worker { job: JobId, event: WorkerEvent },
}

/// Callback surface handed to a worker at creation. All worker results
/// funnel through here into the session mailbox.
#[derive(Clone)]
pub struct EventSink {
    job: JobId,
    tx: mpsc::UnboundedSender<Msg>,
}

impl EventSink {
    pub fn progress(&self, state: ExportState, stats: ExportStats) {
        self.send(WorkerEvent::Progress { state, stats });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(WorkerEvent::Error {
            message: message.into(),
        });
    }

    fn send(&self, event: WorkerEvent) {
        // A dead session means the attempt is already torn down.
        let _ = self.tx.send(Msg::Worker {
            job: self.job,
            event,
        });
    }
}

/// Collaborators the session drives. Production wiring uses the filesystem
/// worker, the terminal indicator, and the no-op power monitor.
#[derive(Clone)]
pub struct SessionDeps {
    pub workers: Arc<dyn WorkerFactory>,
    pub indicators: Arc<dyn IndicatorHub>,
    pub power: Arc<dyn PowerMonitor>,
}

/// Tuning and naming knobs, resolved from [`crate::common::config`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Fallback export-name prefix when the worker has no selection label.
    pub app_name: String,
    /// Extension of the produced archive container.
    pub archive_extension: String,
    /// Minimum interval between in-progress notifications.
    pub notify_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            app_name: "exarch".to_string(),
            archive_extension: "zip".to_string(),
            notify_interval: Duration::from_millis(250),
        }
    }
}

pub struct ExportSession;

impl ExportSession {
    /// Spawns the session task. Returns the caller's action handle and the
    /// notification stream. The task ends on `Stop` or when every handle is
    /// dropped; live resources are torn down either way.
    pub fn spawn(
        deps: SessionDeps,
        settings: SessionSettings,
    ) -> (ExportHandle, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let core = actor::Core::new(deps, settings, tx.clone(), notify_tx);
        tokio::spawn(actor::run(core, rx));
        (ExportHandle { tx }, notify_rx)
    }
}

/// Cheap, cloneable action surface. Every method returns immediately; the
/// outcome arrives later on the notification stream.
#[derive(Clone)]
pub struct ExportHandle {
    tx: mpsc::UnboundedSender<Msg>,
}

impl ExportHandle {
    pub fn discover(&self, selection: Selection) {
        self.send(Action::Discover(selection));
    }

    pub fn configure(&self, filter: FilterSet) {
        self.send(Action::Configure(filter));
    }

    /// Convenience: builds the filter from raw tokens, ignoring anything
    /// unrecognized.
    pub fn configure_tokens<I, S>(&self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.configure(FilterSet::from_tokens(tokens));
    }

    pub fn start(&self, destination: impl Into<PathBuf>) {
        self.send(Action::Start(destination.into()));
    }

    pub fn cancel(&self) {
        self.send(Action::Cancel);
    }

    pub fn stop(&self) {
        self.send(Action::Stop);
    }

    fn send(&self, action: Action) {
        if self.tx.send(Msg::Action(action)).is_err() {
            tracing::debug!("export session already terminated; action dropped");
        }
    }
}
