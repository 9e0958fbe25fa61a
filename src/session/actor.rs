//! The export session state machine.
//!
//! One phase value is the sole source of truth; everything an attempt
//! depends on (job handles, the stats snapshot, the frozen byte budget, the
//! export name) lives inside the phase variant it belongs to. Actions and
//! worker events arrive through the same mailbox, so handlers mutate state
//! without locks.

use crate::archive::ArchiveStream;
use crate::common::errors::ExportError;
use crate::export::{export_file_name, percent, ExportState, ExportStats, FilterSet, Selection};
use crate::indicator::Indicator;
use crate::session::job::{ExportJob, OutputDisposition};
use crate::session::throttle::ProgressThrottle;
use crate::session::{Action, EventSink, JobId, Msg, Notification, SessionDeps, SessionSettings};
use crate::worker::WorkerEvent;
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Session phases. `Discovering` is externally announced as `Ready`; `Done`
/// and `Error` are momentary (reported, torn down, back to `Ready`), so they
/// never need a stored variant.
enum Phase {
    Ready,
    Discovering {
        job: ExportJob,
        filter: FilterSet,
        snapshot: ExportStats,
    },
    Waiting {
        job: ExportJob,
        filter: FilterSet,
        snapshot: ExportStats,
        total: u64,
        name: String,
    },
    Exporting {
        job: ExportJob,
        filter: FilterSet,
        snapshot: ExportStats,
        total: u64,
        name: String,
        last_percent: Option<u8>,
    },
}

impl Phase {
    fn external_state(&self) -> ExportState {
        match self {
            Phase::Ready | Phase::Discovering { .. } => ExportState::Ready,
            Phase::Waiting { .. } => ExportState::Waiting,
            Phase::Exporting { .. } => ExportState::Exporting,
        }
    }

    fn snapshot(&self) -> ExportStats {
        match self {
            Phase::Ready => ExportStats::default(),
            Phase::Discovering { snapshot, .. }
            | Phase::Waiting { snapshot, .. }
            | Phase::Exporting { snapshot, .. } => *snapshot,
        }
    }

    fn job_id(&self) -> Option<JobId> {
        match self {
            Phase::Ready => None,
            Phase::Discovering { job, .. }
            | Phase::Waiting { job, .. }
            | Phase::Exporting { job, .. } => Some(job.id),
        }
    }

    fn into_job(self) -> Option<ExportJob> {
        match self {
            Phase::Ready => None,
            Phase::Discovering { job, .. }
            | Phase::Waiting { job, .. }
            | Phase::Exporting { job, .. } => Some(job),
        }
    }
}

pub(crate) struct Core {
    deps: SessionDeps,
    settings: SessionSettings,
    self_tx: mpsc::UnboundedSender<Msg>,
    notify: mpsc::UnboundedSender<Notification>,
    phase: Phase,
    throttle: ProgressThrottle,
    next_job: u64,
    stopping: bool,
}

impl Core {
    pub fn new(
        deps: SessionDeps,
        settings: SessionSettings,
        self_tx: mpsc::UnboundedSender<Msg>,
        notify: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        let throttle = ProgressThrottle::new(settings.notify_interval);
        Self {
            deps,
            settings,
            self_tx,
            notify,
            phase: Phase::Ready,
            throttle,
            next_job: 0,
            stopping: false,
        }
    }

    pub fn stopping(&self) -> bool {
        self.stopping
    }

    pub fn notify_sender(&self) -> mpsc::UnboundedSender<Notification> {
        self.notify.clone()
    }

    //-- Action handlers

    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Discover(selection) => self.on_discover(selection),
            Action::Configure(filter) => self.on_configure(filter),
            Action::Start(destination) => self.on_start(destination),
            Action::Cancel => self.on_cancel(),
            Action::Stop => self.on_stop(),
        }
    }

    fn on_discover(&mut self, selection: Selection) {
        if !matches!(self.phase, Phase::Ready) {
            tracing::debug!("discover issued while an attempt is live");
            return self.reannounce();
        }

        let id = JobId(self.next_job);
        self.next_job += 1;
        let sink = EventSink {
            job: id,
            tx: self.self_tx.clone(),
        };
        let mut job = ExportJob::new(id, self.deps.workers.create(sink));
        job.worker.discover(&selection);
        self.throttle.reset();
        tracing::info!(job = id.0, ?selection, "discovery started");

        // Externally still Ready until the worker reports back.
        self.phase = Phase::Discovering {
            job,
            filter: FilterSet::all(),
            snapshot: ExportStats::default(),
        };
    }

    fn on_configure(&mut self, filter: FilterSet) {
        let fallback = self.settings.app_name.clone();
        let extension = self.settings.archive_extension.clone();

        let announce = match &mut self.phase {
            Phase::Waiting {
                job,
                filter: active,
                snapshot,
                total,
                name,
            } => {
                *active = filter;
                *total = snapshot.filtered_bytes(active);
                let prefix = job.worker.selection_label().unwrap_or(fallback);
                *name = export_file_name(&prefix, active, Local::now().date_naive(), &extension);
                tracing::debug!(total = *total, name = %name, "content filter configured");
                Some(*snapshot)
            }
            _ => None,
        };

        match announce {
            // Refreshed waiting state, so callers can pick up size and name.
            Some(stats) => self.push(Notification::State {
                state: ExportState::Waiting,
                stats,
            }),
            None => {
                tracing::debug!("configure issued outside waiting");
                self.reannounce();
            }
        }
    }

    fn on_start(&mut self, destination: PathBuf) {
        match self.take_phase() {
            Phase::Waiting {
                mut job,
                filter,
                snapshot,
                total,
                name,
            } => match self.acquire_outputs(&name, &destination) {
                Ok((indicator, stream)) => {
                    job.indicator = Some(indicator);
                    job.stream = Some(stream.clone());
                    job.wake = Some(self.deps.power.keep_awake());
                    job.worker.set_filter(filter.clone());
                    job.worker.start(stream);
                    self.throttle.reset();
                    tracing::info!(job = job.id.0, name = %name, total, "export started");
                    self.phase = Phase::Exporting {
                        job,
                        filter,
                        snapshot,
                        total,
                        name,
                        last_percent: None,
                    };
                    self.push(Notification::State {
                        state: ExportState::Exporting,
                        stats: snapshot,
                    });
                }
                Err(err) => {
                    // Failed attempts to start never enter Exporting; the
                    // caller may retry from Waiting.
                    tracing::warn!(error = %err, "export start failed");
                    self.phase = Phase::Waiting {
                        job,
                        filter,
                        snapshot,
                        total,
                        name,
                    };
                    self.push(Notification::Error {
                        message: err.to_string(),
                    });
                }
            },
            other => {
                self.phase = other;
                tracing::debug!("start issued outside waiting");
                self.reannounce();
            }
        }
    }

    /// Indicator and stream come up as a unit: when the stream cannot be
    /// opened, the already-shown indicator is rolled back before returning.
    fn acquire_outputs(
        &self,
        name: &str,
        destination: &Path,
    ) -> Result<(Box<dyn Indicator>, ArchiveStream), ExportError> {
        let mut indicator = self
            .deps
            .indicators
            .show(name)
            .map_err(|err| ExportError::Indicator(format!("{err:#}")))?;
        indicator.set_percent(0);

        let path = resolve_destination(destination, name);
        match ArchiveStream::create(&path) {
            Ok(stream) => Ok((indicator, stream)),
            Err(err) => {
                indicator.clear();
                Err(ExportError::Destination {
                    path: path.display().to_string(),
                    message: format!("{err:#}"),
                })
            }
        }
    }

    fn on_cancel(&mut self) {
        match self.take_phase().into_job() {
            None => tracing::debug!("cancel with no live attempt"),
            Some(job) => {
                job.teardown(OutputDisposition::DiscardPartial);
                tracing::info!("export attempt cancelled");
            }
        }
    }

    fn on_stop(&mut self) {
        if matches!(self.phase, Phase::Exporting { .. }) {
            // No stopping mid-export; cancel is the way out.
            tracing::debug!("stop ignored while exporting");
            return;
        }
        if let Some(job) = self.take_phase().into_job() {
            job.teardown(OutputDisposition::DiscardPartial);
        }
        self.stopping = true;
        tracing::info!("export session stopping");
    }

    //-- Worker event handlers

    pub fn handle_worker(&mut self, job: JobId, event: WorkerEvent) {
        // Events from disposed attempts are dropped; a cancelled session
        // accepts no further transitions.
        if self.phase.job_id() != Some(job) {
            tracing::debug!(job = job.0, "stale worker event dropped");
            return;
        }
        match event {
            WorkerEvent::Error { message } => {
                // Forwarded verbatim and immediately; the worker follows up
                // with an Error progress state when the attempt is dead.
                tracing::warn!(%message, "worker reported an error");
                self.push(Notification::Error { message });
            }
            WorkerEvent::Progress { state, stats } => self.on_progress(state, stats),
        }
    }

    fn on_progress(&mut self, state: ExportState, stats: ExportStats) {
        match state {
            ExportState::Done => {
                let job = self.take_phase().into_job();
                self.push(Notification::State {
                    state: ExportState::Done,
                    stats,
                });
                if let Some(job) = job {
                    job.teardown(OutputDisposition::Keep);
                }
                tracing::info!("export finished");
            }
            ExportState::Error => {
                let job = self.take_phase().into_job();
                self.push(Notification::State {
                    state: ExportState::Error,
                    stats,
                });
                if let Some(job) = job {
                    job.teardown(OutputDisposition::DiscardPartial);
                }
            }
            ExportState::Waiting => self.on_discovered(stats),
            ExportState::Ready | ExportState::Exporting => self.on_running(stats),
        }
    }

    fn on_discovered(&mut self, stats: ExportStats) {
        let fallback = self.settings.app_name.clone();
        let extension = self.settings.archive_extension.clone();

        match self.take_phase() {
            // A repeated Waiting report refreshes the snapshot and totals.
            Phase::Discovering { job, filter, .. } | Phase::Waiting { job, filter, .. } => {
                let total = stats.filtered_bytes(&filter);
                let prefix = job.worker.selection_label().unwrap_or(fallback);
                let name = export_file_name(&prefix, &filter, Local::now().date_naive(), &extension);
                tracing::info!(total, name = %name, "discovery complete");
                self.phase = Phase::Waiting {
                    job,
                    filter,
                    snapshot: stats,
                    total,
                    name,
                };
                self.push(Notification::State {
                    state: ExportState::Waiting,
                    stats,
                });
            }
            other => {
                tracing::warn!(state = %other.external_state(), "unexpected waiting report dropped");
                self.phase = other;
            }
        }
    }

    fn on_running(&mut self, stats: ExportStats) {
        let mut notification = None;
        match &mut self.phase {
            Phase::Discovering { snapshot, .. } => {
                *snapshot = stats;
                if self.throttle.admit() {
                    notification = Some(Notification::Progress {
                        state: ExportState::Ready,
                        stats,
                        percent: 0,
                        export_name: None,
                    });
                }
            }
            Phase::Exporting {
                job,
                filter,
                snapshot,
                total,
                name,
                last_percent,
            } => {
                *snapshot = stats;
                let exported = stats.filtered_bytes(filter);
                let pct = percent(exported, *total);
                // The indicator follows percent changes, independent of the
                // notification throttle.
                if *last_percent != Some(pct) {
                    *last_percent = Some(pct);
                    if let Some(indicator) = job.indicator.as_mut() {
                        indicator.set_percent(pct);
                    }
                }
                if self.throttle.admit() {
                    notification = Some(Notification::Progress {
                        state: ExportState::Exporting,
                        stats,
                        percent: pct,
                        export_name: Some(name.clone()),
                    });
                }
            }
            _ => {
                tracing::debug!("progress report outside a running phase dropped");
            }
        }
        if let Some(notification) = notification {
            self.push(notification);
        }
    }

    //-- Shared plumbing

    fn reannounce(&self) {
        self.push(Notification::State {
            state: self.phase.external_state(),
            stats: self.phase.snapshot(),
        });
    }

    fn push(&self, notification: Notification) {
        let _ = self.notify.send(notification);
    }

    fn take_phase(&mut self) -> Phase {
        std::mem::replace(&mut self.phase, Phase::Ready)
    }

    /// Forced shutdown: whatever is still live gets torn down.
    pub fn shutdown(&mut self) {
        if let Some(job) = self.take_phase().into_job() {
            job.teardown(OutputDisposition::DiscardPartial);
        }
        tracing::debug!("export session terminated");
    }
}

/// A directory destination gets the computed export name appended;
/// anything else is used as the file path directly.
fn resolve_destination(destination: &Path, name: &str) -> PathBuf {
    if destination.is_dir() {
        destination.join(name)
    } else {
        destination.to_path_buf()
    }
}

pub(crate) async fn run(mut core: Core, mut mailbox: mpsc::UnboundedReceiver<Msg>) {
    // Probe for the caller's notification receiver going away, so an
    // abandoned session tears down instead of idling forever.
    let notify_probe = core.notify_sender();
    loop {
        tokio::select! {
            msg = mailbox.recv() => match msg {
                Some(Msg::Action(action)) => core.handle_action(action),
                Some(Msg::Worker { job, event }) => core.handle_worker(job, event),
                None => break,
            },
            _ = notify_probe.closed() => {
                tracing::debug!("notification receiver dropped");
                break;
            }
        }
        if core.stopping() {
            break;
        }
    }
    core.shutdown();
}
