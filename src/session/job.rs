//! Live resources of one export attempt, torn down as a unit.

use crate::archive::ArchiveStream;
use crate::indicator::Indicator;
use crate::power::WakeGuard;
use crate::session::JobId;
use crate::worker::ArchiveWorker;

/// What happens to the destination file during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputDisposition {
    /// Completed archive: flush and keep it.
    Keep,
    /// Aborted attempt: delete the partial output when possible.
    DiscardPartial,
}

/// The one live handle bundle per attempt: worker, archive stream,
/// indicator, wake guard. Created at discovery, destroyed on
/// done/cancel/stop/error. Owned exclusively by the session.
pub(crate) struct ExportJob {
    pub id: JobId,
    pub worker: Box<dyn ArchiveWorker>,
    pub stream: Option<ArchiveStream>,
    pub indicator: Option<Box<dyn Indicator>>,
    pub wake: Option<Box<dyn WakeGuard>>,
}

impl ExportJob {
    pub fn new(id: JobId, worker: Box<dyn ArchiveWorker>) -> Self {
        Self {
            id,
            worker,
            stream: None,
            indicator: None,
            wake: None,
        }
    }

    /// Ordered teardown: dispose the worker, close/discard the stream,
    /// clear the indicator, release the wake guard. Every step is
    /// independent; none can prevent the ones after it, and resource
    /// failures inside the steps are logged, never surfaced.
    pub fn teardown(mut self, disposition: OutputDisposition) {
        tracing::debug!(job = self.id.0, ?disposition, "tearing down export job");
        self.worker.dispose();
        if let Some(stream) = self.stream.take() {
            match disposition {
                OutputDisposition::Keep => stream.close(),
                OutputDisposition::DiscardPartial => stream.discard(),
            }
        }
        if let Some(mut indicator) = self.indicator.take() {
            indicator.clear();
        }
        drop(self.wake.take());
    }
}
