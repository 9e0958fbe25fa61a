#![allow(dead_code)]

//! Shared fakes and helpers for session integration tests.

use anyhow::Result;
use exarch::archive::ArchiveStream;
use exarch::export::{ExportState, ExportStats, FilterSet, Selection};
use exarch::indicator::{Indicator, IndicatorHub};
use exarch::power::{PowerMonitor, WakeGuard};
use exarch::session::{
    EventSink, ExportHandle, ExportSession, Notification, SessionDeps, SessionSettings,
};
use exarch::worker::{ArchiveWorker, WorkerFactory};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Session settings with the notification throttle disabled, so tests see
/// every progress event. Timing tests pass their own interval.
pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        notify_interval: Duration::ZERO,
        ..SessionSettings::default()
    }
}

pub fn stats(image: u64, video: u64, audio: u64, file: u64, messages: u64) -> ExportStats {
    ExportStats {
        messages,
        image_bytes: image,
        video_bytes: video,
        audio_bytes: audio,
        file_bytes: file,
    }
}

//-- Fake worker

/// Commands recorded by the scripted worker.
#[derive(Default)]
pub struct WorkerLog {
    pub discovers: Vec<Selection>,
    pub filters: Vec<FilterSet>,
    pub started: Vec<PathBuf>,
    pub disposed: usize,
}

/// Hands out scripted workers and keeps their event sinks, so tests can
/// play the worker side of the protocol by hand.
#[derive(Default)]
pub struct FakeWorkerFactory {
    label: Mutex<Option<String>>,
    sinks: Mutex<Vec<EventSink>>,
    logs: Mutex<Vec<Arc<Mutex<WorkerLog>>>>,
}

impl FakeWorkerFactory {
    pub fn with_label(label: &str) -> Self {
        Self {
            label: Mutex::new(Some(label.to_string())),
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub fn sink(&self, index: usize) -> EventSink {
        self.sinks.lock().unwrap()[index].clone()
    }

    pub fn log(&self, index: usize) -> Arc<Mutex<WorkerLog>> {
        self.logs.lock().unwrap()[index].clone()
    }
}

impl WorkerFactory for FakeWorkerFactory {
    fn create(&self, events: EventSink) -> Box<dyn ArchiveWorker> {
        let log = Arc::new(Mutex::new(WorkerLog::default()));
        self.sinks.lock().unwrap().push(events);
        self.logs.lock().unwrap().push(Arc::clone(&log));
        Box::new(FakeWorker {
            log,
            label: self.label.lock().unwrap().clone(),
        })
    }
}

struct FakeWorker {
    log: Arc<Mutex<WorkerLog>>,
    label: Option<String>,
}

impl ArchiveWorker for FakeWorker {
    fn discover(&mut self, selection: &Selection) {
        self.log.lock().unwrap().discovers.push(selection.clone());
    }

    fn set_filter(&mut self, filter: FilterSet) {
        self.log.lock().unwrap().filters.push(filter);
    }

    fn start(&mut self, stream: ArchiveStream) {
        self.log
            .lock()
            .unwrap()
            .started
            .push(stream.path().to_path_buf());
    }

    fn dispose(&mut self) {
        self.log.lock().unwrap().disposed += 1;
    }

    fn selection_label(&self) -> Option<String> {
        self.label.clone()
    }
}

//-- Fake indicator

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorEvent {
    Shown,
    Percent(u8),
    Cleared,
}

#[derive(Default)]
pub struct FakeIndicatorHub {
    pub events: Arc<Mutex<Vec<IndicatorEvent>>>,
    pub fail_show: AtomicBool,
}

impl FakeIndicatorHub {
    pub fn events(&self) -> Vec<IndicatorEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl IndicatorHub for FakeIndicatorHub {
    fn show(&self, _title: &str) -> Result<Box<dyn Indicator>> {
        if self.fail_show.load(Ordering::SeqCst) {
            anyhow::bail!("indicator backend unavailable");
        }
        self.events.lock().unwrap().push(IndicatorEvent::Shown);
        Ok(Box::new(FakeIndicator {
            events: Arc::clone(&self.events),
        }))
    }
}

struct FakeIndicator {
    events: Arc<Mutex<Vec<IndicatorEvent>>>,
}

impl Indicator for FakeIndicator {
    fn set_percent(&mut self, percent: u8) {
        self.events
            .lock()
            .unwrap()
            .push(IndicatorEvent::Percent(percent));
    }

    fn clear(&mut self) {
        self.events.lock().unwrap().push(IndicatorEvent::Cleared);
    }
}

//-- Fake power monitor

#[derive(Default)]
pub struct FakePower {
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl PowerMonitor for FakePower {
    fn keep_awake(&self) -> Box<dyn WakeGuard> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeGuard {
            released: Arc::clone(&self.released),
        })
    }
}

struct FakeGuard {
    released: Arc<AtomicUsize>,
}

impl WakeGuard for FakeGuard {}

impl Drop for FakeGuard {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

//-- Harness

pub struct Harness {
    pub handle: ExportHandle,
    pub notifications: UnboundedReceiver<Notification>,
    pub workers: Arc<FakeWorkerFactory>,
    pub indicators: Arc<FakeIndicatorHub>,
    pub power: Arc<FakePower>,
}

pub fn spawn_session(settings: SessionSettings, workers: FakeWorkerFactory) -> Harness {
    let workers = Arc::new(workers);
    let indicators = Arc::new(FakeIndicatorHub::default());
    let power = Arc::new(FakePower::default());
    let deps = SessionDeps {
        workers: workers.clone(),
        indicators: indicators.clone(),
        power: power.clone(),
    };
    let (handle, notifications) = ExportSession::spawn(deps, settings);
    Harness {
        handle,
        notifications,
        workers,
        indicators,
        power,
    }
}

pub fn spawn_default() -> Harness {
    spawn_session(fast_settings(), FakeWorkerFactory::default())
}

//-- Async helpers

pub async fn next_notification(rx: &mut UnboundedReceiver<Notification>) -> Notification {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("session terminated early")
}

/// Skips interleaved events until the wanted state notification arrives.
pub async fn wait_for_state(
    rx: &mut UnboundedReceiver<Notification>,
    want: ExportState,
) -> ExportStats {
    loop {
        if let Notification::State { state, stats } = next_notification(rx).await {
            if state == want {
                return stats;
            }
        }
    }
}

/// Lets the session task run, then returns whatever it has produced so far.
pub async fn drain_pending(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}

pub async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Waits until the factory has created `count` workers.
pub async fn wait_for_workers(factory: &FakeWorkerFactory, count: usize) {
    wait_until(|| factory.created() >= count, "worker creation").await;
}
