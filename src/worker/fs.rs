//! Filesystem-backed archive worker: walks a data root, classifies files by
//! extension, and writes the filtered selection into a zip container.

use crate::archive::ArchiveStream;
use crate::common::errors::ExportError;
use crate::export::{ContentKind, ExportState, ExportStats, FilterSet, Selection};
use crate::session::EventSink;
use crate::worker::{ArchiveWorker, WorkerFactory};
use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;
use zip::write::FileOptions;

/// How many files to walk between discovery progress reports.
const DISCOVERY_REPORT_EVERY: u64 = 64;

pub struct FsWorkerFactory {
    root: PathBuf,
}

impl FsWorkerFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl WorkerFactory for FsWorkerFactory {
    fn create(&self, events: EventSink) -> Box<dyn ArchiveWorker> {
        Box::new(FsArchiveWorker {
            root: self.root.clone(),
            events,
            cancel: CancellationToken::new(),
            filter: FilterSet::all(),
            label: Arc::new(Mutex::new(None)),
            manifest: Arc::new(Mutex::new(None)),
        })
    }
}

struct ManifestEntry {
    path: PathBuf,
    rel: PathBuf,
    kind: ContentKind,
    size: u64,
}

pub struct FsArchiveWorker {
    root: PathBuf,
    events: EventSink,
    cancel: CancellationToken,
    filter: FilterSet,
    label: Arc<Mutex<Option<String>>>,
    manifest: Arc<Mutex<Option<Vec<ManifestEntry>>>>,
}

impl FsArchiveWorker {
    /// Selections map onto the data root: `Everything` is the root itself,
    /// container selections are subdirectories named by their id.
    fn resolve(&self, selection: &Selection) -> (PathBuf, String) {
        match selection.id() {
            Some(id) => (self.root.join(id), id.to_string()),
            None => {
                let label = self
                    .root
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("everything")
                    .to_string();
                (self.root.clone(), label)
            }
        }
    }
}

impl ArchiveWorker for FsArchiveWorker {
    fn discover(&mut self, selection: &Selection) {
        let (base, label) = self.resolve(selection);
        *lock(&self.label) = Some(label);

        let events = self.events.clone();
        let cancel = self.cancel.clone();
        let slot = Arc::clone(&self.manifest);
        tokio::task::spawn_blocking(move || {
            if !base.is_dir() {
                let err = ExportError::SelectionMissing {
                    path: base.display().to_string(),
                };
                events.error(err.to_string());
                events.progress(ExportState::Error, ExportStats::default());
                return;
            }

            let mut entries = Vec::new();
            let mut stats = ExportStats::default();
            let mut walked = 0u64;
            for entry in WalkDir::new(&base).into_iter().filter_map(|e| e.ok()) {
                if cancel.is_cancelled() {
                    return;
                }
                if !entry.path().is_file() {
                    continue;
                }
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                let kind = classify(entry.path());
                count(&mut stats, kind, size);
                let rel = entry
                    .path()
                    .strip_prefix(&base)
                    .unwrap_or(entry.path())
                    .to_path_buf();
                entries.push(ManifestEntry {
                    path: entry.path().to_path_buf(),
                    rel,
                    kind,
                    size,
                });
                walked += 1;
                if walked % DISCOVERY_REPORT_EVERY == 0 {
                    events.progress(ExportState::Ready, stats);
                }
            }

            tracing::debug!(files = entries.len(), "discovery walk finished");
            *lock(&slot) = Some(entries);
            events.progress(ExportState::Waiting, stats);
        });
    }

    fn set_filter(&mut self, filter: FilterSet) {
        self.filter = filter;
    }

    fn start(&mut self, stream: ArchiveStream) {
        let Some(entries) = lock(&self.manifest).take() else {
            self.events.error("export started before discovery finished");
            self.events
                .progress(ExportState::Error, ExportStats::default());
            return;
        };

        let filter = self.filter.clone();
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || {
            let mut written = ExportStats::default();
            match write_archive(&entries, &filter, stream, &events, &cancel, &mut written) {
                Ok(true) => events.progress(ExportState::Done, written),
                // Cancelled mid-write; the session is already tearing down.
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "archive write failed");
                    events.error(format!("{err:#}"));
                    events.progress(ExportState::Error, written);
                }
            }
        });
    }

    fn dispose(&mut self) {
        self.cancel.cancel();
        lock(&self.manifest).take();
    }

    fn selection_label(&self) -> Option<String> {
        lock(&self.label).clone()
    }
}

/// Writes the filtered entries into the stream. Returns Ok(false) when the
/// walk was cancelled underneath us.
fn write_archive(
    entries: &[ManifestEntry],
    filter: &FilterSet,
    stream: ArchiveStream,
    events: &EventSink,
    cancel: &CancellationToken,
    written: &mut ExportStats,
) -> Result<bool> {
    let mut writer = zip::ZipWriter::new(stream);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in entries.iter().filter(|e| filter.contains(e.kind)) {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let mut source = File::open(&entry.path)
            .with_context(|| format!("Failed to open {}", entry.path.display()))?;
        let entry_name = entry.rel.to_string_lossy().replace('\\', "/");
        writer
            .start_file(entry_name, options)
            .with_context(|| format!("Failed to start archive entry {}", entry.rel.display()))?;
        io::copy(&mut source, &mut writer)
            .with_context(|| format!("Failed to add {} to archive", entry.path.display()))?;
        count(written, entry.kind, entry.size);
        events.progress(ExportState::Exporting, *written);
    }

    writer.finish().context("Failed to finalize archive")?;
    Ok(true)
}

fn count(stats: &mut ExportStats, kind: ContentKind, size: u64) {
    match kind {
        ContentKind::Message => stats.messages += 1,
        ContentKind::Image => stats.image_bytes += size,
        ContentKind::Video => stats.video_bytes += size,
        ContentKind::Audio => stats.audio_bytes += size,
        ContentKind::File => stats.file_bytes += size,
    }
}

fn classify(path: &Path) -> ContentKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" | "log" | "json" => ContentKind::Message,
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "heic" | "bmp" => ContentKind::Image,
        "mp4" | "mov" | "mkv" | "webm" | "avi" => ContentKind::Video,
        "mp3" | "ogg" | "m4a" | "wav" | "flac" | "opus" | "aac" => ContentKind::Audio,
        _ => ContentKind::File,
    }
}

fn lock<T>(slot: &Arc<Mutex<T>>) -> std::sync::MutexGuard<'_, T> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("worker state lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
