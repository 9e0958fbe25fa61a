//! End-to-end runs of the filesystem worker through a real session.

mod common;

use common::*;
use exarch::export::{ExportState, Selection};
use exarch::power::NoopPower;
use exarch::session::{ExportSession, Notification, SessionDeps};
use exarch::worker::FsWorkerFactory;
use std::fs;
use std::sync::Arc;

fn write_file(path: &std::path::Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn exports_filtered_content_into_a_zip() {
    let data = setup_temp_dir();
    write_file(&data.path().join("notes/a.txt"), b"hello");
    write_file(&data.path().join("pics/b.jpg"), &[1u8; 8]);
    write_file(&data.path().join("vids/c.mp4"), &[2u8; 16]);
    write_file(&data.path().join("blob.bin"), &[3u8; 4]);
    let out = setup_temp_dir();

    let indicators = Arc::new(FakeIndicatorHub::default());
    let deps = SessionDeps {
        workers: Arc::new(FsWorkerFactory::new(data.path())),
        indicators: indicators.clone(),
        power: Arc::new(NoopPower),
    };
    let (handle, mut notifications) = ExportSession::spawn(deps, fast_settings());

    handle.discover(Selection::Everything);
    let discovered = wait_for_state(&mut notifications, ExportState::Waiting).await;
    assert_eq!(discovered.messages, 1);
    assert_eq!(discovered.image_bytes, 8);
    assert_eq!(discovered.video_bytes, 16);
    assert_eq!(discovered.file_bytes, 4);

    handle.configure_tokens(["images", "videos"]);
    wait_for_state(&mut notifications, ExportState::Waiting).await;
    handle.start(out.path().to_path_buf());

    let done = wait_for_state(&mut notifications, ExportState::Done).await;
    assert_eq!(done.image_bytes, 8);
    assert_eq!(done.video_bytes, 16);
    assert_eq!(done.messages, 0);
    assert_eq!(done.file_bytes, 0);

    // exactly one archive was produced, holding only the filtered kinds
    let produced: Vec<_> = fs::read_dir(out.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    assert_eq!(produced.len(), 1, "expected one archive, got {produced:?}");
    let mut archive = zip::ZipArchive::new(fs::File::open(&produced[0]).unwrap()).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(archive.by_name("pics/b.jpg").is_ok());
    assert!(archive.by_name("vids/c.mp4").is_ok());

    // indicator ran its full show/update/clear life cycle
    wait_until(
        || indicators.events().last() == Some(&IndicatorEvent::Cleared),
        "indicator clear",
    )
    .await;
    assert_eq!(indicators.events().first(), Some(&IndicatorEvent::Shown));
}

#[tokio::test]
async fn container_selection_scopes_the_walk_and_names_the_archive() {
    let data = setup_temp_dir();
    write_file(&data.path().join("ada/pic.png"), &[1u8; 10]);
    write_file(&data.path().join("bob/pic.png"), &[1u8; 99]);
    let out = setup_temp_dir();

    let deps = SessionDeps {
        workers: Arc::new(FsWorkerFactory::new(data.path())),
        indicators: Arc::new(FakeIndicatorHub::default()),
        power: Arc::new(NoopPower),
    };
    let (handle, mut notifications) = ExportSession::spawn(deps, fast_settings());

    handle.discover(Selection::Contact("ada".into()));
    let discovered = wait_for_state(&mut notifications, ExportState::Waiting).await;
    assert_eq!(discovered.image_bytes, 10, "bob's data must not leak in");

    handle.start(out.path().to_path_buf());
    wait_for_state(&mut notifications, ExportState::Done).await;

    let produced: Vec<_> = fs::read_dir(out.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(produced.len(), 1);
    assert!(
        produced[0].starts_with("ada-all-"),
        "archive should be named after the selection, got {produced:?}"
    );
}

#[tokio::test]
async fn missing_selection_surfaces_an_error_and_cleans_up() {
    let data = setup_temp_dir();
    let deps = SessionDeps {
        workers: Arc::new(FsWorkerFactory::new(data.path())),
        indicators: Arc::new(FakeIndicatorHub::default()),
        power: Arc::new(NoopPower),
    };
    let (handle, mut notifications) = ExportSession::spawn(deps, fast_settings());

    handle.discover(Selection::Space("nope".into()));
    match next_notification(&mut notifications).await {
        Notification::Error { message } => {
            assert!(message.contains("not found"), "unexpected message {message}")
        }
        other => panic!("expected error, got {other:?}"),
    }
    wait_for_state(&mut notifications, ExportState::Error).await;

    // back to a usable session
    handle.discover(Selection::Everything);
    wait_for_state(&mut notifications, ExportState::Waiting).await;
}
