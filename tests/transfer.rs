mod common;

use chrono::NaiveDate;
use common::{data_bytes, drain, MockServer, DATA_LEN, FAILING_FILE, README, STALLING_FILE};
use filetime::FileTime;
use rouilleftp::{AsyncOutcome, FtpError, FtpEvent, TransferDirection};
use std::time::Duration;
use tempfile::tempdir;
use tokio::time::timeout;

fn notifications(events: &[FtpEvent]) -> Vec<AsyncOutcome> {
    events
        .iter()
        .filter_map(|e| match e {
            FtpEvent::TransferNotification(result) => Some(result.outcome),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn download_copies_every_byte() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    client.change_directory("pub").await.unwrap();
    let dir = tempdir().unwrap();
    let local = dir.path().join("data.bin");
    let mut rx = client.subscribe();

    let n = client.download("data.bin", &local, false).await.unwrap();
    assert_eq!(n, DATA_LEN as u64);
    assert_eq!(std::fs::read(&local).unwrap(), data_bytes());
    assert!(server.commands().contains(&"TYPE I".to_string()));
    assert!(server.commands().contains(&"RETR data.bin".to_string()));

    let events = drain(&mut rx);
    let begin = events
        .iter()
        .position(|e| matches!(e, FtpEvent::BeginTransfer(_)))
        .unwrap();
    let end = events
        .iter()
        .position(|e| matches!(e, FtpEvent::EndTransfer(_)))
        .unwrap();
    assert!(begin < end);
    match &events[end] {
        FtpEvent::EndTransfer(info) => {
            assert_eq!(info.direction, TransferDirection::Download);
            assert_eq!(info.total_bytes, DATA_LEN as u64);
            assert_eq!(info.transferred_bytes, DATA_LEN as u64);
        }
        _ => unreachable!(),
    }

    let progress: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            FtpEvent::TransferProgress(p) => Some(p.transferred_bytes),
            _ => None,
        })
        .collect();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert!(progress.iter().all(|&p| p <= DATA_LEN as u64));

    // The synchronous path reports through its result only.
    assert!(notifications(&events).is_empty());
}

#[tokio::test]
async fn download_keeps_the_listing_timestamp() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();
    let local = dir.path().join("readme.txt");

    client.download("readme.txt", &local, false).await.unwrap();

    let mtime = FileTime::from_last_modification_time(&std::fs::metadata(&local).unwrap());
    let expected = NaiveDate::from_ymd_opt(2020, 1, 10)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp();
    assert_eq!(mtime.unix_seconds(), expected);
}

#[tokio::test]
async fn empty_file_downloads_without_progress() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    client.change_directory("/pub").await.unwrap();
    let dir = tempdir().unwrap();
    let local = dir.path().join("empty.dat");
    let mut rx = client.subscribe();

    assert_eq!(client.download("empty.dat", &local, false).await.unwrap(), 0);
    assert_eq!(std::fs::metadata(&local).unwrap().len(), 0);

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, FtpEvent::TransferProgress(_))));
    assert!(events.iter().any(|e| matches!(e, FtpEvent::EndTransfer(_))));
}

#[tokio::test]
async fn unknown_remote_file_is_not_found() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();

    let err = client
        .download("ghost.bin", &dir.path().join("ghost.bin"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, FtpError::FileNotFound(ref name) if name == "ghost.bin"));
    assert_eq!(server.count("RETR"), 0);
    assert!(!client.is_busy().unwrap());
}

#[tokio::test]
async fn upload_stores_the_local_file() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let root = client.root_directory().unwrap();
    let dir = tempdir().unwrap();
    let local = dir.path().join("up.bin");
    let content: Vec<u8> = (0..5_000u32).map(|i| (i % 7) as u8).collect();
    std::fs::write(&local, &content).unwrap();

    assert_eq!(client.upload(&local, "up.bin").await.unwrap(), 5_000);
    assert_eq!(server.file("/up.bin").unwrap(), content);
    assert!(server.commands().contains(&"STOR up.bin".to_string()));

    let cached = client.find_file(root, "up.bin").await.unwrap().unwrap();
    assert_eq!(cached.size(), 5_000);
}

#[tokio::test]
async fn upload_of_missing_local_file_fails_locally() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();

    let err = client
        .upload(&dir.path().join("absent.bin"), "absent.bin")
        .await
        .unwrap_err();
    assert!(matches!(err, FtpError::Io(_)));
    assert!(!client.is_busy().unwrap());
    assert_eq!(server.count("STOR"), 0);
}

#[tokio::test]
async fn resumed_download_appends_the_rest() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    client.change_directory("pub").await.unwrap();
    let dir = tempdir().unwrap();
    let local = dir.path().join("data.bin");
    let data = data_bytes();
    std::fs::write(&local, &data[..4_000]).unwrap();

    let n = client.download("data.bin", &local, true).await.unwrap();
    assert_eq!(n, DATA_LEN as u64);
    assert_eq!(std::fs::read(&local).unwrap(), data);

    let commands = server.commands();
    let rest = commands.iter().position(|c| c == "REST 4000").unwrap();
    let retr = commands.iter().position(|c| c == "RETR data.bin").unwrap();
    assert!(rest < retr);
}

#[tokio::test]
async fn resume_without_local_file_starts_over() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();
    let local = dir.path().join("readme.txt");

    client.download("readme.txt", &local, true).await.unwrap();
    assert_eq!(std::fs::read(&local).unwrap(), README);
    assert_eq!(server.count("REST"), 0);
}

#[tokio::test]
async fn bad_completion_reply_fails_the_transfer() {
    let server = MockServer::start().await;
    server
        .fs
        .lock()
        .unwrap()
        .files
        .insert(format!("/{}", FAILING_FILE), vec![1u8; 300]);
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();
    let local = dir.path().join(FAILING_FILE);

    let err = client.download(FAILING_FILE, &local, false).await.unwrap_err();
    assert!(matches!(err, FtpError::TransferFailed(ref r) if r.code() == 451));
    assert!(!client.is_busy().unwrap());

    let mut rx = client.subscribe();
    let handle = client
        .download_async(FAILING_FILE, &local, false)
        .await
        .unwrap();
    assert!(matches!(handle.join().await, Err(FtpError::TransferFailed(_))));
    assert_eq!(notifications(&drain(&mut rx)), [AsyncOutcome::Fail]);

    // The control channel is still in step.
    client
        .download("readme.txt", &dir.path().join("readme.txt"), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn background_download_notifies_completion() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();
    let local = dir.path().join("readme.txt");
    let mut rx = client.subscribe();

    let handle = client.download_async("readme.txt", &local, false).await.unwrap();
    assert_eq!(handle.direction(), TransferDirection::Download);
    assert_eq!(handle.remote_name(), "readme.txt");
    assert_eq!(handle.join().await.unwrap(), README.len() as u64);
    assert_eq!(std::fs::read(&local).unwrap(), README);

    let events = drain(&mut rx);
    assert_eq!(notifications(&events), [AsyncOutcome::Complete]);
    assert!(!client.is_busy().unwrap());
}

#[tokio::test]
async fn background_upload_notifies_completion() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();
    let local = dir.path().join("note.txt");
    std::fs::write(&local, b"uploaded in the background").unwrap();
    let mut rx = client.subscribe();

    let handle = client.upload_async(&local, "note.txt").await.unwrap();
    assert_eq!(handle.direction(), TransferDirection::Upload);
    assert_eq!(handle.join().await.unwrap(), 26);
    assert_eq!(
        server.file("/note.txt").unwrap(),
        b"uploaded in the background"
    );
    assert_eq!(notifications(&drain(&mut rx)), [AsyncOutcome::Complete]);
}

#[tokio::test]
async fn listing_during_background_upload_sees_the_new_file() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let root = client.root_directory().unwrap();
    assert!(client.find_file(root, "note.txt").await.unwrap().is_none());
    let dir = tempdir().unwrap();
    let local = dir.path().join("note.txt");
    std::fs::write(&local, b"listed after the upload").unwrap();

    let handle = client.upload_async(&local, "note.txt").await.unwrap();
    // Waits for the upload to release the control channel.
    let names: Vec<String> = client
        .files(root)
        .await
        .unwrap()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert!(names.contains(&"note.txt".to_string()));
    handle.join().await.unwrap();

    let commands = server.commands();
    let stor = commands.iter().position(|c| c == "STOR note.txt").unwrap();
    let relist = commands.iter().rposition(|c| c == "LIST").unwrap();
    assert!(stor < relist);
    assert!(client.find_file(root, "note.txt").await.unwrap().is_some());
}

#[tokio::test]
async fn refused_retrieve_leaves_the_session_usable() {
    let server = MockServer::start().await;
    server.fs.lock().unwrap().extra_listing.insert(
        "/".into(),
        vec!["-rw-r--r--   1 owner group       12 Jan 10 2020 phantom.bin".into()],
    );
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();

    let err = client
        .download("phantom.bin", &dir.path().join("phantom.bin"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, FtpError::CommandFailed { ref response, .. } if response.code() == 550));
    assert!(!client.is_busy().unwrap());

    let local = dir.path().join("readme.txt");
    assert_eq!(
        client.download("readme.txt", &local, false).await.unwrap(),
        README.len() as u64
    );
}

#[tokio::test]
async fn abort_handle_stops_a_foreground_download() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();
    let mut rx = client.subscribe();
    let aborter = client.abort_handle().unwrap();

    let watcher = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if matches!(event, FtpEvent::TransferProgress(_)) {
                break;
            }
        }
        assert!(aborter.is_busy());
        aborter.abort().await;
    });

    let result = timeout(
        Duration::from_secs(5),
        client.download(STALLING_FILE, &dir.path().join(STALLING_FILE), false),
    )
    .await
    .unwrap();
    assert!(matches!(result, Err(FtpError::UserAbort)));
    timeout(Duration::from_secs(5), watcher).await.unwrap().unwrap();
    assert!(!client.is_busy().unwrap());

    let other = dir.path().join("readme.txt");
    let n = client.download("readme.txt", &other, false).await.unwrap();
    assert_eq!(n, README.len() as u64);
}

#[tokio::test]
async fn abort_unblocks_a_stalled_transfer() {
    let server = MockServer::start().await;
    let mut client = server.logged_in_client().await;
    let dir = tempdir().unwrap();
    let mut rx = client.subscribe();

    let handle = client
        .download_async(STALLING_FILE, &dir.path().join(STALLING_FILE), false)
        .await
        .unwrap();

    // Wait until bytes are flowing.
    timeout(Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            if matches!(event, FtpEvent::TransferProgress(_)) {
                break;
            }
        }
    })
    .await
    .unwrap();

    assert!(client.is_busy().unwrap());
    let other = dir.path().join("readme.txt");
    assert!(matches!(
        client.download("readme.txt", &other, false).await,
        Err(FtpError::TransferConflict)
    ));
    assert!(matches!(
        client.upload(&other, "readme.txt").await,
        Err(FtpError::TransferConflict)
    ));

    timeout(Duration::from_secs(5), client.abort_transfer())
        .await
        .unwrap()
        .unwrap();
    assert!(!client.is_busy().unwrap());
    assert!(matches!(handle.join().await, Err(FtpError::UserAbort)));
    assert!(aborted_after_progress(&drain(&mut rx)));

    // The 426 was consumed, so the session keeps working.
    let n = client.download("readme.txt", &other, false).await.unwrap();
    assert_eq!(n, README.len() as u64);
}

fn aborted_after_progress(events: &[FtpEvent]) -> bool {
    let aborted = notifications(events) == [AsyncOutcome::Abort];
    let ended = events.iter().any(|e| {
        matches!(e, FtpEvent::EndTransfer(info) if info.transferred_bytes > 0)
    });
    aborted && ended
}
