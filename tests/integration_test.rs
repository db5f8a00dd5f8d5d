use std::collections::HashMap;
use std::time::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;
use vaultdrop::{
    login, AuthSession, FileDescriptor, NotificationKind, SessionConfig, StepPolicy, UploadEvent,
    UploadId, UploadSession, UploadStatus,
};

const TICK: Duration = Duration::from_millis(300);

fn user() -> AuthSession {
    login("tester", "secret").unwrap()
}

fn config(failure_probability: f64) -> SessionConfig {
    SessionConfig {
        failure_probability,
        tick_interval: TICK,
        ..Default::default()
    }
}

fn png(name: &str) -> FileDescriptor {
    FileDescriptor::new(name, 1024, "image/png")
}

/// 把时间推进到下一个 tick 的中间位置，避免和生成器的 tick 落在同一时刻
async fn half_tick() {
    tokio::time::sleep(TICK / 2).await;
}

async fn ticks(n: u32) {
    tokio::time::sleep(TICK * n).await;
}

fn progress_of(session: &UploadSession) -> HashMap<UploadId, (u8, UploadStatus)> {
    session
        .list()
        .into_iter()
        .map(|task| (task.id, (task.progress, task.status)))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_png_completes_without_failures() {
    let session = UploadSession::new(&user(), config(0.0)).unwrap();
    let ids = session.submit(vec![png("photo.png")]);
    assert_eq!(ids.len(), 1);

    let task = session.get(ids[0]).unwrap();
    assert_eq!(task.status, UploadStatus::Uploading);
    assert_eq!(task.progress, 0);
    assert_eq!(task.attempts, 1);

    half_tick().await;
    ticks(10).await;

    let tasks = session.list();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, UploadStatus::Completed);
    assert_eq!(tasks[0].progress, 100);
    assert!(tasks[0].completed_at.is_some());
    assert!(tasks[0].failure_reason.is_none());

    assert!(session
        .notifications()
        .list()
        .iter()
        .any(|n| n.kind == NotificationKind::Success && n.message == "photo.png uploaded successfully"));
}

#[tokio::test(start_paused = true)]
async fn test_fixed_step_advances_ten_per_tick() {
    let session = UploadSession::new(&user(), config(0.0)).unwrap();
    let id = session.submit(vec![png("photo.png")])[0];

    half_tick().await;
    for expected in (10..100u8).step_by(10) {
        ticks(1).await;
        let task = session.get(id).unwrap();
        assert_eq!(task.progress, expected);
        assert_eq!(task.status, UploadStatus::Uploading);
    }
}

#[tokio::test(start_paused = true)]
async fn test_oversized_file_rejected_immediately() {
    let config = SessionConfig {
        max_file_size: 5 * 1024 * 1024,
        ..config(0.0)
    };
    let session = UploadSession::new(&user(), config).unwrap();
    session.submit(vec![FileDescriptor::new("video.png", 10 * 1024 * 1024, "image/png")]);

    let tasks = session.list();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, UploadStatus::Error);
    assert_eq!(tasks[0].failure_reason.as_deref(), Some("File too large"));
    assert_eq!(tasks[0].progress, 0);
    assert_eq!(tasks[0].attempts, 0);

    let notifications = session.notifications().list();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Error);
    assert_eq!(notifications[0].message, "video.png exceeds 5MB");

    // 被拒绝的任务不会自己推进
    ticks(20).await;
    let task = &session.list()[0];
    assert_eq!(task.status, UploadStatus::Error);
    assert_eq!(task.progress, 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_type_rejected() {
    let session = UploadSession::new(&user(), config(0.0)).unwrap();
    session.submit(vec![
        FileDescriptor::new("notes.txt", 10, "text/plain"),
        png("ok.png"),
    ]);

    let tasks = session.list();
    assert_eq!(tasks[0].name, "notes.txt");
    assert_eq!(tasks[0].status, UploadStatus::Error);
    assert_eq!(tasks[0].failure_reason.as_deref(), Some("Invalid file type"));
    assert_eq!(tasks[1].name, "ok.png");
    assert_eq!(tasks[1].status, UploadStatus::Uploading);

    let messages: Vec<_> = session.notifications().list().into_iter().map(|n| n.message).collect();
    assert_eq!(messages, vec!["notes.txt type not allowed", "Uploading 1 file"]);
}

#[tokio::test(start_paused = true)]
async fn test_empty_allow_list_accepts_any_type() {
    let config = SessionConfig {
        allowed_types: Vec::new(),
        ..config(0.0)
    };
    let session = UploadSession::new(&user(), config).unwrap();
    session.submit(vec![FileDescriptor::new("notes.txt", 10, "text/plain")]);

    assert_eq!(session.list()[0].status, UploadStatus::Uploading);
}

#[tokio::test(start_paused = true)]
async fn test_randomized_progress_is_monotonic() {
    let config = SessionConfig {
        step: StepPolicy::Randomized { max_step: 15 },
        seed: Some(42),
        ..config(0.5)
    };
    let session = UploadSession::new(&user(), config).unwrap();
    let ids = session.submit((0..5).map(|i| png(&format!("file-{i}.png"))));

    let mut last: HashMap<UploadId, u8> = ids.iter().map(|id| (*id, 0)).collect();
    half_tick().await;

    // 每次至少 +1，最多 100 个 tick 一定结束
    for _ in 0..=100 {
        ticks(1).await;
        for task in session.list() {
            assert!(task.progress <= 100);
            assert!(task.progress >= last[&task.id], "progress decreased for {}", task.name);
            last.insert(task.id, task.progress);
            if task.status.is_terminal() {
                assert_eq!(task.progress, 100);
            }
        }
    }

    assert!(session.list().iter().all(|task| task.status.is_terminal()));
}

#[tokio::test(start_paused = true)]
async fn test_retry_ignored_unless_failed() {
    let session = UploadSession::new(&user(), config(0.0)).unwrap();
    let id = session.submit(vec![png("photo.png")])[0];

    half_tick().await;
    ticks(3).await;
    let before = session.get(id).unwrap();
    assert_eq!(before.status, UploadStatus::Uploading);

    session.retry(id);
    assert_eq!(session.get(id).unwrap(), before);

    ticks(10).await;
    let completed = session.get(id).unwrap();
    assert_eq!(completed.status, UploadStatus::Completed);

    session.retry(id);
    assert_eq!(session.get(id).unwrap(), completed);

    // 不存在的 id 也是 no-op
    session.retry(UploadId::new());
    assert_eq!(session.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_simulated_failure() {
    let session = UploadSession::new(&user(), config(1.0)).unwrap();
    let id = session.submit(vec![png("photo.png")])[0];

    half_tick().await;
    ticks(10).await;
    let failed = session.get(id).unwrap();
    assert_eq!(failed.status, UploadStatus::Error);
    assert_eq!(failed.progress, 100);
    assert_eq!(failed.failure_reason.as_deref(), Some("Upload failed"));
    assert!(failed.completed_at.is_none());

    session.retry(id);
    let retried = session.get(id).unwrap();
    assert_eq!(retried.status, UploadStatus::Uploading);
    assert_eq!(retried.progress, 0);
    assert_eq!(retried.attempts, 2);
    assert!(retried.failure_reason.is_none());
    assert!(session
        .notifications()
        .list()
        .iter()
        .any(|n| n.kind == NotificationKind::Info && n.message == "Retrying photo.png"));

    half_tick().await;
    ticks(1).await;
    assert_eq!(session.get(id).unwrap().progress, 10);

    ticks(10).await;
    let again = session.get(id).unwrap();
    assert!(again.status.is_terminal());
    assert_eq!(again.progress, 100);
}

#[tokio::test(start_paused = true)]
async fn test_retry_is_not_doubled() {
    let session = UploadSession::new(&user(), config(1.0)).unwrap();
    let id = session.submit(vec![png("photo.png")])[0];

    half_tick().await;
    ticks(10).await;
    session.retry(id);
    // 第二次 retry 时任务已经是 uploading，必须被忽略
    session.retry(id);
    assert_eq!(session.get(id).unwrap().attempts, 2);

    half_tick().await;
    ticks(1).await;
    assert_eq!(session.get(id).unwrap().progress, 10);
}

#[tokio::test(start_paused = true)]
async fn test_retry_keeps_rejected_file_failed() {
    let config = SessionConfig {
        max_file_size: 5 * 1024 * 1024,
        ..config(0.0)
    };
    let session = UploadSession::new(&user(), config).unwrap();
    let id = session.submit(vec![FileDescriptor::new("video.png", 10 * 1024 * 1024, "image/png")])[0];
    let rejected = session.get(id).unwrap();

    session.retry(id);
    assert_eq!(session.get(id).unwrap(), rejected);

    // 超限文件重试后也不能被模拟传输推进到完成
    half_tick().await;
    ticks(11).await;
    let task = session.get(id).unwrap();
    assert_eq!(task.status, UploadStatus::Error);
    assert_eq!(task.progress, 0);
    assert_eq!(task.attempts, 0);
    assert_eq!(task.failure_reason.as_deref(), Some("File too large"));

    let messages: Vec<_> = session.notifications().list().into_iter().map(|n| n.message).collect();
    assert!(!messages.iter().any(|m| m.starts_with("Retrying")));
}

#[tokio::test(start_paused = true)]
async fn test_delete_is_idempotent() {
    let session = UploadSession::new(&user(), config(0.0)).unwrap();
    let id = session.submit(vec![png("photo.png")])[0];
    let before = session.notifications().list().len();

    session.delete(id);
    assert!(session.get(id).is_none());
    let after_first = session.notifications().list();
    assert_eq!(after_first.len(), before + 1);
    assert_eq!(after_first.last().unwrap().message, "photo.png deleted");
    assert_eq!(after_first.last().unwrap().kind, NotificationKind::Info);

    session.delete(id);
    assert!(session.get(id).is_none());
    assert_eq!(session.notifications().list().len(), before + 1);

    // 被删除任务的生成器不能再写入
    ticks(20).await;
    assert!(session.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delete_does_not_disturb_siblings() {
    let config = SessionConfig {
        step: StepPolicy::Randomized { max_step: 15 },
        ..config(0.5)
    };
    let rng_seed = 7;
    let files: Vec<_> = (0..6).map(|i| png(&format!("file-{i}.png"))).collect();

    let baseline = UploadSession::with_rng(&user(), config.clone(), StdRng::seed_from_u64(rng_seed)).unwrap();
    let subject = UploadSession::with_rng(&user(), config, StdRng::seed_from_u64(rng_seed)).unwrap();
    let baseline_ids = baseline.submit(files.clone());
    let subject_ids = subject.submit(files);
    let victim = 2;

    half_tick().await;
    for tick in 0..120 {
        if tick == 3 {
            subject.delete(subject_ids[victim]);
        }

        let expected = progress_of(&baseline);
        let actual = progress_of(&subject);
        for (index, (baseline_id, subject_id)) in baseline_ids.iter().zip(&subject_ids).enumerate() {
            if index == victim && tick >= 3 {
                assert!(!actual.contains_key(subject_id));
                continue;
            }
            assert_eq!(expected[baseline_id], actual[subject_id], "task {index} diverged at tick {tick}");
        }

        ticks(1).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_notifications_expire() {
    let config = SessionConfig {
        notification_lifetime: Duration::from_millis(3000),
        ..config(0.0)
    };
    let session = UploadSession::new(&user(), config).unwrap();
    session.submit(vec![FileDescriptor::new("notes.txt", 10, "text/plain")]);
    assert_eq!(session.notifications().list().len(), 1);

    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert!(session.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_clear_finished_removes_completed_only() {
    let session = UploadSession::new(&user(), config(0.0)).unwrap();
    session.submit(vec![png("done.png"), FileDescriptor::new("bad.txt", 10, "text/plain")]);

    half_tick().await;
    ticks(10).await;
    assert_eq!(session.clear_finished(), 1);

    let tasks = session.list();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "bad.txt");
    assert_eq!(session.clear_finished(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_event_stream() {
    let session = UploadSession::new(&user(), config(0.0)).unwrap();
    let mut all = session.subscribe_events();

    let ids = session.submit(vec![png("photo.png"), png("other.png")]);
    let (id, other) = (ids[0], ids[1]);
    let mut events = session.subscribe_task(id);
    assert_eq!(events.upload_id(), id);

    match all.recv().await.unwrap() {
        UploadEvent::Submitted { upload_id, status } => {
            assert_eq!(upload_id, id);
            assert_eq!(status, UploadStatus::Uploading);
        }
        other => panic!("Expected Submitted event, got {:?}", other),
    }

    half_tick().await;
    ticks(10).await;
    session.delete(other);
    session.delete(id);

    let mut progress = Vec::new();
    let changed = loop {
        match events.recv().await.unwrap() {
            UploadEvent::Progress { upload_id, progress: value } => {
                assert_eq!(upload_id, id);
                progress.push(value);
            }
            event => break event,
        }
    };
    assert_eq!(progress, (10..=100u8).step_by(10).collect::<Vec<_>>());
    match changed {
        UploadEvent::StateChanged { upload_id, old_status, new_status } => {
            assert_eq!(upload_id, id);
            assert_eq!(old_status, UploadStatus::Uploading);
            assert_eq!(new_status, UploadStatus::Completed);
        }
        other => panic!("Expected StateChanged event, got {:?}", other),
    }

    // 其他任务的 Removed 不会出现在这个流里
    let removed = events.recv().await.unwrap();
    assert!(matches!(removed, UploadEvent::Removed { .. }));
    assert_eq!(removed.upload_id(), id);
    assert!(events.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_freezes_progress() {
    let session = UploadSession::new(&user(), config(0.0)).unwrap();
    let id = session.submit(vec![png("photo.png")])[0];

    half_tick().await;
    ticks(2).await;
    session.shutdown();
    let frozen = session.get(id).unwrap();

    ticks(20).await;
    assert_eq!(session.get(id).unwrap(), frozen);
}

#[test]
fn test_session_requires_runtime() {
    let err = UploadSession::new(&user(), SessionConfig::default()).err().unwrap();
    assert!(matches!(err, vaultdrop::SessionError::NoRuntime(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_stress() {
    let config = SessionConfig {
        tick_interval: Duration::from_millis(2),
        step: StepPolicy::Randomized { max_step: 15 },
        ..config(0.3)
    };
    let session = std::sync::Arc::new(UploadSession::new(&user(), config).unwrap());
    let ids = session.submit((0..40).map(|i| png(&format!("file-{i}.png"))));

    let deleter = {
        let session = session.clone();
        let ids = ids.clone();
        tokio::spawn(async move {
            for id in ids.iter().step_by(4) {
                session.delete(*id);
                tokio::task::yield_now().await;
            }
        })
    };
    deleter.await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        for task in session.list() {
            if task.status == UploadStatus::Error {
                session.retry(task.id);
            }
        }
        let tasks = session.list();
        if tasks.iter().all(|task| task.status == UploadStatus::Completed) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "uploads did not settle");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let tasks = session.list();
    assert_eq!(tasks.len(), 30);
    assert!(tasks.iter().all(|task| task.progress == 100 && task.completed_at.is_some()));
}
