use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::*;

fn limits(capacity: usize) -> TaskLimits {
    TaskLimits {
        capacity,
        max_running_time: Duration::from_secs(10),
        cancel_grace: Duration::from_millis(200),
        allow_blocking: true,
    }
}

async fn settle(manager: &TaskManager) {
    manager.join(Duration::from_secs(5)).await;
}

/// Records how many probes run at once.
#[derive(Default)]
struct Probe {
    now: AtomicUsize,
    peak: AtomicUsize,
}

impl Probe {
    fn work(self: &Arc<Self>, hold: Duration) -> Work {
        let probe = Arc::clone(self);
        Work::future(async move {
            let n = probe.now.fetch_add(1, Ordering::SeqCst) + 1;
            probe.peak.fetch_max(n, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            probe.now.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_concurrency_never_exceeds_capacity() {
    let manager = TaskManager::new("test", limits(3));
    let probe = Arc::new(Probe::default());

    for _ in 0..10 {
        manager.spawn(probe.work(Duration::from_millis(20))).await.unwrap();
        assert!(manager.running() <= 3);
    }
    settle(&manager).await;

    assert_eq!(probe.peak.load(Ordering::SeqCst), 3);
    assert_eq!(manager.stats().completed, 10);
    assert!(manager.is_empty());
    assert_eq!(manager.available_slots(), 3);
}

#[tokio::test]
async fn test_spawner_waits_for_admission() {
    let manager = TaskManager::new("test", limits(1));
    let release = Arc::new(tokio::sync::Notify::new());

    let gate = Arc::clone(&release);
    manager
        .spawn(Work::future(async move {
            gate.notified().await;
            Ok(())
        }))
        .await
        .unwrap();
    assert!(manager.is_full());
    assert_eq!(manager.running(), 1);

    let second = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.spawn(Work::future(async { Ok(()) })).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!second.is_finished());
    assert_eq!(manager.waiting(), 1);

    release.notify_one();
    second.await.unwrap().unwrap();
    settle(&manager).await;
    assert_eq!(manager.stats().completed, 2);
}

#[tokio::test]
async fn test_timeout_releases_slot() {
    let manager = TaskManager::new(
        "test",
        TaskLimits {
            max_running_time: Duration::from_millis(50),
            ..limits(1)
        },
    );

    let started = Instant::now();
    manager
        .spawn(Work::future(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }))
        .await
        .unwrap();

    // Admission of the next task proves the slot came back.
    manager.spawn(Work::future(async { Ok(()) })).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));

    settle(&manager).await;
    let stats = manager.stats();
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn test_blocking_timeout_does_not_wait_for_thread() {
    let manager = TaskManager::new(
        "test",
        TaskLimits {
            max_running_time: Duration::from_millis(30),
            ..limits(1)
        },
    );

    manager
        .spawn(Work::blocking(|| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }))
        .await
        .unwrap();

    let started = Instant::now();
    manager.join(Duration::from_secs(5)).await;
    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(manager.stats().timed_out, 1);
}

#[tokio::test]
async fn test_faults_are_swallowed_and_counted() {
    let manager = TaskManager::new("test", limits(2));

    manager
        .spawn(Work::future(async { Err(anyhow::anyhow!("bad input")) }))
        .await
        .unwrap();
    manager
        .spawn(Work::future(async { panic!("handler bug") }))
        .await
        .unwrap();
    manager
        .spawn(Work::blocking(|| Err(anyhow::anyhow!("disk full"))))
        .await
        .unwrap();
    settle(&manager).await;

    let stats = manager.stats();
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.completed, 0);
    assert_eq!(manager.available_slots(), 2);
}

#[tokio::test]
async fn test_blocking_work_rejected_when_disabled() {
    let manager = TaskManager::new(
        "test",
        TaskLimits {
            allow_blocking: false,
            ..limits(1)
        },
    );
    let err = manager.spawn(Work::blocking(|| Ok(()))).await.unwrap_err();
    assert_eq!(err, TaskError::InvalidTaskKind(WorkKind::Blocking));
    assert!(manager.is_empty());
    assert_eq!(manager.stats().total(), 0);
}

#[tokio::test]
async fn test_join_with_nothing_outstanding_is_immediate() {
    let manager = TaskManager::new("test", limits(1));
    let started = Instant::now();
    manager.join(Duration::from_secs(5)).await;
    manager.join(Duration::from_secs(5)).await;
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn test_join_waits_for_running_tasks() {
    let manager = TaskManager::new("test", limits(2));
    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    manager
        .spawn(Work::future(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }))
        .await
        .unwrap();

    manager.join(Duration::from_secs(2)).await;
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(manager.stats().completed, 1);
}

#[tokio::test]
async fn test_join_cancels_stragglers() {
    let manager = TaskManager::new("test", limits(2));
    let unwound = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&unwound);
    manager
        .spawn(Work::cancellable(move |token| async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
            Err(anyhow::anyhow!("interrupted"))
        }))
        .await
        .unwrap();
    // Ignores the token; stopped by abort.
    manager
        .spawn(Work::future(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }))
        .await
        .unwrap();

    let started = Instant::now();
    manager.join(Duration::from_millis(50)).await;
    assert!(started.elapsed() < Duration::from_secs(1));

    assert!(unwound.load(Ordering::SeqCst));
    assert!(manager.is_empty());
    let stats = manager.stats();
    assert_eq!(stats.cancelled, 2);
    assert_eq!(stats.failed, 0);

    // Idempotent, and closed to new work.
    manager.join(Duration::from_millis(50)).await;
    let err = manager.spawn(Work::future(async { Ok(()) })).await.unwrap_err();
    assert_eq!(err, TaskError::ShuttingDown);
}

#[tokio::test]
async fn test_waiting_spawner_rejected_when_join_gives_up() {
    let manager = TaskManager::new("test", limits(1));
    manager
        .spawn(Work::future(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }))
        .await
        .unwrap();

    let waiting = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.spawn(Work::future(async { Ok(()) })).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(manager.waiting(), 1);

    manager.join(Duration::from_millis(30)).await;
    assert_eq!(waiting.await.unwrap(), Err(TaskError::ShuttingDown));
    assert!(manager.is_empty());
}
