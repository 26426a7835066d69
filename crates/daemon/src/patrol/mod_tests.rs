// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;

/// Patrol that records start times and sleeps for a configured duration.
struct SlowPatrol {
    name: &'static str,
    body_duration: Duration,
    starts: Arc<Mutex<Vec<std::time::Instant>>>,
    concurrent: Arc<AtomicBool>,
    overlapped: Arc<AtomicBool>,
}

#[async_trait]
impl Patrol for SlowPatrol {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<(), PatrolError> {
        if self.concurrent.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.starts.lock().push(std::time::Instant::now());
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.body_duration) => {}
        }
        self.concurrent.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// Single-flight: interval 100ms, body 300ms, observed for ~1s. Ticks at
// 100..1000ms fire 10 times but only 3-4 bodies may start, and no two
// bodies of the same patrol ever overlap.
#[tokio::test]
async fn overlapping_ticks_are_dropped_not_queued() {
    let starts = Arc::new(Mutex::new(Vec::new()));
    let overlapped = Arc::new(AtomicBool::new(false));
    let patrol = Arc::new(SlowPatrol {
        name: "compactor_dog",
        body_duration: Duration::from_millis(300),
        starts: Arc::clone(&starts),
        concurrent: Arc::new(AtomicBool::new(false)),
        overlapped: Arc::clone(&overlapped),
    });

    let cancel = CancellationToken::new();
    let scheduler = PatrolScheduler::start(
        vec![(patrol as Arc<dyn Patrol>, Duration::from_millis(100))],
        cancel.clone(),
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    scheduler.shutdown().await;

    let count = starts.lock().len();
    assert!(
        (2..=5).contains(&count),
        "expected roughly 3-4 body starts, got {count}"
    );
    assert!(
        !overlapped.load(Ordering::SeqCst),
        "two bodies of one patrol must never run concurrently"
    );
}

#[tokio::test]
async fn cancellation_stops_new_ticks() {
    let starts = Arc::new(Mutex::new(Vec::new()));
    let patrol = Arc::new(SlowPatrol {
        name: "doctor_dog",
        body_duration: Duration::from_millis(1),
        starts: Arc::clone(&starts),
        concurrent: Arc::new(AtomicBool::new(false)),
        overlapped: Arc::new(AtomicBool::new(false)),
    });

    let cancel = CancellationToken::new();
    let scheduler = PatrolScheduler::start(
        vec![(patrol as Arc<dyn Patrol>, Duration::from_millis(20))],
        cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(110)).await;
    cancel.cancel();
    scheduler.shutdown().await;
    let after_shutdown = starts.lock().len();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(starts.lock().len(), after_shutdown, "no ticks after cancel");
    assert!(after_shutdown >= 2, "ticker was live before cancel");
}

/// Patrol that always fails; the scheduler must keep ticking.
struct FailingPatrol {
    runs: Arc<Mutex<u32>>,
}

#[async_trait]
impl Patrol for FailingPatrol {
    fn name(&self) -> &'static str {
        "wisp_reaper"
    }

    async fn run(&self, _cancel: &CancellationToken) -> Result<(), PatrolError> {
        *self.runs.lock() += 1;
        Err(PatrolError::Other("scripted failure".to_string()))
    }
}

#[tokio::test]
async fn failing_bodies_do_not_stop_the_ticker() {
    let runs = Arc::new(Mutex::new(0));
    let patrol = Arc::new(FailingPatrol {
        runs: Arc::clone(&runs),
    });

    let cancel = CancellationToken::new();
    let scheduler = PatrolScheduler::start(
        vec![(patrol as Arc<dyn Patrol>, Duration::from_millis(10))],
        cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    scheduler.shutdown().await;

    assert!(*runs.lock() >= 3, "kept running after failures");
}
