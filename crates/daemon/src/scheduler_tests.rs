// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Dispatcher that sleeps `argv[1]` milliseconds and records completions,
/// tracking the maximum observed concurrency.
struct SleepDispatcher {
    completions: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl SleepDispatcher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            completions: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        })
    }

    fn completions(&self) -> Vec<String> {
        self.completions.lock().clone()
    }

    fn max_observed(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandDispatcher for SleepDispatcher {
    async fn dispatch(&self, argv: &[String], _cancel: CancellationToken) -> RunOutcome {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let millis = argv.get(1).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.completions.lock().push(argv[0].clone());
        RunOutcome {
            code: 0,
            stdout: format!("{}\n", argv[0]),
            stderr: String::new(),
        }
    }
}

fn config(max_active: usize, max_queue_depth: usize, queue_wait_ms: u64) -> SchedulerConfig {
    SchedulerConfig {
        max_active,
        max_queue_depth,
        queue_wait: Duration::from_millis(queue_wait_ms),
    }
}

fn task(label: &str, sleep_ms: u64) -> Vec<String> {
    vec![label.to_string(), sleep_ms.to_string()]
}

fn submit(
    scheduler: &LaneScheduler,
    lane: &str,
    label: &str,
    sleep_ms: u64,
) -> Result<tokio::sync::oneshot::Receiver<TaskResult>, Error> {
    scheduler.submit(
        task(label, sleep_ms),
        lane.to_string(),
        Family::Control,
        CancellationToken::new(),
    )
}

// Queue saturation: with max_active=1 and depth=2, the fourth submission
// to one lane fails immediately and the first three complete in order.
#[tokio::test]
async fn queue_saturation_rejects_fourth_task() {
    let dispatcher = SleepDispatcher::new();
    let scheduler = LaneScheduler::new(dispatcher.clone(), config(1, 2, 10_000));

    let rx1 = submit(&scheduler, "session:s-x", "t1", 100).unwrap();
    let rx2 = submit(&scheduler, "session:s-x", "t2", 10).unwrap();
    let rx3 = submit(&scheduler, "session:s-x", "t3", 10).unwrap();

    let err = submit(&scheduler, "session:s-x", "t4", 10).unwrap_err();
    assert_eq!(err.code, ErrorCode::DaemonQueueSaturated);
    assert!(err.retryable());

    for rx in [rx1, rx2, rx3] {
        rx.await.unwrap().unwrap();
    }
    assert_eq!(dispatcher.completions(), ["t1", "t2", "t3"]);
}

// Queue-wait deadline: the queued task fails with a timeout while the
// running task is unaffected.
#[tokio::test]
async fn queue_wait_deadline_expires_queued_task() {
    let dispatcher = SleepDispatcher::new();
    let scheduler = LaneScheduler::new(dispatcher.clone(), config(1, 8, 100));

    let rx1 = submit(&scheduler, "session:s-x", "slow", 500).unwrap();
    let rx2 = submit(&scheduler, "session:s-x", "starved", 10).unwrap();

    let err = rx2.await.unwrap().unwrap_err();
    assert_eq!(err.code, ErrorCode::DaemonQueueTimeout);
    assert!(err.retryable());

    let outcome = rx1.await.unwrap().unwrap();
    assert_eq!(outcome.code, 0);
    assert_eq!(dispatcher.completions(), ["slow"]);
}

// Within a lane tasks complete in submission order, even when later tasks
// would finish faster.
#[tokio::test]
async fn lane_is_fifo() {
    let dispatcher = SleepDispatcher::new();
    let scheduler = LaneScheduler::new(dispatcher.clone(), config(4, 8, 10_000));

    let receivers: Vec<_> = [("a", 80u64), ("b", 40), ("c", 10), ("d", 0)]
        .iter()
        .map(|(label, ms)| submit(&scheduler, "session:s-x", label, *ms).unwrap())
        .collect();
    for rx in receivers {
        rx.await.unwrap().unwrap();
    }
    assert_eq!(dispatcher.completions(), ["a", "b", "c", "d"]);
}

// Unrelated lanes run in parallel, bounded by max_active.
#[tokio::test]
async fn lanes_run_concurrently_up_to_max_active() {
    let dispatcher = SleepDispatcher::new();
    let scheduler = LaneScheduler::new(dispatcher.clone(), config(2, 8, 10_000));

    let receivers: Vec<_> = (0..6)
        .map(|i| submit(&scheduler, &format!("session:s-{i}"), &format!("t{i}"), 50).unwrap())
        .collect();
    for rx in receivers {
        rx.await.unwrap().unwrap();
    }

    assert_eq!(dispatcher.completions().len(), 6);
    assert!(dispatcher.max_observed() <= 2, "max_active violated");
    assert_eq!(dispatcher.max_observed(), 2, "no parallelism achieved");
}

// Bounds hold under a burst across many lanes.
#[tokio::test]
async fn bounds_hold_under_burst() {
    let dispatcher = SleepDispatcher::new();
    let scheduler = LaneScheduler::new(dispatcher.clone(), config(3, 2, 10_000));

    let mut accepted = 0;
    let mut receivers = Vec::new();
    for i in 0..30 {
        let lane = format!("session:s-{}", i % 5);
        match submit(&scheduler, &lane, &format!("t{i}"), 20) {
            Ok(rx) => {
                accepted += 1;
                receivers.push(rx);
            }
            Err(e) => assert_eq!(e.code, ErrorCode::DaemonQueueSaturated),
        }
        let gauges = scheduler.gauges();
        assert!(gauges.active_total <= 3);
    }
    for rx in receivers {
        rx.await.unwrap().unwrap();
    }
    assert_eq!(dispatcher.completions().len(), accepted);
    assert!(dispatcher.max_observed() <= 3);
}

// A cancelled task at the head of a queue is discarded on dispatch
// without consuming an active slot; its receiver observes the drop.
#[tokio::test]
async fn cancelled_head_is_discarded() {
    let dispatcher = SleepDispatcher::new();
    let scheduler = LaneScheduler::new(dispatcher.clone(), config(1, 8, 10_000));

    let rx1 = submit(&scheduler, "session:s-x", "t1", 100).unwrap();
    let cancel2 = CancellationToken::new();
    let rx2 = scheduler
        .submit(
            task("t2", 50),
            "session:s-x".to_string(),
            Family::Control,
            cancel2.clone(),
        )
        .unwrap();
    let rx3 = submit(&scheduler, "session:s-x", "t3", 0).unwrap();

    cancel2.cancel();

    rx1.await.unwrap().unwrap();
    assert!(rx2.await.is_err(), "cancelled task resolver must be dropped");
    rx3.await.unwrap().unwrap();
    assert_eq!(dispatcher.completions(), ["t1", "t3"]);
}

// An idle scheduler holds no lanes: state is cleaned up after completion.
#[tokio::test]
async fn lanes_are_garbage_collected() {
    let dispatcher = SleepDispatcher::new();
    let scheduler = LaneScheduler::new(dispatcher.clone(), config(2, 8, 10_000));

    let rx = submit(&scheduler, "session:s-x", "t1", 10).unwrap();
    rx.await.unwrap().unwrap();

    let gauges = scheduler.gauges();
    assert_eq!(gauges.active_total, 0);
    assert_eq!(gauges.queued_total, 0);
    assert_eq!(gauges.lane_count, 0);
}
