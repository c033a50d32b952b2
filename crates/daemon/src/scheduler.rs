// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lane scheduler: admission control for all daemon work.
//!
//! Within a lane, tasks run strictly one at a time in FIFO order. Across
//! lanes, at most `max_active` tasks run concurrently, dispatched
//! round-robin over a runnable ring of lane keys. The ring is maintained
//! incrementally on submit/complete; dispatch never scans the lane map.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sw_core::{Error, ErrorCode, Family};
use sw_engine::{CommandDispatcher, RunOutcome};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::env::DaemonLimits;

/// Scheduler bounds, read from the environment at daemon start.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_active: usize,
    pub max_queue_depth: usize,
    pub queue_wait: Duration,
}

impl From<&DaemonLimits> for SchedulerConfig {
    fn from(limits: &DaemonLimits) -> Self {
        Self {
            max_active: limits.max_active,
            max_queue_depth: limits.max_queue_depth,
            queue_wait: limits.queue_wait,
        }
    }
}

/// Observability snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerGauges {
    pub active_total: usize,
    pub queued_total: usize,
    pub lane_count: usize,
}

pub type TaskResult = Result<RunOutcome, Error>;

struct QueuedTask {
    id: u64,
    lane_key: String,
    family: Family,
    argv: Vec<String>,
    enqueued_at: Instant,
    cancel: CancellationToken,
    tx: oneshot::Sender<TaskResult>,
}

#[derive(Default)]
struct Lane {
    queue: VecDeque<QueuedTask>,
    active: bool,
}

#[derive(Default)]
struct State {
    lanes: HashMap<String, Lane>,
    runnable: VecDeque<String>,
    active_total: usize,
    next_task_id: u64,
}

struct Shared {
    state: Mutex<State>,
    dispatcher: Arc<dyn CommandDispatcher>,
    config: SchedulerConfig,
}

/// Per-lane FIFO scheduler. Cheap to clone.
#[derive(Clone)]
pub struct LaneScheduler {
    shared: Arc<Shared>,
}

enum Step {
    Dispatch(QueuedTask),
    Retry,
    Done,
}

impl LaneScheduler {
    pub fn new(dispatcher: Arc<dyn CommandDispatcher>, config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                dispatcher,
                config,
            }),
        }
    }

    /// Enqueue a task on its lane. Fails immediately with
    /// `E_DAEMON_QUEUE_SATURATED` when the lane queue is full; otherwise
    /// the queue-wait timer starts and the receiver resolves with the
    /// outcome, a timeout, or a cancellation drop.
    pub fn submit(
        &self,
        argv: Vec<String>,
        lane_key: String,
        family: Family,
        cancel: CancellationToken,
    ) -> Result<oneshot::Receiver<TaskResult>, Error> {
        let (tx, rx) = oneshot::channel();
        let max_queue_depth = self.shared.config.max_queue_depth;
        let task_id;
        {
            let mut state = self.shared.state.lock();
            state.next_task_id += 1;
            task_id = state.next_task_id;

            let lane = state.lanes.entry(lane_key.clone()).or_default();
            if lane.queue.len() >= max_queue_depth {
                return Err(Error::new(
                    ErrorCode::DaemonQueueSaturated,
                    format!("lane {lane_key} queue full ({max_queue_depth} tasks)"),
                )
                .with_hint_context(serde_json::json!({"laneKey": lane_key})));
            }

            let was_idle_and_empty = !lane.active && lane.queue.is_empty();
            lane.queue.push_back(QueuedTask {
                id: task_id,
                lane_key: lane_key.clone(),
                family,
                argv,
                enqueued_at: Instant::now(),
                cancel,
                tx,
            });
            if was_idle_and_empty {
                state.runnable.push_back(lane_key.clone());
            }
        }

        // Queue-wait watchdog. A task dispatched before the deadline is no
        // longer in the queue and the expiry is a no-op.
        let scheduler = self.clone();
        let wait = self.shared.config.queue_wait;
        let expire_key = lane_key;
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            scheduler.expire(&expire_key, task_id);
        });

        self.dispatch_ready();
        Ok(rx)
    }

    /// Current gauges, for `daemon status` and debug logging.
    pub fn gauges(&self) -> SchedulerGauges {
        let state = self.shared.state.lock();
        SchedulerGauges {
            active_total: state.active_total,
            queued_total: state.lanes.values().map(|l| l.queue.len()).sum(),
            lane_count: state.lanes.len(),
        }
    }

    fn dispatch_ready(&self) {
        loop {
            match self.next_step() {
                Step::Dispatch(task) => self.spawn_task(task),
                Step::Retry => continue,
                Step::Done => break,
            }
        }
    }

    /// One locked dispatch attempt: pop a runnable lane key and take its
    /// head task. Cancelled heads are discarded without consuming an
    /// active slot.
    fn next_step(&self) -> Step {
        let mut state = self.shared.state.lock();
        if state.active_total >= self.shared.config.max_active {
            return Step::Done;
        }
        let Some(lane_key) = state.runnable.pop_front() else {
            return Step::Done;
        };
        let Some(lane) = state.lanes.get_mut(&lane_key) else {
            return Step::Retry;
        };
        if lane.active {
            // Stale ring entry; the lane re-arms on complete.
            return Step::Retry;
        }

        while let Some(task) = lane.queue.pop_front() {
            if task.cancel.is_cancelled() {
                trace!(lane = %lane_key, task = task.id, "discarding cancelled task at head");
                continue;
            }
            lane.active = true;
            state.active_total += 1;
            return Step::Dispatch(task);
        }

        // Only cancelled tasks were queued; drop the empty idle lane.
        state.lanes.remove(&lane_key);
        Step::Retry
    }

    fn spawn_task(&self, task: QueuedTask) {
        let scheduler = self.clone();
        let dispatcher = Arc::clone(&self.shared.dispatcher);
        tokio::spawn(async move {
            trace!(
                lane = %task.lane_key,
                family = %task.family,
                task = task.id,
                waited_ms = task.enqueued_at.elapsed().as_millis() as u64,
                "task running"
            );
            let outcome = dispatcher.dispatch(&task.argv, task.cancel.clone()).await;
            let _ = task.tx.send(Ok(outcome));
            scheduler.complete(&task.lane_key);
        });
    }

    fn complete(&self, lane_key: &str) {
        {
            let mut state = self.shared.state.lock();
            state.active_total = state.active_total.saturating_sub(1);
            if let Some(lane) = state.lanes.get_mut(lane_key) {
                lane.active = false;
                if lane.queue.is_empty() {
                    state.lanes.remove(lane_key);
                } else {
                    state.runnable.push_back(lane_key.to_string());
                }
            }
            debug!(
                active = state.active_total,
                runnable = state.runnable.len(),
                "task complete"
            );
        }
        self.dispatch_ready();
    }

    /// Queue-wait deadline hit: dequeue and fail the task if it is still
    /// waiting.
    fn expire(&self, lane_key: &str, task_id: u64) {
        let expired = {
            let mut state = self.shared.state.lock();
            let Some(lane) = state.lanes.get_mut(lane_key) else {
                return;
            };
            let Some(position) = lane.queue.iter().position(|t| t.id == task_id) else {
                return;
            };
            lane.queue.remove(position)
        };
        if let Some(task) = expired {
            debug!(lane = %lane_key, task = task.id, "queue-wait deadline exceeded");
            let _ = task.tx.send(Err(Error::new(
                ErrorCode::DaemonQueueTimeout,
                format!(
                    "task waited longer than {}ms in lane {lane_key}",
                    self.shared.config.queue_wait.as_millis()
                ),
            )));
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
