//! Priority worker pool with backpressure, per-task retry, and graceful
//! shutdown (Component B).
//!
//! The queueing, dispatch, and retry *decisions* are pure and deterministic
//! — they live here and are unit-tested without real threads. The runner
//! spins up `worker_count()` OS threads that repeatedly call
//! [`WorkerPool::dispatch_next`], execute the task, and report the outcome
//! back via [`WorkerPool::report_outcome`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

/// The closed set of operations a worker can be asked to perform. A new
/// operation must be added here and handled everywhere `TaskKind` is
/// matched — there is no stringly-typed dispatch table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    Hash,
    MerkleVerify,
    Compress,
    Decompress,
    Encrypt,
    Decrypt,
    JsonProcess,
}

/// A unit of work submitted to the pool.
#[derive(Clone, Debug)]
pub struct Task {
    pub kind: TaskKind,
    pub payload: Vec<u8>,
    /// `0` is highest priority; must be `< priority_levels`.
    pub priority: u8,
    pub retry_count: u32,
    /// Timeout budget for a single attempt.
    pub timeout: Duration,
    /// If true, this task is admitted even while the pool is backpressured.
    pub bypass_backpressure: bool,
}

/// Strategy used to pick which worker receives the next dispatched task.
#[derive(Clone, Copy, Debug)]
pub enum LoadBalancing {
    LeastBusy,
    RoundRobin,
    Random { seed: u64 },
}

/// Pool-level configuration.
#[derive(Clone, Debug)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    pub priority_levels: u8,
    pub max_retries: u32,
    pub high_watermark: f64,
    pub low_watermark: f64,
    pub graceful_timeout: Duration,
    pub worker_restart_delay: Duration,
    pub load_balancing: LoadBalancing,
}

impl WorkerPoolConfig {
    /// `min(cpus - 1, 8)` workers, 3 priority levels, matching spec
    /// defaults.
    pub fn with_default_worker_count(available_cpus: usize) -> Self {
        Self {
            worker_count: available_cpus.saturating_sub(1).clamp(1, 8),
            priority_levels: 3,
            max_retries: 3,
            high_watermark: 0.8,
            low_watermark: 0.3,
            graceful_timeout: Duration::from_secs(30),
            worker_restart_delay: Duration::from_millis(500),
            load_balancing: LoadBalancing::LeastBusy,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerPoolError {
    #[error("pool is under backpressure")]
    Backpressure,
    #[error("priority {0} is out of range")]
    InvalidPriority(u8),
}

/// Observable transitions the runner should forward to the metrics
/// registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    BackpressureEntered,
    BackpressureExited,
    TaskRetried { kind: TaskKind, attempt: u32 },
    TaskFailedTerminal { kind: TaskKind },
    WorkerRecreated { worker_id: usize },
}

/// Why a task attempt ended without success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureCause {
    Timeout,
    WorkerError,
    WorkerExitedNonZero,
}

struct QueuedTask {
    task: Task,
}

/// The pool's queueing/dispatch/retry state.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    queues: Mutex<Vec<VecDeque<QueuedTask>>>,
    worker_busy: Mutex<Vec<bool>>,
    worker_processed: Mutex<Vec<u64>>,
    rr_cursor: AtomicUsize,
    in_backpressure: AtomicBool,
    queued_count: AtomicUsize,
    shutting_down: AtomicBool,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let levels = config.priority_levels as usize;
        let workers = config.worker_count;
        Self {
            queues: Mutex::new((0..levels).map(|_| VecDeque::new()).collect()),
            worker_busy: Mutex::new(vec![false; workers]),
            worker_processed: Mutex::new(vec![0u64; workers]),
            rr_cursor: AtomicUsize::new(0),
            in_backpressure: AtomicBool::new(false),
            queued_count: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            config,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    fn capacity(&self) -> usize {
        // "capacity" for watermark purposes is worker_count * a fixed
        // per-worker slack of 16 queued tasks, matching a bounded queue
        // sized to the pool rather than unbounded growth.
        self.config.worker_count * 16
    }

    /// Submit a task. Refuses new work with `Backpressure` while the pool
    /// is backpressured, unless `task.bypass_backpressure` is set.
    pub fn execute_task(&self, task: Task) -> Result<(), WorkerPoolError> {
        if task.priority as usize >= self.config.priority_levels as usize {
            return Err(WorkerPoolError::InvalidPriority(task.priority));
        }
        if self.in_backpressure.load(Ordering::SeqCst) && !task.bypass_backpressure {
            return Err(WorkerPoolError::Backpressure);
        }
        self.enqueue(task);
        self.recheck_backpressure();
        Ok(())
    }

    fn enqueue(&self, task: Task) {
        let priority = task.priority as usize;
        self.queues.lock()[priority].push_back(QueuedTask { task });
        self.queued_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Re-evaluate the backpressure watermark, returning an event if it
    /// transitioned.
    fn recheck_backpressure(&self) -> Option<PoolEvent> {
        let queued = self.queued_count.load(Ordering::SeqCst) as f64;
        let capacity = self.capacity() as f64;
        let was = self.in_backpressure.load(Ordering::SeqCst);
        let now = if was {
            queued >= self.config.low_watermark * capacity
        } else {
            queued > self.config.high_watermark * capacity
        };
        if now != was {
            self.in_backpressure.store(now, Ordering::SeqCst);
            Some(if now {
                PoolEvent::BackpressureEntered
            } else {
                PoolEvent::BackpressureExited
            })
        } else {
            None
        }
    }

    /// Pop the next task to run, highest priority first, choosing a worker
    /// per the configured load-balancing strategy. Returns `None` if every
    /// queue is empty.
    pub fn dispatch_next(&self) -> Option<(usize, Task, Option<PoolEvent>)> {
        let task = {
            let mut queues = self.queues.lock();
            queues.iter_mut().find_map(|q| q.pop_front())
        }?;
        self.queued_count.fetch_sub(1, Ordering::SeqCst);
        let event = self.recheck_backpressure();

        let worker_id = self.pick_worker();
        self.worker_busy.lock()[worker_id] = true;

        Some((worker_id, task.task, event))
    }

    fn pick_worker(&self) -> usize {
        let n = self.config.worker_count;
        match self.config.load_balancing {
            LoadBalancing::RoundRobin => self.rr_cursor.fetch_add(1, Ordering::SeqCst) % n,
            LoadBalancing::LeastBusy => {
                let processed = self.worker_processed.lock();
                (0..n).min_by_key(|&i| processed[i]).unwrap_or(0)
            }
            LoadBalancing::Random { seed } => {
                let draw = self.rr_cursor.fetch_add(1, Ordering::SeqCst) as u64;
                ((seed.wrapping_add(draw).wrapping_mul(2654435761)) as usize) % n
            }
        }
    }

    /// Report that `worker_id` completed `task` successfully.
    pub fn report_success(&self, worker_id: usize) {
        self.worker_busy.lock()[worker_id] = false;
        self.worker_processed.lock()[worker_id] += 1;
    }

    /// Report that `worker_id`'s attempt at `task` failed. Re-enqueues at
    /// the highest priority if under `max_retries`; otherwise the task is
    /// terminally failed.
    pub fn report_failure(&self, worker_id: usize, mut task: Task, _cause: FailureCause) -> Vec<PoolEvent> {
        self.worker_busy.lock()[worker_id] = false;
        self.worker_processed.lock()[worker_id] += 1;

        let mut events = Vec::new();
        if task.retry_count < self.config.max_retries {
            task.retry_count += 1;
            task.priority = 0;
            events.push(PoolEvent::TaskRetried { kind: task.kind, attempt: task.retry_count });
            self.enqueue(task);
            if let Some(e) = self.recheck_backpressure() {
                events.push(e);
            }
        } else {
            events.push(PoolEvent::TaskFailedTerminal { kind: task.kind });
        }
        events
    }

    /// A worker process exited or was otherwise lost; schedule its
    /// replacement after `worker_restart_delay`.
    pub fn worker_restart_delay(&self) -> Duration {
        self.config.worker_restart_delay
    }

    pub fn is_backpressured(&self) -> bool {
        self.in_backpressure.load(Ordering::SeqCst)
    }

    pub fn queued_len(&self) -> usize {
        self.queued_count.load(Ordering::SeqCst)
    }

    /// Workers currently mid-task, for the runner's utilisation gauge.
    pub fn busy_worker_count(&self) -> usize {
        self.worker_busy.lock().iter().filter(|b| **b).count()
    }

    /// Mark the pool as shutting down; `graceful_timeout` is the budget the
    /// runner should allow for `queued_len()` to reach zero before force
    /// closing.
    pub fn begin_graceful_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn graceful_timeout(&self) -> Duration {
        self.config.graceful_timeout
    }
}
