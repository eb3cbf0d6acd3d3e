//! Post-save processing queue.
//!
//! Sequences side-effecting jobs (OCR today) after a note is persisted: one
//! job in flight at a time, FIFO submission order, bounded retry with failed
//! items re-queued at the tail so they never block fresh work.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;

/// Retries granted to a job at creation unless the caller says otherwise.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Job kinds the queue can carry. Only `Ocr` has an executor today; the rest
/// are reserved, and the registry's exhaustive match forces a decision the day
/// one of them grows an implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStep {
  Ocr,
  Summary,
  Embedding,
  Sync,
}

/// A pending job against a note. Holds only the note id: the note may be
/// deleted out from under a pending job, and executors treat that as a benign
/// no-op rather than an error.
#[derive(Debug, Clone)]
pub struct QueueItem {
  pub note_id: String,
  pub step: JobStep,
  pub remaining_retries: u32,
}

impl QueueItem {
  pub fn new(note_id: impl Into<String>, step: JobStep, remaining_retries: u32) -> Self {
    Self { note_id: note_id.into(), step, remaining_retries }
  }

  /// OCR job with the default retry budget.
  pub fn ocr(note_id: impl Into<String>) -> Self {
    Self::new(note_id, JobStep::Ocr, DEFAULT_RETRY_BUDGET)
  }
}

/// A job runner for one step kind. Errors trigger the queue's retry policy;
/// executors are responsible for leaving the underlying note usable on any
/// failure path.
#[async_trait]
pub trait JobExecutor: Send + Sync {
  async fn execute(&self, item: &QueueItem) -> Result<()>;
}

/// Maps each step kind to its executor, if one is registered. Steps without an
/// executor complete as instant no-op successes, so a queue carrying a job
/// kind from a newer schema drains instead of deadlocking.
pub struct ExecutorRegistry {
  ocr: Option<Arc<dyn JobExecutor>>,
}

impl ExecutorRegistry {
  pub fn new() -> Self {
    Self { ocr: None }
  }

  pub fn with_ocr(mut self, executor: Arc<dyn JobExecutor>) -> Self {
    self.ocr = Some(executor);
    self
  }

  fn executor_for(&self, step: JobStep) -> Option<Arc<dyn JobExecutor>> {
    match step {
      JobStep::Ocr => self.ocr.clone(),
      JobStep::Summary | JobStep::Embedding | JobStep::Sync => None,
    }
  }
}

impl Default for ExecutorRegistry {
  fn default() -> Self {
    Self::new()
  }
}

/// Counters for work the queue has finished, re-queued, or given up on.
/// Exhausted jobs drop silently from the user's point of view; these counters
/// are where that becomes observable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
  pub completed: u64,
  pub retried: u64,
  pub dropped: u64,
}

struct QueueState {
  pending: VecDeque<QueueItem>,
  busy: bool,
  stats: QueueStats,
}

struct QueueInner {
  state: Mutex<QueueState>,
  registry: ExecutorRegistry,
  idle: Notify,
}

/// The queue handle. Cheap to clone; all clones share one pending sequence and
/// one busy flag. Owned state with injected executors, constructed fresh per
/// process (or per test) rather than living in a global.
#[derive(Clone)]
pub struct ProcessingQueue {
  inner: Arc<QueueInner>,
}

impl ProcessingQueue {
  /// Empty queue, not busy.
  pub fn new(registry: ExecutorRegistry) -> Self {
    let inner = QueueInner {
      state: Mutex::new(QueueState {
        pending: VecDeque::new(),
        busy: false,
        stats: QueueStats::default(),
      }),
      registry,
      idle: Notify::new(),
    };
    Self { inner: Arc::new(inner) }
  }

  /// Append a job at the tail and kick the drain loop. Infallible: this is a
  /// pure in-memory append, and execution happens later on the runtime.
  pub fn enqueue(&self, item: QueueItem) {
    {
      let mut state = self.inner.state.lock().unwrap();
      state.pending.push_back(item);
    }

    let inner = self.inner.clone();
    tokio::spawn(async move {
      inner.drive().await;
    });
  }

  /// Resolves once the queue is empty and nothing is executing.
  pub async fn wait_idle(&self) {
    loop {
      // Enable before checking state: `notify_waiters` only reaches futures
      // already registered, so an un-enabled future could miss the single
      // wakeup the drain loop fires on its way out.
      let notified = self.inner.idle.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();
      {
        let state = self.inner.state.lock().unwrap();
        if !state.busy && state.pending.is_empty() {
          return;
        }
      }
      notified.await;
    }
  }

  pub fn stats(&self) -> QueueStats {
    self.inner.state.lock().unwrap().stats
  }

  pub fn pending_len(&self) -> usize {
    self.inner.state.lock().unwrap().pending.len()
  }
}

impl QueueInner {
  /// Drain loop. The busy flag under the state mutex is the at-most-one
  /// concurrency guarantee: a drive call that finds the flag set is a no-op,
  /// so overlapping enqueues and completion wakeups never run two jobs at
  /// once. Executors run outside the lock.
  async fn drive(self: Arc<Self>) {
    loop {
      let item = {
        let mut state = self.state.lock().unwrap();
        if state.busy {
          return;
        }
        match state.pending.pop_front() {
          Some(item) => {
            state.busy = true;
            item
          }
          None => {
            self.idle.notify_waiters();
            return;
          }
        }
      };

      let result = match self.registry.executor_for(item.step) {
        Some(executor) => executor.execute(&item).await,
        None => {
          tracing::debug!(note_id = %item.note_id, step = ?item.step, "no executor for step, completing as no-op");
          Ok(())
        }
      };

      let mut state = self.state.lock().unwrap();
      state.busy = false;

      match result {
        Ok(()) => {
          state.stats.completed += 1;
        }
        Err(err) if item.remaining_retries > 0 => {
          // Retries go to the tail: a failing job loses its place so other
          // pending items get a turn first.
          tracing::warn!(
            note_id = %item.note_id,
            step = ?item.step,
            retries_left = item.remaining_retries - 1,
            error = %err,
            "job failed, re-queueing"
          );
          state.stats.retried += 1;
          let retry = QueueItem { remaining_retries: item.remaining_retries - 1, ..item };
          state.pending.push_back(retry);
        }
        Err(err) => {
          tracing::error!(
            note_id = %item.note_id,
            step = ?item.step,
            error = %err,
            "job failed with retry budget exhausted, dropping"
          );
          state.stats.dropped += 1;
        }
      }
    }
  }
}
