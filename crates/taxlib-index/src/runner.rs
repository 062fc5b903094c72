//! Build worker loop: drain the queue, index each item, report depletion.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use taxlib_core::error::Result;
use taxlib_core::IndexItem;
use taxlib_text::IndexStore;

use crate::events::{EventBus, IndexEvent};
use crate::indexer::NodeIndexer;
use crate::queue::{StopSignal, ThreadSafeWorkQueue};

/// Destination of indexed items.
pub trait ItemSink: Send {
    fn index(&mut self, item: &IndexItem) -> Result<()>;

    /// Make everything indexed so far durable and searchable.
    fn checkpoint(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes documents for one (language, view) store.
pub struct StoreSink {
    indexer: NodeIndexer,
    store: Arc<IndexStore>,
    label_role: String,
    language: String,
}

impl StoreSink {
    pub fn new(indexer: NodeIndexer, store: Arc<IndexStore>, label_role: String, language: String) -> Self {
        Self { indexer, store, label_role, language }
    }
}

impl ItemSink for StoreSink {
    fn index(&mut self, item: &IndexItem) -> Result<()> {
        let document = self.indexer.document(item, &self.label_role, &self.language);
        // Staged delete keeps one live document per identity even when the
        // same node was re-indexed while still queued.
        self.store.delete_matching(&document.element_id, &document.path, document.order)?;
        self.store.add_document(&document)
    }

    fn checkpoint(&mut self) -> Result<()> {
        self.store.commit()
    }
}

/// What the runner does once the queue is empty.
///
/// `IndexLifecycleManager` always builds with `StopWhenDepleted`. `Park` is
/// for callers that own a queue and feed it incrementally: they keep one
/// runner alive, enqueue batches as they arrive, and learn about each drained
/// batch through [`IndexBuildRunner::on_depleted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerMode {
    /// Return as soon as the queue is empty (full builds).
    StopWhenDepleted,
    /// Wait for more work after each depletion until stopped.
    Park,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Depleted { processed: usize, had_errors: bool },
    Stopped { processed: usize, had_errors: bool },
}

impl RunOutcome {
    pub fn processed(&self) -> usize {
        match self {
            RunOutcome::Depleted { processed, .. } | RunOutcome::Stopped { processed, .. } => *processed,
        }
    }

    pub fn had_errors(&self) -> bool {
        match self {
            RunOutcome::Depleted { had_errors, .. } | RunOutcome::Stopped { had_errors, .. } => *had_errors,
        }
    }
}

type DepletedHook = Box<dyn FnMut(bool) + Send>;

pub struct IndexBuildRunner<S: ItemSink> {
    queue: Arc<ThreadSafeWorkQueue<IndexItem>>,
    sink: S,
    stop: StopSignal,
    events: EventBus,
    mode: RunnerMode,
    commit_interval: usize,
    park_poll: Duration,
    on_depleted: Option<DepletedHook>,
}

impl<S: ItemSink> IndexBuildRunner<S> {
    pub fn new(queue: Arc<ThreadSafeWorkQueue<IndexItem>>, sink: S, stop: StopSignal, events: EventBus) -> Self {
        Self {
            queue,
            sink,
            stop,
            events,
            mode: RunnerMode::StopWhenDepleted,
            commit_interval: 2000,
            park_poll: Duration::from_millis(50),
            on_depleted: None,
        }
    }

    pub fn mode(mut self, mode: RunnerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Items between intermediate checkpoints; zero disables them.
    pub fn commit_interval(mut self, interval: usize) -> Self {
        self.commit_interval = interval;
        self
    }

    pub fn park_poll(mut self, poll: Duration) -> Self {
        self.park_poll = poll;
        self
    }

    /// Called with the batch's error flag every time the queue runs dry. In
    /// `Park` mode this is the only per-batch completion signal.
    pub fn on_depleted(mut self, hook: impl FnMut(bool) + Send + 'static) -> Self {
        self.on_depleted = Some(Box::new(hook));
        self
    }

    pub fn run(mut self) -> RunOutcome {
        let mut processed = 0usize;
        let mut had_errors = false;
        let mut pending = 0usize;
        loop {
            if self.stop.is_triggered() {
                if pending > 0 {
                    had_errors |= self.checkpoint();
                }
                debug!(processed, "build runner stopped");
                return RunOutcome::Stopped { processed, had_errors };
            }
            let Some(item) = self.queue.dequeue() else {
                if pending > 0 {
                    had_errors |= self.checkpoint();
                    pending = 0;
                }
                debug!(processed, had_errors, "build queue depleted");
                if let Some(hook) = self.on_depleted.as_mut() {
                    hook(had_errors);
                }
                match self.mode {
                    RunnerMode::StopWhenDepleted => return RunOutcome::Depleted { processed, had_errors },
                    RunnerMode::Park => {
                        had_errors = false;
                        self.queue.wait_for_work(&self.stop, self.park_poll);
                        continue;
                    }
                }
            };

            match catch_unwind(AssertUnwindSafe(|| self.sink.index(&item))) {
                Ok(Ok(())) => {
                    processed += 1;
                    pending += 1;
                }
                Ok(Err(e)) => {
                    had_errors = true;
                    self.report(&item, e.to_string());
                }
                Err(panic) => {
                    had_errors = true;
                    self.report(&item, panic_message(panic.as_ref()));
                }
            }
            if self.commit_interval > 0 && pending >= self.commit_interval {
                had_errors |= self.checkpoint();
                pending = 0;
            }
        }
    }

    /// Returns whether the checkpoint failed.
    fn checkpoint(&mut self) -> bool {
        match self.sink.checkpoint() {
            Ok(()) => false,
            Err(e) => {
                warn!(error = %e, "index checkpoint failed");
                self.events.publish(IndexEvent::Error { cause: e.to_string() });
                true
            }
        }
    }

    fn report(&self, item: &IndexItem, cause: String) {
        warn!(item = %item.id(), error = %cause, "failed to index item");
        self.events.publish(IndexEvent::Error { cause: format!("{}: {}", item.id(), cause) });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "indexing panicked".to_string()
    }
}
