use std::sync::Arc;
use std::time::Duration;

use taxlib_core::IndexItem;

use crate::events::{EventBus, IndexEvent};
use crate::queue::{StopSignal, ThreadSafeWorkQueue};

/// Samples the build queue and publishes whole-percent progress.
///
/// Percentages only ever increase, so subscribers see a non-decreasing
/// sequence without repeats. The watcher exits once `done` fires (after one
/// last sample) or as soon as `is_current` reports that the build it watches
/// is no longer the active one.
pub struct ProgressWatcher {
    queue: Arc<ThreadSafeWorkQueue<IndexItem>>,
    initial: usize,
    interval: Duration,
    events: EventBus,
    done: StopSignal,
    is_current: Box<dyn Fn() -> bool + Send>,
}

impl ProgressWatcher {
    pub fn new(
        queue: Arc<ThreadSafeWorkQueue<IndexItem>>,
        interval: Duration,
        events: EventBus,
        done: StopSignal,
        is_current: impl Fn() -> bool + Send + 'static,
    ) -> Self {
        let initial = queue.len();
        Self { queue, initial, interval, events, done, is_current: Box::new(is_current) }
    }

    pub fn percent(&self) -> u8 {
        if self.initial == 0 {
            return 100;
        }
        let drained = self.initial.saturating_sub(self.queue.len());
        ((drained * 100) / self.initial).min(100) as u8
    }

    /// Returns the last percentage published, if any.
    pub fn run(self) -> Option<u8> {
        let mut last: Option<u8> = None;
        loop {
            let finished = self.done.is_triggered();
            let percent = self.percent();
            if last.map_or(true, |l| percent > l) {
                self.events.publish(IndexEvent::Progress { fraction: f32::from(percent) / 100.0 });
                last = Some(percent);
            }
            if finished || !(self.is_current)() {
                return last;
            }
            self.done.wait_timeout(self.interval);
        }
    }
}
