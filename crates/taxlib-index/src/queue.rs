//! Hand-off between the lifecycle manager and the build worker.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Mutex-guarded FIFO. Enqueueing wakes runners parked in `wait_for_work`.
pub struct ThreadSafeWorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> ThreadSafeWorkQueue<T> {
    pub fn new() -> Self {
        Self { items: Mutex::new(VecDeque::new()), available: Condvar::new() }
    }

    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        Self { items: Mutex::new(items.into_iter().collect()), available: Condvar::new() }
    }

    pub fn enqueue(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_all();
    }

    pub fn enqueue_all(&self, items: impl IntoIterator<Item = T>) {
        self.items.lock().extend(items);
        self.available.notify_all();
    }

    pub fn dequeue(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Drop everything still queued, returning how many items were discarded.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Block until work is available or `stop` fires. `poll` bounds each wait
    /// so a stop request is noticed even without a wake-up.
    pub fn wait_for_work(&self, stop: &StopSignal, poll: Duration) {
        let mut items = self.items.lock();
        while items.is_empty() && !stop.is_triggered() {
            self.available.wait_for(&mut items, poll);
        }
    }

    /// Wake every parked waiter without adding work.
    pub fn wake_all(&self) {
        let _guard = self.items.lock();
        self.available.notify_all();
    }
}

impl<T> Default for ThreadSafeWorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot latch used for cooperative cancellation and completion signals.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock() = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for up to `timeout`, returning early once triggered.
    /// Returns whether the signal has fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut fired = flag.lock();
        while !*fired {
            if cvar.wait_until(&mut fired, deadline).timed_out() {
                break;
            }
        }
        *fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fifo_order() {
        let queue = ThreadSafeWorkQueue::from_items([1, 2]);
        queue.enqueue(3);
        queue.enqueue_all([4, 5]);
        let drained: Vec<i32> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(drained, [1, 2, 3, 4, 5]);
        assert!(queue.is_empty());
    }

    #[test]
    fn enqueue_wakes_parked_waiter() {
        let queue = Arc::new(ThreadSafeWorkQueue::new());
        let stop = StopSignal::new();
        let waiter = {
            let queue = queue.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                queue.wait_for_work(&stop, Duration::from_secs(10));
                queue.dequeue()
            })
        };
        thread::sleep(Duration::from_millis(20));
        queue.enqueue("work");
        assert_eq!(waiter.join().unwrap(), Some("work"));
    }

    #[test]
    fn stop_releases_parked_waiter() {
        let queue: Arc<ThreadSafeWorkQueue<u8>> = Arc::new(ThreadSafeWorkQueue::new());
        let stop = StopSignal::new();
        let started = Instant::now();
        let waiter = {
            let queue = queue.clone();
            let stop = stop.clone();
            thread::spawn(move || queue.wait_for_work(&stop, Duration::from_millis(10)))
        };
        stop.trigger();
        waiter.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn signal_wait_returns_early() {
        let signal = StopSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
        let remote = signal.clone();
        let handle = thread::spawn(move || remote.trigger());
        assert!(signal.wait_timeout(Duration::from_secs(10)));
        handle.join().unwrap();
        assert!(signal.is_triggered());
    }
}
