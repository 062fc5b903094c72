//! Index lifecycle: one store per (language, view), a background build
//! pipeline, and search against the active store.
//!
//! Every state-changing entry point holds the `lifecycle` mutex for its whole
//! duration. Build workers never take it; they report back through the small
//! `status` cell, tagged with the generation they were started under so a
//! superseded build cannot flip the manager to `Ready`.

use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use taxlib_core::config::SearchSettings;
use taxlib_core::error::{Error, Result};
use taxlib_core::{IndexItem, Node, NodeProvider, SearchCriteria, ViewKey};
use taxlib_text::IndexStore;

use crate::compiler::QueryCompiler;
use crate::events::{EventBus, IndexEvent};
use crate::indexer::{collect_items, node_items, DocumentationCache, NodeIndexer};
use crate::progress::ProgressWatcher;
use crate::queue::{StopSignal, ThreadSafeWorkQueue};
use crate::results::{ResultFilter, SearchResult};
use crate::runner::{IndexBuildRunner, RunOutcome, StoreSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Uninitialized,
    Building,
    Ready,
    /// Terminal: reached through `shutdown`.
    Closed,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexState::Uninitialized => "Uninitialized",
            IndexState::Building => "Building",
            IndexState::Ready => "Ready",
            IndexState::Closed => "Closed",
        };
        f.write_str(name)
    }
}

struct Status {
    state: IndexState,
    generation: u64,
    active: Option<ViewKey>,
}

struct StoreEntry {
    store: Arc<IndexStore>,
    complete: AtomicBool,
}

/// State reachable from build threads.
struct Shared {
    settings: SearchSettings,
    events: EventBus,
    status: Mutex<Status>,
    status_changed: Condvar,
    stores: RwLock<HashMap<ViewKey, Arc<StoreEntry>>>,
}

impl Shared {
    fn set_status(&self, update: impl FnOnce(&mut Status)) {
        update(&mut self.status.lock());
        self.status_changed.notify_all();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.status.lock().generation == generation
    }

    /// `Building -> Ready`, unless a newer transition happened meanwhile.
    fn finish_build(&self, generation: u64) -> bool {
        let mut ready = false;
        self.set_status(|s| {
            if s.generation == generation && s.state == IndexState::Building {
                s.state = IndexState::Ready;
                ready = true;
            }
        });
        ready
    }

    /// A stopped build never becomes searchable.
    fn abandon_build(&self, generation: u64) {
        self.set_status(|s| {
            if s.generation == generation && s.state == IndexState::Building {
                s.state = IndexState::Uninitialized;
            }
        });
    }
}

struct Lifecycle {
    provider: Option<Arc<dyn NodeProvider>>,
    language: Option<String>,
    build: Option<BuildHandle>,
}

struct BuildHandle {
    key: ViewKey,
    generation: u64,
    stop: StopSignal,
    queue: Arc<ThreadSafeWorkQueue<IndexItem>>,
    worker: JoinHandle<()>,
}

pub struct IndexLifecycleManager {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    cache: Arc<DocumentationCache>,
    compiler: QueryCompiler,
    filter: ResultFilter,
}

impl IndexLifecycleManager {
    pub fn new(settings: SearchSettings) -> Result<Self> {
        Self::with_events(settings, EventBus::default())
    }

    pub fn with_events(settings: SearchSettings, events: EventBus) -> Result<Self> {
        settings.validate()?;
        let cache = Arc::new(DocumentationCache::new(settings.documentation_cache_capacity));
        let compiler = QueryCompiler::new(settings.phrase_slop);
        let filter = ResultFilter::new(settings.min_score);
        let shared = Arc::new(Shared {
            settings,
            events,
            status: Mutex::new(Status { state: IndexState::Uninitialized, generation: 0, active: None }),
            status_changed: Condvar::new(),
            stores: RwLock::new(HashMap::new()),
        });
        Ok(Self {
            shared,
            lifecycle: Mutex::new(Lifecycle { provider: None, language: None, build: None }),
            cache,
            compiler,
            filter,
        })
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.shared.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> IndexState {
        self.shared.status.lock().state
    }

    pub fn is_indexing(&self) -> bool {
        self.state() == IndexState::Building
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state(), IndexState::Building | IndexState::Ready)
    }

    pub fn active_view(&self) -> Option<ViewKey> {
        self.shared.status.lock().active.clone()
    }

    pub fn open_views(&self) -> Vec<ViewKey> {
        let mut keys: Vec<ViewKey> = self.shared.stores.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Block until no build is running or `timeout` elapses. Returns whether
    /// the manager is idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.shared.status.lock();
        while status.state == IndexState::Building {
            if self.shared.status_changed.wait_until(&mut status, deadline).timed_out() {
                break;
            }
        }
        status.state != IndexState::Building
    }

    /// Index `provider`'s tree for `language` (the provider's own language
    /// when empty). A no-op when that view is already built or building;
    /// otherwise every existing store is discarded and a fresh build starts.
    pub fn initialize(&self, language: &str, provider: Arc<dyn NodeProvider>) -> Result<()> {
        let mut lc = self.lifecycle.lock();
        self.ensure_open()?;
        let language = if language.is_empty() { provider.current_language() } else { language.to_string() };
        let key = ViewKey::new(language.clone(), provider.view_key_component());
        lc.provider = Some(provider.clone());
        lc.language = Some(language);

        if self.is_active(&key) && !self.needs_reindex(&lc, &key) {
            debug!(view = %key, "already initialized");
            return Ok(());
        }

        info!(view = %key, "full index restart");
        self.stop_build(&mut lc);
        self.close_all_stores();
        self.cache.clear();
        self.start_build(&mut lc, key, provider)
    }

    /// Switch to another view of the tree, building its store if needed.
    /// Stores of other views are kept for later reuse.
    pub fn change_to_view(&self, provider: Arc<dyn NodeProvider>) -> Result<()> {
        let mut lc = self.lifecycle.lock();
        self.ensure_open()?;
        let language = lc
            .language
            .clone()
            .ok_or_else(|| Error::invalid_state("initialized", self.state()))?;
        let key = ViewKey::new(language, provider.view_key_component());
        lc.provider = Some(provider.clone());
        self.switch_to(&mut lc, key, provider)
    }

    /// Switch the active language, building its store if needed.
    pub fn change_to_language(&self, language: &str) -> Result<()> {
        let mut lc = self.lifecycle.lock();
        self.ensure_open()?;
        let provider = lc
            .provider
            .clone()
            .ok_or_else(|| Error::invalid_state("initialized", self.state()))?;
        let key = ViewKey::new(language, provider.view_key_component());
        lc.language = Some(language.to_string());
        self.switch_to(&mut lc, key, provider)
    }

    fn switch_to(&self, lc: &mut Lifecycle, key: ViewKey, provider: Arc<dyn NodeProvider>) -> Result<()> {
        if self.is_active(&key) && !self.needs_reindex(lc, &key) {
            return Ok(());
        }
        if !self.needs_reindex(lc, &key) {
            // Built earlier and kept: activate without indexing.
            self.stop_build(lc);
            info!(view = %key, "switching to existing index");
            self.shared.set_status(|s| {
                s.generation += 1;
                s.state = IndexState::Ready;
                s.active = Some(key);
            });
            return Ok(());
        }
        info!(view = %key, "switching view, index build required");
        self.start_build(lc, key, provider)
    }

    /// Search the active store. Only valid while `Ready`.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<SearchResult> {
        let key = {
            let status = self.shared.status.lock();
            if status.state != IndexState::Ready {
                return Err(Error::invalid_state("Ready", status.state));
            }
            status.active.clone().ok_or_else(|| Error::invalid_state("an active view", "none"))?
        };
        let Some(query) = self.compiler.build_query(criteria) else {
            debug!("criteria compiled to an empty query");
            return Ok(SearchResult::empty());
        };
        let entry = self
            .shared
            .stores
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("index store {}", key)))?;
        debug!(view = %key, query = %query, "searching");
        let max_hits = self.shared.settings.max_hits;
        let hits = match criteria.ancestry_prefix() {
            Some(prefix) => entry.store.search_under(&query, prefix, max_hits)?,
            None => entry.store.search(&query, max_hits)?,
        };
        Ok(self.filter.apply(hits, criteria))
    }

    /// Replace `node`'s documents in every open store, synchronously.
    pub fn re_index_node(&self, node: &Arc<Node>) -> Result<()> {
        let lc = self.lifecycle.lock();
        self.ensure_open()?;
        let provider = lc
            .provider
            .clone()
            .ok_or_else(|| Error::invalid_state("initialized", self.state()))?;
        let indexer = NodeIndexer::new(provider.clone(), self.cache.clone());
        let label_role = provider.label_role();
        let suitable = indexer.is_suitable(node);
        let items = node_items(node);
        self.cache.invalidate(node.id());

        self.shared.events.publish(IndexEvent::Started);
        let entries: Vec<(ViewKey, Arc<StoreEntry>)> =
            self.shared.stores.read().iter().map(|(k, e)| (k.clone(), e.clone())).collect();
        let mut first_error = None;
        for (key, entry) in entries {
            for item in &items {
                let document = suitable.then(|| indexer.document(item, &label_role, &key.language));
                let result = entry.store.replace_document(&item.id(), &item.path(), item.order(), document.as_ref());
                if let Err(e) = result {
                    warn!(view = %key, item = %item.id(), error = %e, "re-index failed");
                    self.shared.events.publish(IndexEvent::Error { cause: format!("{}: {}", item.id(), e) });
                    first_error.get_or_insert(e);
                }
            }
        }
        debug!(element = node.id(), suitable, "node re-indexed");
        self.shared.events.publish(IndexEvent::Completed { had_errors: first_error.is_some() });
        first_error.map_or(Ok(()), Err)
    }

    /// Request the running build to stop and wait for it, up to the configured
    /// timeout. Returns whether no build is left running.
    pub fn stop_indexing(&self) -> bool {
        let mut lc = self.lifecycle.lock();
        self.stop_build(&mut lc)
    }

    /// Stop building, release every store and return to `Uninitialized`.
    pub fn close(&self) -> Result<()> {
        let mut lc = self.lifecycle.lock();
        if self.state() == IndexState::Closed {
            return Ok(());
        }
        self.close_locked(&mut lc);
        self.shared.set_status(|s| {
            s.generation += 1;
            s.state = IndexState::Uninitialized;
            s.active = None;
        });
        Ok(())
    }

    /// Like `close`, but final: the manager refuses any further work.
    pub fn shutdown(&self) {
        let mut lc = self.lifecycle.lock();
        if self.state() == IndexState::Closed {
            return;
        }
        self.close_locked(&mut lc);
        self.shared.set_status(|s| {
            s.generation += 1;
            s.state = IndexState::Closed;
            s.active = None;
        });
        info!("index manager shut down");
    }

    fn close_locked(&self, lc: &mut Lifecycle) {
        self.stop_build(lc);
        self.close_all_stores();
        self.cache.clear();
        lc.provider = None;
        lc.language = None;
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state() {
            IndexState::Closed => Err(Error::invalid_state("an open manager", IndexState::Closed)),
            _ => Ok(()),
        }
    }

    fn is_active(&self, key: &ViewKey) -> bool {
        let status = self.shared.status.lock();
        status.active.as_ref() == Some(key) && matches!(status.state, IndexState::Building | IndexState::Ready)
    }

    /// True unless `key` has a completely built store or a build for it is
    /// still running.
    fn needs_reindex(&self, lc: &Lifecycle, key: &ViewKey) -> bool {
        if lc.build.as_ref().is_some_and(|b| &b.key == key && !b.worker.is_finished()) {
            return false;
        }
        self.shared
            .stores
            .read()
            .get(key)
            .map_or(true, |entry| !entry.complete.load(Ordering::Acquire))
    }

    fn close_all_stores(&self) {
        let drained: Vec<(ViewKey, Arc<StoreEntry>)> = self.shared.stores.write().drain().collect();
        for (key, entry) in drained {
            if let Err(e) = entry.store.close() {
                warn!(view = %key, error = %e, "failed to close index store");
            }
        }
    }

    fn store_dir(&self, key: &ViewKey) -> Option<PathBuf> {
        let sanitize = |s: &str| -> String {
            s.chars().map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' }).collect()
        };
        self.shared
            .settings
            .store_root_path()
            .map(|root| root.join(sanitize(&key.language)).join(sanitize(&key.view)))
    }

    fn create_store(&self, key: &ViewKey) -> Result<IndexStore> {
        let heap = self.shared.settings.writer_heap_bytes;
        match self.store_dir(key) {
            Some(dir) => IndexStore::create_in_dir(key.clone(), &dir, heap),
            None => IndexStore::create_in_ram(key.clone(), heap),
        }
    }

    fn start_build(&self, lc: &mut Lifecycle, key: ViewKey, provider: Arc<dyn NodeProvider>) -> Result<()> {
        self.stop_build(lc);

        if let Some(old) = self.shared.stores.write().remove(&key) {
            if let Err(e) = old.store.close() {
                warn!(view = %key, error = %e, "failed to close replaced index store");
            }
        }
        let store = Arc::new(self.create_store(&key)?);
        let entry = Arc::new(StoreEntry { store: store.clone(), complete: AtomicBool::new(false) });
        self.shared.stores.write().insert(key.clone(), entry.clone());

        let items = collect_items(provider.as_ref());
        let total = items.len();
        let queue = Arc::new(ThreadSafeWorkQueue::from_items(items));
        let stop = StopSignal::new();

        let mut generation = 0;
        self.shared.set_status(|s| {
            s.generation += 1;
            generation = s.generation;
            s.state = IndexState::Building;
            s.active = Some(key.clone());
        });
        info!(view = %key, items = total, "index build started");
        self.shared.events.publish(IndexEvent::Started);

        let job = BuildJob {
            shared: self.shared.clone(),
            key: key.clone(),
            generation,
            entry,
            sink: StoreSink::new(
                NodeIndexer::new(provider.clone(), self.cache.clone()),
                store,
                provider.label_role(),
                key.language.clone(),
            ),
            queue: queue.clone(),
            stop: stop.clone(),
        };
        let worker = thread::Builder::new()
            .name(format!("taxlib-build-{}", key))
            .spawn(move || job.run());
        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.abandon_build(generation);
                return Err(Error::Operation(format!("failed to spawn build worker: {}", e)));
            }
        };
        lc.build = Some(BuildHandle { key, generation, stop, queue, worker });
        Ok(())
    }

    /// Cooperative stop with a bounded wait. A worker that overruns the
    /// timeout is detached and left to notice the signal on its own.
    fn stop_build(&self, lc: &mut Lifecycle) -> bool {
        let Some(build) = lc.build.take() else {
            return true;
        };
        build.stop.trigger();
        build.queue.wake_all();

        let timeout = self.shared.settings.stop_timeout();
        let poll = self.shared.settings.stop_poll_interval();
        let started = Instant::now();
        while !build.worker.is_finished() && started.elapsed() < timeout {
            thread::sleep(poll);
        }
        let stopped = build.worker.is_finished();
        if stopped {
            if build.worker.join().is_err() {
                warn!(view = %build.key, "build worker panicked");
            }
        } else {
            warn!(view = %build.key, timeout_ms = timeout.as_millis() as u64, "build worker did not stop in time, detaching");
        }
        self.shared.abandon_build(build.generation);
        stopped
    }
}

impl Drop for IndexLifecycleManager {
    fn drop(&mut self) {
        let mut lc = self.lifecycle.lock();
        if let Some(build) = lc.build.take() {
            build.stop.trigger();
            build.queue.wake_all();
        }
    }
}

/// Everything one build worker owns.
struct BuildJob {
    shared: Arc<Shared>,
    key: ViewKey,
    generation: u64,
    entry: Arc<StoreEntry>,
    sink: StoreSink,
    queue: Arc<ThreadSafeWorkQueue<IndexItem>>,
    stop: StopSignal,
}

impl BuildJob {
    fn run(self) {
        let done = StopSignal::new();
        let watcher = {
            let shared = self.shared.clone();
            let generation = self.generation;
            ProgressWatcher::new(
                self.queue.clone(),
                self.shared.settings.progress_interval(),
                self.shared.events.clone(),
                done.clone(),
                move || shared.is_current(generation),
            )
        };
        let watcher = thread::Builder::new()
            .name(format!("taxlib-progress-{}", self.key))
            .spawn(move || watcher.run());
        if let Err(e) = &watcher {
            warn!(view = %self.key, error = %e, "progress watcher unavailable");
        }

        let outcome = IndexBuildRunner::new(self.queue.clone(), self.sink, self.stop.clone(), self.shared.events.clone())
            .commit_interval(self.shared.settings.commit_interval)
            .park_poll(self.shared.settings.stop_poll_interval())
            .run();

        done.trigger();
        if let Ok(handle) = watcher {
            let _ = handle.join();
        }

        match outcome {
            RunOutcome::Depleted { processed, mut had_errors } => {
                if let Err(e) = self.entry.store.finalize() {
                    warn!(view = %self.key, error = %e, "index finalization failed");
                    self.shared.events.publish(IndexEvent::Error { cause: e.to_string() });
                    had_errors = true;
                }
                self.entry.complete.store(true, Ordering::Release);
                if self.shared.finish_build(self.generation) {
                    info!(view = %self.key, processed, had_errors, "index build completed");
                    self.shared.events.publish(IndexEvent::Completed { had_errors });
                } else {
                    debug!(view = %self.key, "build finished after being superseded");
                }
            }
            RunOutcome::Stopped { processed, .. } => {
                let dropped = self.queue.clear();
                self.shared.abandon_build(self.generation);
                info!(view = %self.key, processed, dropped, "index build stopped");
            }
        }
    }
}
