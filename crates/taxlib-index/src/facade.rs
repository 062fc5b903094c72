use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use taxlib_core::config::{Config, SearchSettings};
use taxlib_core::error::Result;
use taxlib_core::node::{self, EnumValueNode};
use taxlib_core::{IndexItem, Node, NodeProvider, SearchCriteria, ViewKey};

use crate::events::IndexEvent;
use crate::manager::{IndexLifecycleManager, IndexState};
use crate::results::SearchResult;

/// Public entry point of the library search.
///
/// Forwards to a shared `IndexLifecycleManager` and adds helpers for
/// enumerated-value entries. Disposal shuts the manager down once; later
/// calls are no-ops. Dropping the facade disposes it.
pub struct LibrarySearch {
    manager: Arc<IndexLifecycleManager>,
    disposed: AtomicBool,
}

impl LibrarySearch {
    pub fn new(settings: SearchSettings) -> Result<Self> {
        Ok(Self::from_manager(Arc::new(IndexLifecycleManager::new(settings)?)))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.search_settings()?)
    }

    pub fn from_manager(manager: Arc<IndexLifecycleManager>) -> Self {
        Self { manager, disposed: AtomicBool::new(false) }
    }

    pub fn manager(&self) -> &Arc<IndexLifecycleManager> {
        &self.manager
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.manager.subscribe()
    }

    pub fn initialize(&self, language: &str, provider: Arc<dyn NodeProvider>) -> Result<()> {
        self.manager.initialize(language, provider)
    }

    pub fn change_to_view(&self, provider: Arc<dyn NodeProvider>) -> Result<()> {
        self.manager.change_to_view(provider)
    }

    pub fn change_to_language(&self, language: &str) -> Result<()> {
        self.manager.change_to_language(language)
    }

    pub fn search(&self, criteria: &SearchCriteria) -> Result<SearchResult> {
        self.manager.search(criteria)
    }

    pub fn re_index_node(&self, node: &Arc<Node>) -> Result<()> {
        self.manager.re_index_node(node)
    }

    pub fn stop_indexing(&self) -> bool {
        self.manager.stop_indexing()
    }

    pub fn close(&self) -> Result<()> {
        self.manager.close()
    }

    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.manager.wait_until_idle(timeout)
    }

    pub fn state(&self) -> IndexState {
        self.manager.state()
    }

    pub fn is_indexing(&self) -> bool {
        self.manager.is_indexing()
    }

    pub fn is_initialized(&self) -> bool {
        self.manager.is_initialized()
    }

    pub fn active_view(&self) -> Option<ViewKey> {
        self.manager.active_view()
    }

    pub fn is_enum_value_node(id: &str) -> bool {
        node::is_enum_value_id(id)
    }

    pub fn create_node_for_enum_value(parent: &Arc<Node>, value: &str) -> IndexItem {
        IndexItem::EnumValue(EnumValueNode::new(parent.clone(), value))
    }

    pub fn enum_value_element_id(id: &str) -> &str {
        node::enum_value_element_id(id)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.manager.shutdown();
        }
    }
}

impl Drop for LibrarySearch {
    fn drop(&mut self) {
        self.dispose();
    }
}
