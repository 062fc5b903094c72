//! Node to document projection, plus the traversal that feeds the build queue.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

use taxlib_core::node::EnumValueNode;
use taxlib_core::{BalanceType, IndexItem, IndexedDocument, Node, NodeProvider};

/// Definition and reference text of one element in one language.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Documentation {
    pub definition: String,
    pub references: String,
}

/// Bounded LRU of documentation lookups keyed by (element id, language).
/// Owned by the manager and cleared on a full restart.
pub struct DocumentationCache {
    entries: Mutex<LruCache<(String, String), Arc<Documentation>>>,
}

impl DocumentationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get_or_load(
        &self,
        element_id: &str,
        language: &str,
        load: impl FnOnce() -> Documentation,
    ) -> Arc<Documentation> {
        let key = (element_id.to_string(), language.to_string());
        if let Some(hit) = self.entries.lock().get(&key) {
            return hit.clone();
        }
        // Loaded outside the lock; a concurrent loader for the same key just
        // overwrites with an equal value.
        let loaded = Arc::new(load());
        self.entries.lock().put(key, loaded.clone());
        loaded
    }

    /// Forget every language's entry for `element_id`.
    pub fn invalidate(&self, element_id: &str) {
        let mut entries = self.entries.lock();
        let stale: Vec<(String, String)> =
            entries.iter().filter(|((id, _), _)| id == element_id).map(|(k, _)| k.clone()).collect();
        for key in stale {
            entries.pop(&key);
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Builds `IndexedDocument`s from index items. Lookup failures in the
/// provider degrade to the node's own data and are only logged.
#[derive(Clone)]
pub struct NodeIndexer {
    provider: Arc<dyn NodeProvider>,
    cache: Arc<DocumentationCache>,
}

impl NodeIndexer {
    pub fn new(provider: Arc<dyn NodeProvider>, cache: Arc<DocumentationCache>) -> Self {
        Self { provider, cache }
    }

    pub fn provider(&self) -> &Arc<dyn NodeProvider> {
        &self.provider
    }

    pub fn is_suitable(&self, node: &Node) -> bool {
        node.is_identifiable() && self.provider.is_node_suitable_for_indexing(node)
    }

    pub fn document(&self, item: &IndexItem, label_role: &str, language: &str) -> IndexedDocument {
        match item {
            IndexItem::Element(node) => self.element_document(node, label_role, language),
            IndexItem::EnumValue(value) => enum_value_document(value),
        }
    }

    fn element_document(&self, node: &Node, label_role: &str, language: &str) -> IndexedDocument {
        let docs = self.documentation(node, language);
        IndexedDocument {
            element_id: node.id().to_string(),
            label: self.label(node, label_role, language),
            definition: docs.definition.clone(),
            balance: node.balance(),
            is_abstract: node.is_abstract(),
            is_extended: node.is_extended(),
            path: node.path(),
            display_name: node.display_name().to_string(),
            references: docs.references.clone(),
            order: node.order(),
        }
    }

    fn label(&self, node: &Node, role: &str, language: &str) -> String {
        match self.provider.label(node, role, language) {
            Ok(label) if !label.is_empty() => label,
            Ok(_) => node.label(),
            Err(e) => {
                debug!(element = node.id(), role, language, error = %e, "label lookup failed, using raw label");
                node.label()
            }
        }
    }

    fn documentation(&self, node: &Node, language: &str) -> Arc<Documentation> {
        self.cache.get_or_load(node.id(), language, || {
            let definition = self.provider.definition(node, language).unwrap_or_else(|e| {
                debug!(element = node.id(), language, error = %e, "definition lookup failed");
                None
            });
            let references = self.provider.references(node).unwrap_or_else(|e| {
                debug!(element = node.id(), error = %e, "references lookup failed");
                None
            });
            Documentation {
                definition: definition.unwrap_or_default(),
                references: references.unwrap_or_default(),
            }
        })
    }
}

fn enum_value_document(value: &EnumValueNode) -> IndexedDocument {
    let parent = value.parent();
    IndexedDocument {
        element_id: value.external_id(),
        label: value.value().to_string(),
        definition: String::new(),
        balance: BalanceType::None,
        is_abstract: false,
        is_extended: parent.is_extended(),
        path: parent.subtree_path(),
        display_name: value.value().to_string(),
        references: String::new(),
        order: parent.order(),
    }
}

/// Depth-first flattening of the provider's tree into build items.
///
/// Unsuitable nodes are skipped but their children are still visited; each
/// enumerated value of a suitable node follows it as its own item.
pub fn collect_items(provider: &dyn NodeProvider) -> Vec<IndexItem> {
    let mut items = Vec::new();
    for root in provider.nodes_for_indexing() {
        visit(&root, provider, &mut items);
    }
    items
}

/// Items one node contributes on its own, without descending.
pub fn node_items(node: &Arc<Node>) -> Vec<IndexItem> {
    let mut items = vec![IndexItem::Element(node.clone())];
    items.extend(
        node.enum_values()
            .iter()
            .map(|value| IndexItem::EnumValue(EnumValueNode::new(node.clone(), value.clone()))),
    );
    items
}

fn visit(node: &Arc<Node>, provider: &dyn NodeProvider, out: &mut Vec<IndexItem>) {
    if node.is_identifiable() && provider.is_node_suitable_for_indexing(node) {
        out.extend(node_items(node));
    }
    for child in node.children() {
        visit(child, provider, out);
    }
}
