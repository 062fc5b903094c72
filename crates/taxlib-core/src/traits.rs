use std::sync::Arc;

use crate::node::Node;

/// Supplies the node tree of one view in one language, plus per-node lookups.
///
/// Lookup hooks may fail for any reason; the indexer degrades to the node's
/// own data and never propagates those failures.
pub trait NodeProvider: Send + Sync {
    /// Roots of the tree, in view order.
    fn nodes_for_indexing(&self) -> Vec<Arc<Node>>;

    fn is_node_suitable_for_indexing(&self, node: &Node) -> bool {
        node.is_identifiable()
    }

    fn label_role(&self) -> String;

    fn current_language(&self) -> String;

    /// View component of the store key (presentation, calculation, ...).
    fn view_key_component(&self) -> String;

    fn label(&self, node: &Node, _role: &str, _language: &str) -> anyhow::Result<String> {
        Ok(node.label())
    }

    fn definition(&self, node: &Node, _language: &str) -> anyhow::Result<Option<String>> {
        Ok(node.definition())
    }

    fn references(&self, node: &Node) -> anyhow::Result<Option<String>> {
        Ok(node.references().map(str::to_string))
    }
}
