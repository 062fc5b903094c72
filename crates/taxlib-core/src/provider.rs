//! In-memory `NodeProvider` over an already-built tree, and the JSON file
//! format it loads from.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::node::{Node, NodeSpec};
use crate::traits::NodeProvider;

pub const DEFAULT_LABEL_ROLE: &str = "http://www.xbrl.org/2003/role/label";

/// On-disk description of one view of a taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyFile {
    #[serde(default = "default_language")]
    pub language: String,
    pub view: String,
    #[serde(default = "default_label_role")]
    pub label_role: String,
    pub roots: Vec<NodeSpec>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_label_role() -> String {
    DEFAULT_LABEL_ROLE.to_string()
}

impl TaxonomyFile {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::NotFound(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }
}

#[derive(Debug, Clone)]
pub struct StaticNodeProvider {
    roots: Vec<Arc<Node>>,
    language: String,
    view: String,
    label_role: String,
}

impl StaticNodeProvider {
    pub fn new(view: impl Into<String>, language: impl Into<String>, roots: Vec<Arc<Node>>) -> Self {
        Self { roots, language: language.into(), view: view.into(), label_role: DEFAULT_LABEL_ROLE.to_string() }
    }

    pub fn from_specs(view: impl Into<String>, language: impl Into<String>, specs: Vec<NodeSpec>) -> Self {
        Self::new(view, language, specs.into_iter().map(Node::from_spec).collect())
    }

    pub fn with_label_role(mut self, role: impl Into<String>) -> Self {
        self.label_role = role.into();
        self
    }

    pub fn roots(&self) -> &[Arc<Node>] {
        &self.roots
    }

    /// Depth-first lookup of the first node carrying `id`.
    pub fn find(&self, id: &str) -> Option<Arc<Node>> {
        fn walk(node: &Arc<Node>, id: &str) -> Option<Arc<Node>> {
            if node.id() == id {
                return Some(node.clone());
            }
            node.children().iter().find_map(|c| walk(c, id))
        }
        self.roots.iter().find_map(|r| walk(r, id))
    }
}

impl From<TaxonomyFile> for StaticNodeProvider {
    fn from(file: TaxonomyFile) -> Self {
        StaticNodeProvider::from_specs(file.view, file.language, file.roots).with_label_role(file.label_role)
    }
}

impl NodeProvider for StaticNodeProvider {
    fn nodes_for_indexing(&self) -> Vec<Arc<Node>> {
        self.roots.clone()
    }

    fn label_role(&self) -> String {
        self.label_role.clone()
    }

    fn current_language(&self) -> String {
        self.language.clone()
    }

    fn view_key_component(&self) -> String {
        self.view.clone()
    }
}
