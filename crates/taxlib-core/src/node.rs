//! Taxonomy tree nodes as handed to the indexer by the taxonomy parser.
//!
//! Nodes are shared (`Arc`) and navigate upwards through a `Weak` parent link,
//! so a tree is owned from its roots down. Label and definition stay editable
//! after construction because the parser may rename an element and ask for a
//! single-node re-index.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

/// Prefix of the external id of an enumerated-value pseudo-node.
pub const ENUM_VALUE_MARKER: &str = "enum-value:";
pub const PATH_SEPARATOR: char = '/';
/// Optional terminator on an ancestry-path filter, ignored when comparing.
pub const PATH_END_MARKER: char = '$';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceType {
    #[default]
    None,
    Debit,
    Credit,
}

impl BalanceType {
    pub const ALL: [BalanceType; 3] = [BalanceType::None, BalanceType::Debit, BalanceType::Credit];

    pub fn as_str(self) -> &'static str {
        match self {
            BalanceType::None => "none",
            BalanceType::Debit => "debit",
            BalanceType::Credit => "credit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for BalanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable description of a node and its subtree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub id: String,
    pub label: String,
    pub definition: Option<String>,
    pub display_name: Option<String>,
    pub references: Option<String>,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    pub prohibited: bool,
    pub extended: bool,
    pub balance: BalanceType,
    pub order: f64,
    pub enum_values: Vec<String>,
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { id: id.into(), label: label.into(), ..Self::default() }
    }

    pub fn with_children(mut self, children: Vec<NodeSpec>) -> Self {
        self.children = children;
        self
    }
}

pub struct Node {
    id: String,
    label: RwLock<String>,
    definition: RwLock<Option<String>>,
    display_name: Option<String>,
    references: Option<String>,
    is_abstract: bool,
    prohibited: bool,
    extended: bool,
    balance: BalanceType,
    order: f64,
    enum_values: Vec<String>,
    parent: Weak<Node>,
    children: Vec<Arc<Node>>,
}

impl Node {
    /// Build a whole tree, wiring every child's parent link.
    pub fn from_spec(spec: NodeSpec) -> Arc<Node> {
        Self::build(spec, Weak::new())
    }

    fn build(spec: NodeSpec, parent: Weak<Node>) -> Arc<Node> {
        Arc::new_cyclic(|me| {
            let children = spec
                .children
                .into_iter()
                .map(|child| Self::build(child, me.clone()))
                .collect();
            Node {
                id: spec.id,
                label: RwLock::new(spec.label),
                definition: RwLock::new(spec.definition),
                display_name: spec.display_name,
                references: spec.references,
                is_abstract: spec.is_abstract,
                prohibited: spec.prohibited,
                extended: spec.extended,
                balance: spec.balance,
                order: spec.order,
                enum_values: spec.enum_values,
                parent,
                children,
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> String {
        self.label.read().clone()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *self.label.write() = label.into();
    }

    pub fn definition(&self) -> Option<String> {
        self.definition.read().clone()
    }

    pub fn set_definition(&self, definition: Option<String>) {
        *self.definition.write() = definition;
    }

    /// Display name, falling back to the element id.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    pub fn references(&self) -> Option<&str> {
        self.references.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_prohibited(&self) -> bool {
        self.prohibited
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn balance(&self) -> BalanceType {
        self.balance
    }

    pub fn order(&self) -> f64 {
        self.order
    }

    pub fn enum_values(&self) -> &[String] {
        &self.enum_values
    }

    pub fn parent(&self) -> Option<Arc<Node>> {
        self.parent.upgrade()
    }

    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    /// Non-empty id and not prohibited.
    pub fn is_identifiable(&self) -> bool {
        !self.prohibited && !self.id.is_empty()
    }

    /// Segment contributed to descendants' paths. Structural nodes without an
    /// id contribute their label instead.
    pub fn path_segment(&self) -> String {
        if self.id.is_empty() { self.label() } else { self.id.clone() }
    }

    /// Ancestry path from the root down to (and excluding) this node,
    /// e.g. `Root/Assets/`. Roots have an empty path.
    pub fn path(&self) -> String {
        let mut segments = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            segments.push(node.path_segment());
            current = node.parent();
        }
        let mut path = String::new();
        for segment in segments.iter().rev() {
            path.push_str(segment);
            path.push(PATH_SEPARATOR);
        }
        path
    }

    /// Prefix shared by the paths of every descendant of this node.
    pub fn subtree_path(&self) -> String {
        let mut path = self.path();
        path.push_str(&self.path_segment());
        path.push(PATH_SEPARATOR);
        path
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("label", &*self.label.read())
            .field("order", &self.order)
            .field("children", &self.children.len())
            .finish()
    }
}

/// Synthesized entry for one enumerated value of an element. It is indexed
/// under its parent's subtree and never traversed further.
#[derive(Debug, Clone)]
pub struct EnumValueNode {
    parent: Arc<Node>,
    value: String,
}

impl EnumValueNode {
    pub fn new(parent: Arc<Node>, value: impl Into<String>) -> Self {
        Self { parent, value: value.into() }
    }

    pub fn parent(&self) -> &Arc<Node> {
        &self.parent
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Id used at the API boundary and in the index.
    pub fn external_id(&self) -> String {
        format!("{ENUM_VALUE_MARKER}{}", self.value)
    }
}

pub fn is_enum_value_id(id: &str) -> bool {
    id.starts_with(ENUM_VALUE_MARKER)
}

/// Element id an enum-value id refers to; other ids pass through unchanged.
pub fn enum_value_element_id(id: &str) -> &str {
    id.strip_prefix(ENUM_VALUE_MARKER).unwrap_or(id)
}

/// Unit of work for the indexing pipeline.
#[derive(Debug, Clone)]
pub enum IndexItem {
    Element(Arc<Node>),
    EnumValue(EnumValueNode),
}

impl IndexItem {
    pub fn id(&self) -> String {
        match self {
            IndexItem::Element(node) => node.id().to_string(),
            IndexItem::EnumValue(value) => value.external_id(),
        }
    }

    pub fn path(&self) -> String {
        match self {
            IndexItem::Element(node) => node.path(),
            IndexItem::EnumValue(value) => value.parent.subtree_path(),
        }
    }

    pub fn order(&self) -> f64 {
        match self {
            IndexItem::Element(node) => node.order(),
            IndexItem::EnumValue(value) => value.parent.order(),
        }
    }

    /// The real node behind the item: the element itself or the enum's owner.
    pub fn node(&self) -> &Arc<Node> {
        match self {
            IndexItem::Element(node) => node,
            IndexItem::EnumValue(value) => &value.parent,
        }
    }
}

impl From<Arc<Node>> for IndexItem {
    fn from(node: Arc<Node>) -> Self {
        IndexItem::Element(node)
    }
}
