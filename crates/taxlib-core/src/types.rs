//! Domain types shared by the text engine adapter and the index service.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::BalanceType;

/// (language, view) pair. Each key owns exactly one index store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewKey {
    pub language: String,
    pub view: String,
}

impl ViewKey {
    pub fn new(language: impl Into<String>, view: impl Into<String>) -> Self {
        Self { language: language.into(), view: view.into() }
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language, self.view)
    }
}

/// Per-node projection stored in the text engine.
///
/// A store holds at most one live document per (`element_id`, `path`, `order`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub element_id: String,
    pub label: String,
    pub definition: String,
    pub balance: BalanceType,
    pub is_abstract: bool,
    pub is_extended: bool,
    pub path: String,
    pub display_name: String,
    pub references: String,
    pub order: f64,
}

/// Text fields a search may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Label,
    ElementId,
    Definition,
    References,
    DisplayName,
}

impl SearchField {
    pub const ALL: [SearchField; 5] = [
        SearchField::Label,
        SearchField::ElementId,
        SearchField::Definition,
        SearchField::References,
        SearchField::DisplayName,
    ];

    /// Schema field name in the text engine.
    pub fn field_name(self) -> &'static str {
        match self {
            SearchField::Label => "label",
            SearchField::ElementId => "element_id",
            SearchField::Definition => "definition",
            SearchField::References => "references",
            SearchField::DisplayName => "display_name",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.field_name().eq_ignore_ascii_case(s))
    }
}

/// Read-only projection of one matched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub element_id: String,
    pub path: String,
    pub score: f32,
    pub label: String,
    pub order: f64,
}

/// A raw scored hit as returned by a store, before result filtering.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub score: f32,
    pub document: IndexedDocument,
}
