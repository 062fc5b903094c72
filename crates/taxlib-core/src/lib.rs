//! taxlib-core
//!
//! Taxonomy node model, search criteria, collaborator traits and configuration
//! shared by the text engine adapter and the index service.

#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod criteria;
pub mod error;
pub mod node;
pub mod provider;
pub mod traits;
pub mod types;

pub use criteria::{ExtendedFilter, ResetMode, SearchCriteria, SearchCriteriaBuilder};
pub use error::{Error, Result};
pub use node::{BalanceType, EnumValueNode, IndexItem, Node, NodeSpec};
pub use provider::{StaticNodeProvider, TaxonomyFile};
pub use traits::NodeProvider;
pub use types::{IndexedDocument, ScoredDocument, SearchField, SearchResultItem, ViewKey};
