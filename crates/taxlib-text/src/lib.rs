//! taxlib-text
//!
//! Tantivy-backed text engine adapter: schema and analyzer registration, one
//! `IndexStore` per view key, and a Lucene-style query string parser.

pub mod query_parser;
pub mod store;
pub mod tantivy_utils;

pub use query_parser::TaxonomyQueryParser;
pub use store::IndexStore;
