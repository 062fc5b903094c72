//! taxlib-index
//!
//! Library search service: builds one full-text store per (language, view)
//! on a background worker, compiles structured criteria into queries and
//! filters the hits.
//!
//! ```no_run
//! use std::sync::Arc;
//! use taxlib_core::config::SearchSettings;
//! use taxlib_core::{NodeSpec, SearchCriteria, StaticNodeProvider};
//! use taxlib_index::LibrarySearch;
//!
//! # fn main() -> taxlib_core::Result<()> {
//! let provider = StaticNodeProvider::from_specs("presentation", "en", vec![NodeSpec::new("Revenues", "Revenues")]);
//! let search = LibrarySearch::new(SearchSettings::default())?;
//! search.initialize("en", Arc::new(provider))?;
//! search.wait_until_idle(std::time::Duration::from_secs(30));
//! let hits = search.search(&SearchCriteria::builder().required("revenue").build())?;
//! println!("{} hits", hits.count());
//! # Ok(())
//! # }
//! ```

#![deny(unused_imports)]

pub mod compiler;
pub mod events;
pub mod facade;
pub mod indexer;
pub mod manager;
pub mod progress;
pub mod queue;
pub mod results;
pub mod runner;
pub mod stemmer;

pub use compiler::QueryCompiler;
pub use events::{EventBus, IndexEvent};
pub use facade::LibrarySearch;
pub use indexer::{collect_items, Documentation, DocumentationCache, NodeIndexer};
pub use manager::{IndexLifecycleManager, IndexState};
pub use progress::ProgressWatcher;
pub use queue::{StopSignal, ThreadSafeWorkQueue};
pub use results::{ResultFilter, SearchResult};
pub use runner::{IndexBuildRunner, ItemSink, RunOutcome, RunnerMode, StoreSink};
