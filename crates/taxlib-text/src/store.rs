use parking_lot::Mutex;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, warn};

use taxlib_core::error::{Error, Result};
use taxlib_core::{IndexedDocument, ScoredDocument, ViewKey};

use crate::query_parser::TaxonomyQueryParser;
use crate::tantivy_utils::{build_schema, register_tokenizer, TaxonomyFields};

fn engine<E: Display>(e: E) -> Error {
    Error::Engine(e.to_string())
}

/// One tantivy index holding the documents of a single (language, view) key.
///
/// Writes go through a single writer behind a mutex; searches run against the
/// last committed state.
pub struct IndexStore {
    key: ViewKey,
    index: Index,
    fields: TaxonomyFields,
    writer: Mutex<Option<IndexWriter>>,
    reader: IndexReader,
    parser: TaxonomyQueryParser,
    directory: Option<PathBuf>,
}

impl IndexStore {
    pub fn create_in_ram(key: ViewKey, writer_heap_bytes: usize) -> Result<Self> {
        let index = Index::create_in_ram(build_schema());
        Self::from_index(key, index, writer_heap_bytes, None)
    }

    /// Create a fresh store under `index_dir`, discarding whatever was there.
    pub fn create_in_dir(key: ViewKey, index_dir: &Path, writer_heap_bytes: usize) -> Result<Self> {
        if index_dir.exists() {
            std::fs::remove_dir_all(index_dir).map_err(engine)?;
        }
        std::fs::create_dir_all(index_dir).map_err(engine)?;
        let index = Index::create_in_dir(index_dir, build_schema()).map_err(engine)?;
        Self::from_index(key, index, writer_heap_bytes, Some(index_dir.to_path_buf()))
    }

    fn from_index(key: ViewKey, index: Index, writer_heap_bytes: usize, directory: Option<PathBuf>) -> Result<Self> {
        register_tokenizer(&index);
        let fields = TaxonomyFields::resolve(&index.schema())?;
        let writer: IndexWriter = index.writer_with_num_threads(1, writer_heap_bytes).map_err(engine)?;
        let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(engine)?;
        let parser = TaxonomyQueryParser::for_index(&index);
        debug!(view = %key, on_disk = directory.is_some(), "created index store");
        Ok(Self { key, index, fields, writer: Mutex::new(Some(writer)), reader, parser, directory })
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    fn with_writer<T>(&self, f: impl FnOnce(&mut IndexWriter) -> Result<T>) -> Result<T> {
        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| Error::Operation(format!("store {} is closed", self.key)))?;
        f(writer)
    }

    /// Stage a document; visible to searches after the next commit.
    pub fn add_document(&self, document: &IndexedDocument) -> Result<()> {
        let doc = self.fields.to_tantivy(document);
        self.with_writer(|w| w.add_document(doc).map(|_| ()).map_err(engine))
    }

    fn identity_query(&self, element_id: &str, path: &str, order: f64) -> BooleanQuery {
        let terms = [
            Term::from_field_text(self.fields.element_id_exact, element_id),
            Term::from_field_text(self.fields.path, path),
            Term::from_field_f64(self.fields.order, order),
        ];
        BooleanQuery::new(
            terms
                .into_iter()
                .map(|t| (Occur::Must, Box::new(TermQuery::new(t, IndexRecordOption::Basic)) as Box<dyn Query>))
                .collect(),
        )
    }

    /// Stage deletion of every document with this (id, path, order) identity.
    pub fn delete_matching(&self, element_id: &str, path: &str, order: f64) -> Result<()> {
        let query = self.identity_query(element_id, path, order);
        self.with_writer(|w| w.delete_query(Box::new(query)).map(|_| ()).map_err(engine))
    }

    /// Delete the identity's documents, optionally add a replacement, and
    /// commit both in one step.
    pub fn replace_document(
        &self,
        element_id: &str,
        path: &str,
        order: f64,
        replacement: Option<&IndexedDocument>,
    ) -> Result<()> {
        let query = self.identity_query(element_id, path, order);
        let doc = replacement.map(|d| self.fields.to_tantivy(d));
        self.with_writer(|w| {
            w.delete_query(Box::new(query)).map_err(engine)?;
            if let Some(doc) = doc {
                w.add_document(doc).map_err(engine)?;
            }
            w.commit().map_err(engine)?;
            Ok(())
        })?;
        self.reader.reload().map_err(engine)
    }

    pub fn commit(&self) -> Result<()> {
        self.with_writer(|w| w.commit().map(|_| ()).map_err(engine))?;
        self.reader.reload().map_err(engine)
    }

    /// Commit, then compact all searchable segments into one.
    pub fn finalize(&self) -> Result<()> {
        self.with_writer(|w| {
            w.commit().map_err(engine)?;
            let segment_ids = self.index.searchable_segment_ids().map_err(engine)?;
            if segment_ids.len() > 1 {
                if let Err(e) = w.merge(&segment_ids).wait() {
                    warn!(view = %self.key, error = %e, "segment merge skipped");
                }
            }
            Ok(())
        })?;
        self.reader.reload().map_err(engine)
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Run a query string and return up to `limit` hits, best first.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>> {
        let query = self.parser.parse_query(query)?;
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit)).map_err(engine)?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address).map_err(engine)?;
            hits.push(ScoredDocument { score, document: self.fields.to_indexed(&doc) });
        }
        Ok(hits)
    }

    /// Like [`search`](Self::search), but only hits whose stored path starts
    /// with `prefix` count towards `limit`. Every match is ranked first, so
    /// in-prefix hits are never crowded out by better hits elsewhere.
    pub fn search_under(&self, query: &str, prefix: &str, limit: usize) -> Result<Vec<ScoredDocument>> {
        let query = self.parser.parse_query(query)?;
        let searcher = self.reader.searcher();
        let total = searcher.search(&*query, &Count).map_err(engine)?;
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(total.max(1))).map_err(engine)?;
        let mut hits = Vec::new();
        for (score, address) in top_docs {
            if hits.len() >= limit {
                break;
            }
            let doc: TantivyDocument = searcher.doc(address).map_err(engine)?;
            let document = self.fields.to_indexed(&doc);
            if document.path.starts_with(prefix) {
                hits.push(ScoredDocument { score, document });
            }
        }
        Ok(hits)
    }

    /// Release the writer. Searches keep working on the committed state.
    pub fn close(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().take() {
            writer.wait_merging_threads().map_err(engine)?;
            debug!(view = %self.key, "closed index store");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.writer.lock().is_none()
    }
}
