use std::sync::OnceLock;

use taxlib_core::{ScoredDocument, SearchCriteria, SearchResultItem};

/// Post-filter applied to raw hits before they reach the caller.
#[derive(Debug, Clone, Copy)]
pub struct ResultFilter {
    min_score: f32,
}

impl Default for ResultFilter {
    fn default() -> Self {
        Self { min_score: 0.0499 }
    }
}

impl ResultFilter {
    pub fn new(min_score: f32) -> Self {
        Self { min_score }
    }

    /// Drop hits outside the criteria's ancestry path or below the score
    /// floor, then apply the relative-score and top-share cuts.
    pub fn apply(&self, hits: Vec<ScoredDocument>, criteria: &SearchCriteria) -> SearchResult {
        let prefix = criteria.ancestry_prefix();
        let mut kept: Vec<ScoredDocument> = hits
            .into_iter()
            .filter(|h| prefix.map_or(true, |p| h.document.path.starts_with(p)))
            .filter(|h| h.score >= self.min_score)
            .collect();
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));

        if let (Some(percent), Some(best)) = (criteria.min_relative_score_percent(), kept.first().map(|h| h.score)) {
            let floor = best * f32::from(percent) / 100.0;
            kept.retain(|h| h.score >= floor);
        }
        if let Some(percent) = criteria.top_percent() {
            let keep = (kept.len() * usize::from(percent)).div_ceil(100).max(1);
            kept.truncate(keep);
        }
        SearchResult::from_hits(kept)
    }
}

/// Ordered hits of one search. Items are materialized on first access.
#[derive(Debug, Default)]
pub struct SearchResult {
    hits: Vec<ScoredDocument>,
    items: OnceLock<Vec<SearchResultItem>>,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_hits(hits: Vec<ScoredDocument>) -> Self {
        Self { hits, items: OnceLock::new() }
    }

    pub fn count(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn items(&self) -> &[SearchResultItem] {
        self.items.get_or_init(|| {
            self.hits
                .iter()
                .map(|h| SearchResultItem {
                    element_id: h.document.element_id.clone(),
                    path: h.document.path.clone(),
                    score: h.score,
                    label: h.document.label.clone(),
                    order: h.document.order,
                })
                .collect()
        })
    }

    pub fn to_vec(&self) -> Vec<SearchResultItem> {
        self.items().to_vec()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResultItem> {
        self.items().iter()
    }
}

impl<'a> IntoIterator for &'a SearchResult {
    type Item = &'a SearchResultItem;
    type IntoIter = std::slice::Iter<'a, SearchResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
