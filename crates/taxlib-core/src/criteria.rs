//! Structured search request and its builder.
//!
//! Words handed to the builder are split on every non-alphanumeric character,
//! so a stored word is always a plain alphanumeric run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::node::{BalanceType, PATH_END_MARKER};
use crate::types::SearchField;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendedFilter {
    #[default]
    Include,
    Exclude,
    Only,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Back to defaults, path filter included.
    Full,
    /// Back to defaults but keep the ancestry-path filter.
    KeepPath,
    /// Leave everything untouched.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCriteria {
    required_words: Vec<String>,
    optional_words: Vec<String>,
    prohibited_words: Vec<String>,
    fields: Vec<SearchField>,
    balance_types: BTreeSet<BalanceType>,
    include_abstract: bool,
    extended: ExtendedFilter,
    whole_word: bool,
    stem_plurals: bool,
    ancestry_path: Option<String>,
    min_relative_score_percent: Option<u8>,
    top_percent: Option<u8>,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            required_words: Vec::new(),
            optional_words: Vec::new(),
            prohibited_words: Vec::new(),
            fields: vec![SearchField::Label],
            balance_types: BTreeSet::new(),
            include_abstract: true,
            extended: ExtendedFilter::Include,
            whole_word: false,
            stem_plurals: true,
            ancestry_path: None,
            min_relative_score_percent: None,
            top_percent: None,
        }
    }
}

impl SearchCriteria {
    pub fn builder() -> SearchCriteriaBuilder {
        SearchCriteriaBuilder::default()
    }

    pub fn to_builder(&self) -> SearchCriteriaBuilder {
        SearchCriteriaBuilder { criteria: self.clone() }
    }

    pub fn required_words(&self) -> &[String] {
        &self.required_words
    }

    pub fn optional_words(&self) -> &[String] {
        &self.optional_words
    }

    pub fn prohibited_words(&self) -> &[String] {
        &self.prohibited_words
    }

    /// Targeted fields in priority order; never empty.
    pub fn fields(&self) -> &[SearchField] {
        if self.fields.is_empty() { &[SearchField::Label] } else { &self.fields }
    }

    pub fn balance_types(&self) -> &BTreeSet<BalanceType> {
        &self.balance_types
    }

    pub fn include_abstract(&self) -> bool {
        self.include_abstract
    }

    pub fn extended(&self) -> ExtendedFilter {
        self.extended
    }

    pub fn whole_word(&self) -> bool {
        self.whole_word
    }

    /// Plural stemming only applies when whole-word matching is off.
    pub fn stem_plurals(&self) -> bool {
        self.stem_plurals && !self.whole_word
    }

    pub fn ancestry_path(&self) -> Option<&str> {
        self.ancestry_path.as_deref()
    }

    /// Ancestry filter with the end-of-path marker removed, `None` when blank.
    pub fn ancestry_prefix(&self) -> Option<&str> {
        let path = self.ancestry_path.as_deref()?;
        let path = path.strip_suffix(PATH_END_MARKER).unwrap_or(path);
        if path.is_empty() { None } else { Some(path) }
    }

    pub fn min_relative_score_percent(&self) -> Option<u8> {
        self.min_relative_score_percent
    }

    pub fn top_percent(&self) -> Option<u8> {
        self.top_percent
    }

    pub fn has_words(&self) -> bool {
        !(self.required_words.is_empty() && self.optional_words.is_empty() && self.prohibited_words.is_empty())
    }

    pub fn reset(&mut self, mode: ResetMode) {
        match mode {
            ResetMode::Full => *self = Self::default(),
            ResetMode::KeepPath => {
                let path = self.ancestry_path.take();
                *self = Self { ancestry_path: path, ..Self::default() };
            }
            ResetMode::None => {}
        }
    }

    /// Overwrite every setting with a deep copy of `other`'s.
    pub fn update_from(&mut self, other: &SearchCriteria) {
        self.clone_from(other);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchCriteriaBuilder {
    criteria: SearchCriteria,
}

impl SearchCriteriaBuilder {
    pub fn required(mut self, text: &str) -> Self {
        self.criteria.required_words.extend(split_words(text));
        self
    }

    pub fn optional(mut self, text: &str) -> Self {
        self.criteria.optional_words.extend(split_words(text));
        self
    }

    pub fn prohibited(mut self, text: &str) -> Self {
        self.criteria.prohibited_words.extend(split_words(text));
        self
    }

    /// Replace the targeted fields; duplicates keep their first position.
    pub fn fields(mut self, fields: impl IntoIterator<Item = SearchField>) -> Self {
        self.criteria.fields.clear();
        for field in fields {
            if !self.criteria.fields.contains(&field) {
                self.criteria.fields.push(field);
            }
        }
        self
    }

    pub fn balance_types(mut self, types: impl IntoIterator<Item = BalanceType>) -> Self {
        self.criteria.balance_types = types.into_iter().collect();
        self
    }

    pub fn include_abstract(mut self, include: bool) -> Self {
        self.criteria.include_abstract = include;
        self
    }

    pub fn extended(mut self, filter: ExtendedFilter) -> Self {
        self.criteria.extended = filter;
        self
    }

    /// Whole-word matching turns plural stemming off.
    pub fn whole_word(mut self, whole_word: bool) -> Self {
        self.criteria.whole_word = whole_word;
        if whole_word {
            self.criteria.stem_plurals = false;
        }
        self
    }

    /// Plural stemming turns whole-word matching off.
    pub fn stem_plurals(mut self, stem: bool) -> Self {
        self.criteria.stem_plurals = stem;
        if stem {
            self.criteria.whole_word = false;
        }
        self
    }

    pub fn ancestry_path(mut self, path: impl Into<String>) -> Self {
        self.criteria.ancestry_path = Some(path.into());
        self
    }

    pub fn min_relative_score_percent(mut self, percent: u8) -> Self {
        self.criteria.min_relative_score_percent = Some(percent.min(100));
        self
    }

    pub fn top_percent(mut self, percent: u8) -> Self {
        self.criteria.top_percent = Some(percent.min(100));
        self
    }

    pub fn build(self) -> SearchCriteria {
        self.criteria
    }
}

/// Alphanumeric runs of `text`, in order.
pub fn split_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
}
