//! `SearchCriteria` to query-string compilation.
//!
//! Output is the Lucene-style syntax understood by
//! `taxlib_text::TaxonomyQueryParser`, e.g. for required `revenue` over the
//! label and definition fields:
//!
//! ```text
//! ((+label:revenu*^2) (+definition:revenu*^1)) AND abstract:false
//! ```

use taxlib_core::{BalanceType, ExtendedFilter, SearchCriteria, SearchField};

use crate::stemmer::prefix_stem;

/// Words never worth matching on their own.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it", "no", "not",
    "of", "on", "or", "such", "that", "the", "their", "then", "there", "these", "they", "this", "to", "was",
    "will", "with",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.iter().any(|s| s.eq_ignore_ascii_case(word))
}

#[derive(Debug, Clone)]
pub struct QueryCompiler {
    phrase_slop: u32,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self { phrase_slop: 6 }
    }
}

impl QueryCompiler {
    pub fn new(phrase_slop: u32) -> Self {
        Self { phrase_slop }
    }

    /// Compile `criteria`, or `None` when nothing searchable is left after
    /// stop-word removal. Filters alone never make a query.
    pub fn build_query(&self, criteria: &SearchCriteria) -> Option<String> {
        let required = clean(criteria.required_words());
        let optional = clean(criteria.optional_words());
        let prohibited = clean(criteria.prohibited_words());
        if required.is_empty() && optional.is_empty() && prohibited.is_empty() {
            return None;
        }

        let fields = criteria.fields();
        let mut fragments = Vec::new();
        if let Some(words) = self.word_fragment(criteria, fields, &required, &optional) {
            fragments.push(words);
        }
        if !prohibited.is_empty() {
            let mut clauses = vec!["*:*".to_string()];
            for field in fields {
                for word in &prohibited {
                    clauses.push(format!("-{}:{}", field.field_name(), term(criteria, word)));
                }
            }
            fragments.push(format!("({})", clauses.join(" ")));
        }
        fragments.extend(filter_fragments(criteria));

        let query = fragments.join(" AND ");
        if query.is_empty() { None } else { Some(query) }
    }

    /// Positive words share one boost counter across fields, counting down
    /// from `words x fields` so earlier fields and words weigh more.
    fn word_fragment(
        &self,
        criteria: &SearchCriteria,
        fields: &[SearchField],
        required: &[String],
        optional: &[String],
    ) -> Option<String> {
        let word_count = required.len() + optional.len();
        if word_count == 0 {
            return None;
        }
        let start = word_count * fields.len();
        let mut boost = start;
        let mut groups = Vec::with_capacity(fields.len());
        for field in fields {
            let name = field.field_name();
            let mut clauses = Vec::with_capacity(word_count + 1);
            for word in required {
                clauses.push(format!("+{}:{}^{}", name, term(criteria, word), boost));
                boost -= 1;
            }
            for word in optional {
                clauses.push(format!("{}:{}^{}", name, term(criteria, word), boost));
                boost -= 1;
            }
            if *field == SearchField::Label && optional.len() > 1 {
                clauses.push(format!("{}:\"{}\"~{}^{}", name, optional.join(" "), self.phrase_slop, start));
            }
            groups.push(format!("({})", clauses.join(" ")));
        }
        Some(if groups.len() == 1 { groups.remove(0) } else { format!("({})", groups.join(" ")) })
    }
}

fn clean(words: &[String]) -> Vec<String> {
    words
        .iter()
        .filter(|w| !w.is_empty() && !is_stop_word(w))
        .map(|w| w.to_lowercase())
        .collect()
}

fn term(criteria: &SearchCriteria, word: &str) -> String {
    if criteria.whole_word() {
        return word.to_string();
    }
    let stemmed = if criteria.stem_plurals() { prefix_stem(word) } else { String::new() };
    // Short words such as `ies` can stem away entirely.
    let base = if stemmed.is_empty() { word } else { stemmed.as_str() };
    format!("{}*", base)
}

fn filter_fragments(criteria: &SearchCriteria) -> Vec<String> {
    let mut fragments = Vec::new();
    let balances = criteria.balance_types();
    if !balances.is_empty() && balances.len() < BalanceType::ALL.len() {
        let terms: Vec<String> = balances.iter().map(|b| format!("balance:{}", b.as_str())).collect();
        fragments.push(format!("({})", terms.join(" ")));
    }
    if !criteria.include_abstract() {
        fragments.push("abstract:false".to_string());
    }
    match criteria.extended() {
        ExtendedFilter::Include => {}
        ExtendedFilter::Exclude => fragments.push("extended:false".to_string()),
        ExtendedFilter::Only => fragments.push("extended:true".to_string()),
    }
    fragments
}
