//! Lucene-style query strings to tantivy queries.
//!
//! Supported syntax: `AND` / `OR` connectives, `+` / `-` clause prefixes,
//! parentheses, `field:term`, `field:term*` (prefix), `field:"a b"~N`
//! (phrase with slop), `field:(a b)` groups, `^N` boosts and `*:*`.
//! Every term must name a field; there is no default field.

use tantivy::query::{
    AllQuery, BooleanQuery, BoostQuery, EmptyQuery, Occur, PhraseQuery, Query, RegexQuery, TermQuery,
};
use tantivy::schema::{Field, FieldType, IndexRecordOption, Schema};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

use taxlib_core::error::{Error, Result};

pub struct TaxonomyQueryParser {
    index: Index,
    schema: Schema,
}

impl TaxonomyQueryParser {
    pub fn for_index(index: &Index) -> Self {
        Self { index: index.clone(), schema: index.schema() }
    }

    pub fn parse_query(&self, input: &str) -> Result<Box<dyn Query>> {
        let mut cursor = Cursor { chars: input.chars().collect(), pos: 0, parser: self };
        let query = cursor.expression(None)?;
        cursor.skip_whitespace();
        if !cursor.at_end() {
            return Err(cursor.error("unexpected input"));
        }
        Ok(query.unwrap_or_else(|| Box::new(EmptyQuery)))
    }

    fn is_text_field(&self, field: Field) -> bool {
        matches!(self.schema.get_field_entry(field).field_type(), FieldType::Str(_))
    }

    fn resolve_field(&self, name: &str) -> Result<Field> {
        self.schema
            .get_field(name)
            .map_err(|_| Error::QueryParse(format!("unknown field '{}'", name)))
    }

    /// Tokens of `text` as the field's analyzer produces them at index time.
    fn analyze(&self, field: Field, text: &str) -> Result<Vec<(Term, String)>> {
        match self.schema.get_field_entry(field).field_type() {
            FieldType::Str(options) => {
                let tokenizer_name = options.get_indexing_options().map(|o| o.tokenizer()).ok_or_else(|| {
                    Error::QueryParse(format!("field '{}' is not indexed", self.schema.get_field_name(field)))
                })?;
                let mut analyzer = self
                    .index
                    .tokenizers()
                    .get(tokenizer_name)
                    .ok_or_else(|| Error::QueryParse(format!("tokenizer '{}' is not registered", tokenizer_name)))?;
                let mut stream = analyzer.token_stream(text);
                let mut terms = Vec::new();
                while stream.advance() {
                    let token = stream.token().text.clone();
                    terms.push((Term::from_field_text(field, &token), token));
                }
                Ok(terms)
            }
            FieldType::F64(_) => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| Error::QueryParse(format!("'{}' is not a number", text)))?;
                Ok(vec![(Term::from_field_f64(field, value), text.to_string())])
            }
            FieldType::U64(_) => {
                let value: u64 = text
                    .parse()
                    .map_err(|_| Error::QueryParse(format!("'{}' is not an unsigned integer", text)))?;
                Ok(vec![(Term::from_field_u64(field, value), text.to_string())])
            }
            _ => Err(Error::QueryParse(format!(
                "field '{}' cannot be queried with text",
                self.schema.get_field_name(field)
            ))),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Required,
    Prohibited,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    None,
    And,
    Or,
}

struct Clause {
    conjunction: Conjunction,
    modifier: Modifier,
    query: Option<Box<dyn Query>>,
}

struct Cursor<'a> {
    chars: Vec<char>,
    pos: usize,
    parser: &'a TaxonomyQueryParser,
}

const SPECIAL: &[char] = &['(', ')', '"', ':', '^', '~', '*'];

impl Cursor<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::QueryParse(format!("{} at position {}", message, self.pos))
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| !c.is_whitespace() && !SPECIAL.contains(&c)) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Consumes `AND` / `OR` when it stands alone as a word.
    fn conjunction(&mut self) -> Conjunction {
        for (keyword, conj) in [("AND", Conjunction::And), ("OR", Conjunction::Or)] {
            let end = self.pos + keyword.len();
            if end > self.chars.len() {
                continue;
            }
            let candidate: String = self.chars[self.pos..end].iter().collect();
            let delimited = self.chars.get(end).map_or(true, |c| c.is_whitespace() || *c == '(');
            if candidate == keyword && delimited {
                self.pos = end;
                return conj;
            }
        }
        Conjunction::None
    }

    fn expression(&mut self, default_field: Option<Field>) -> Result<Option<Box<dyn Query>>> {
        let mut clauses = Vec::new();
        loop {
            self.skip_whitespace();
            if self.at_end() || self.peek() == Some(')') {
                break;
            }
            let conjunction = if clauses.is_empty() { Conjunction::None } else { self.conjunction() };
            self.skip_whitespace();
            let modifier = if self.eat('+') {
                Modifier::Required
            } else if self.eat('-') {
                Modifier::Prohibited
            } else {
                Modifier::None
            };
            let query = self.clause(default_field)?;
            clauses.push(Clause { conjunction, modifier, query });
        }
        Ok(combine(clauses))
    }

    fn clause(&mut self, default_field: Option<Field>) -> Result<Option<Box<dyn Query>>> {
        let query = if self.eat('(') {
            let inner = self.expression(default_field)?;
            if !self.eat(')') {
                return Err(self.error("missing ')'"));
            }
            inner
        } else if self.peek() == Some('*') {
            self.pos += 1;
            if !(self.eat(':') && self.eat('*')) {
                return Err(self.error("expected '*:*'"));
            }
            Some(Box::new(AllQuery) as Box<dyn Query>)
        } else if self.peek() == Some('"') {
            let field = default_field.ok_or_else(|| self.error("phrase without a field"))?;
            self.phrase(field)?
        } else {
            let word = self.word();
            if word.is_empty() {
                return Err(self.error("expected a term"));
            }
            if self.eat(':') {
                let field = self.parser.resolve_field(&word)?;
                if self.eat('(') {
                    let inner = self.expression(Some(field))?;
                    if !self.eat(')') {
                        return Err(self.error("missing ')'"));
                    }
                    inner
                } else if self.peek() == Some('"') {
                    self.phrase(field)?
                } else {
                    let value = self.word();
                    if value.is_empty() {
                        return Err(self.error("expected a value after ':'"));
                    }
                    self.term(field, &value)?
                }
            } else {
                let field = default_field.ok_or_else(|| self.error("term without a field"))?;
                self.term(field, &word)?
            }
        };
        self.boost(query)
    }

    fn term(&mut self, field: Field, text: &str) -> Result<Option<Box<dyn Query>>> {
        let prefix = self.eat('*');
        let mut tokens = self.parser.analyze(field, text)?;
        let Some((last, last_text)) = tokens.pop() else {
            return Ok(None);
        };
        if !prefix {
            if tokens.is_empty() {
                return Ok(Some(Box::new(TermQuery::new(last, IndexRecordOption::WithFreqs))));
            }
            let mut terms: Vec<Term> = tokens.into_iter().map(|(t, _)| t).collect();
            terms.push(last);
            return Ok(Some(Box::new(PhraseQuery::new(terms))));
        }
        if !self.parser.is_text_field(field) {
            return Err(self.error("prefix queries need a text field"));
        }
        let last_query = prefix_query(field, &last_text)?;
        if tokens.is_empty() {
            return Ok(Some(last_query));
        }
        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = tokens
            .into_iter()
            .map(|(t, _)| (Occur::Must, Box::new(TermQuery::new(t, IndexRecordOption::WithFreqs)) as Box<dyn Query>))
            .collect();
        subqueries.push((Occur::Must, last_query));
        Ok(Some(Box::new(BooleanQuery::new(subqueries))))
    }

    fn phrase(&mut self, field: Field) -> Result<Option<Box<dyn Query>>> {
        self.eat('"');
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '"') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if !self.eat('"') {
            return Err(self.error("unterminated phrase"));
        }
        let slop = if self.eat('~') { self.number()? as u32 } else { 0 };
        let mut terms: Vec<Term> = self.parser.analyze(field, &text)?.into_iter().map(|(t, _)| t).collect();
        Ok(match terms.len() {
            0 => None,
            1 => terms.pop().map(|t| Box::new(TermQuery::new(t, IndexRecordOption::WithFreqs)) as Box<dyn Query>),
            _ => {
                let mut phrase = PhraseQuery::new(terms);
                phrase.set_slop(slop);
                Some(Box::new(phrase))
            }
        })
    }

    fn boost(&mut self, query: Option<Box<dyn Query>>) -> Result<Option<Box<dyn Query>>> {
        if !self.eat('^') {
            return Ok(query);
        }
        let factor = self.number()?;
        Ok(query.map(|q| Box::new(BoostQuery::new(q, factor)) as Box<dyn Query>))
    }

    fn number(&mut self) -> Result<f32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        raw.parse().map_err(|_| self.error("expected a number"))
    }
}

fn prefix_query(field: Field, text: &str) -> Result<Box<dyn Query>> {
    let pattern = format!("{}.*", escape_regex(text));
    let query = RegexQuery::from_pattern(&pattern, field).map_err(|e| Error::QueryParse(e.to_string()))?;
    Ok(Box::new(query))
}

fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_punctuation() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Resolves clause occurrences the way classic Lucene does with a default
/// OR operator: `AND` promotes both neighbours to required unless prohibited.
fn combine(clauses: Vec<Clause>) -> Option<Box<dyn Query>> {
    let mut occurs: Vec<Occur> = clauses
        .iter()
        .map(|c| match c.modifier {
            Modifier::Required => Occur::Must,
            Modifier::Prohibited => Occur::MustNot,
            Modifier::None => Occur::Should,
        })
        .collect();
    for i in 1..clauses.len() {
        if clauses[i].conjunction == Conjunction::And {
            if occurs[i - 1] == Occur::Should {
                occurs[i - 1] = Occur::Must;
            }
            if occurs[i] == Occur::Should {
                occurs[i] = Occur::Must;
            }
        }
    }

    let mut subqueries: Vec<(Occur, Box<dyn Query>)> = clauses
        .into_iter()
        .zip(occurs)
        .filter_map(|(clause, occur)| clause.query.map(|q| (occur, q)))
        .collect();
    if subqueries.is_empty() {
        return None;
    }
    if subqueries.len() == 1 && subqueries[0].0 != Occur::MustNot {
        return subqueries.pop().map(|(_, q)| q);
    }
    if subqueries.iter().all(|(occur, _)| *occur == Occur::MustNot) {
        subqueries.push((Occur::Must, Box::new(AllQuery)));
    }
    Some(Box::new(BooleanQuery::new(subqueries)))
}
