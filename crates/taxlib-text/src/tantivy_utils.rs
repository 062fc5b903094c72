use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, INDEXED, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use tantivy::{doc, Index, TantivyDocument};

use taxlib_core::error::{Error, Result};
use taxlib_core::{BalanceType, IndexedDocument};

pub const TAXONOMY_TOKENIZER: &str = "taxonomy_text";

pub const LABEL: &str = "label";
pub const ELEMENT_ID: &str = "element_id";
pub const ELEMENT_ID_EXACT: &str = "element_id_exact";
pub const DEFINITION: &str = "definition";
pub const BALANCE: &str = "balance";
pub const ABSTRACT: &str = "abstract";
pub const EXTENDED: &str = "extended";
pub const PATH: &str = "path";
pub const DISPLAY_NAME: &str = "display_name";
pub const REFERENCES: &str = "references";
pub const ORDER: &str = "order";

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer(TAXONOMY_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();

    schema_builder.add_text_field(LABEL, text_options.clone());
    schema_builder.add_text_field(ELEMENT_ID, text_options.clone());
    schema_builder.add_text_field(ELEMENT_ID_EXACT, STRING | STORED);
    schema_builder.add_text_field(DEFINITION, text_options.clone());
    schema_builder.add_text_field(BALANCE, STRING | STORED);
    schema_builder.add_text_field(ABSTRACT, STRING | STORED);
    schema_builder.add_text_field(EXTENDED, STRING | STORED);
    schema_builder.add_text_field(PATH, STRING | STORED);
    schema_builder.add_text_field(DISPLAY_NAME, text_options.clone());
    schema_builder.add_text_field(REFERENCES, text_options);
    schema_builder.add_f64_field(ORDER, INDEXED | STORED);
    schema_builder.build()
}

/// Lower-cased simple tokens, overly long tokens dropped. No stemming: stems
/// are matched at query time through prefix terms.
pub fn register_tokenizer(index: &Index) {
    let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(TAXONOMY_TOKENIZER, tokenizer);
}

pub fn bool_term(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Field handles resolved once per store.
#[derive(Debug, Clone, Copy)]
pub struct TaxonomyFields {
    pub label: Field,
    pub element_id: Field,
    pub element_id_exact: Field,
    pub definition: Field,
    pub balance: Field,
    pub is_abstract: Field,
    pub extended: Field,
    pub path: Field,
    pub display_name: Field,
    pub references: Field,
    pub order: Field,
}

impl TaxonomyFields {
    pub fn resolve(schema: &Schema) -> Result<Self> {
        let get = |name: &str| schema.get_field(name).map_err(|e| Error::Engine(e.to_string()));
        Ok(Self {
            label: get(LABEL)?,
            element_id: get(ELEMENT_ID)?,
            element_id_exact: get(ELEMENT_ID_EXACT)?,
            definition: get(DEFINITION)?,
            balance: get(BALANCE)?,
            is_abstract: get(ABSTRACT)?,
            extended: get(EXTENDED)?,
            path: get(PATH)?,
            display_name: get(DISPLAY_NAME)?,
            references: get(REFERENCES)?,
            order: get(ORDER)?,
        })
    }

    pub fn to_tantivy(&self, d: &IndexedDocument) -> TantivyDocument {
        doc!(
            self.label => d.label.clone(),
            self.element_id => d.element_id.clone(),
            self.element_id_exact => d.element_id.clone(),
            self.definition => d.definition.clone(),
            self.balance => d.balance.as_str().to_string(),
            self.is_abstract => bool_term(d.is_abstract).to_string(),
            self.extended => bool_term(d.is_extended).to_string(),
            self.path => d.path.clone(),
            self.display_name => d.display_name.clone(),
            self.references => d.references.clone(),
            self.order => d.order,
        )
    }

    pub fn to_indexed(&self, doc: &TantivyDocument) -> IndexedDocument {
        let text = |field: Field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
        IndexedDocument {
            element_id: text(self.element_id_exact),
            label: text(self.label),
            definition: text(self.definition),
            balance: BalanceType::parse(&text(self.balance)).unwrap_or_default(),
            is_abstract: text(self.is_abstract) == "true",
            is_extended: text(self.extended) == "true",
            path: text(self.path),
            display_name: text(self.display_name),
            references: text(self.references),
            order: doc.get_first(self.order).and_then(|v| v.as_f64()).unwrap_or_default(),
        }
    }
}
