use tempfile::TempDir;

use taxlib_core::error::Error;
use taxlib_core::{BalanceType, IndexedDocument, ViewKey};
use taxlib_text::IndexStore;

const HEAP: usize = 20_000_000;

fn document(id: &str, label: &str, order: f64) -> IndexedDocument {
    IndexedDocument {
        element_id: id.to_string(),
        label: label.to_string(),
        definition: String::new(),
        balance: BalanceType::Credit,
        is_abstract: false,
        is_extended: false,
        path: "IncomeStatement/".to_string(),
        display_name: format!("us-gaap:{}", id),
        references: String::new(),
        order,
    }
}

fn income_statement() -> IndexStore {
    let store = IndexStore::create_in_ram(ViewKey::new("en", "presentation"), HEAP).expect("store");
    store.add_document(&document("Revenue", "Revenue", 1.0)).unwrap();
    store.add_document(&document("Revenues", "Revenues", 2.0)).unwrap();
    store.add_document(&document("NetIncomeLoss", "Net Income", 3.0)).unwrap();
    store.add_document(&document("CostOfRevenue", "Cost of Revenue", 4.0)).unwrap();
    let mut header = document("IncomeStatementAbstract", "Income Statement", 0.0);
    header.is_abstract = true;
    header.balance = BalanceType::None;
    store.add_document(&header).unwrap();
    store.commit().unwrap();
    store
}

fn ids(store: &IndexStore, query: &str) -> Vec<String> {
    let mut ids: Vec<String> = store
        .search(query, 100)
        .expect("search")
        .into_iter()
        .map(|h| h.document.element_id)
        .collect();
    ids.sort();
    ids
}

#[test]
fn prefix_terms_match_every_inflection() {
    let store = income_statement();
    assert_eq!(ids(&store, "label:revenu*"), ["CostOfRevenue", "Revenue", "Revenues"]);
    assert_eq!(ids(&store, "label:revenue"), ["CostOfRevenue", "Revenue"]);
}

#[test]
fn required_and_prohibited_clauses() {
    let store = income_statement();
    assert_eq!(ids(&store, "+label:net* +label:income*"), ["NetIncomeLoss"]);
    assert_eq!(ids(&store, "(+label:revenu* -label:cost*)"), ["Revenue", "Revenues"]);
}

#[test]
fn prohibited_only_group_means_everything_except() {
    let store = income_statement();
    assert_eq!(ids(&store, "(*:* -label:revenu*)"), ["IncomeStatementAbstract", "NetIncomeLoss"]);
    assert_eq!(ids(&store, "(-label:cost* -label:net*)"), ["IncomeStatementAbstract", "Revenue", "Revenues"]);
}

#[test]
fn and_joins_fragments_and_exact_filters() {
    let store = income_statement();
    assert_eq!(ids(&store, "(label:income*) AND abstract:false"), ["NetIncomeLoss"]);
    assert_eq!(ids(&store, "(label:income*) AND (balance:none balance:debit)"), ["IncomeStatementAbstract"]);
    assert_eq!(ids(&store, "label:(revenue net) AND order:3"), ["NetIncomeLoss"]);
}

#[test]
fn sloppy_phrase_matches_nearby_words() {
    let store = income_statement();
    assert_eq!(ids(&store, "label:\"cost revenue\"~2"), ["CostOfRevenue"]);
    assert!(ids(&store, "label:\"revenue cost\"").is_empty());
}

#[test]
fn boosts_reorder_hits() {
    let store = income_statement();
    let hits = store.search("label:revenues^10 label:revenue", 10).unwrap();
    assert_eq!(hits[0].document.element_id, "Revenues");
    let hits = store.search("label:revenues label:revenue^10", 10).unwrap();
    assert_ne!(hits[0].document.element_id, "Revenues");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn stored_fields_round_trip() {
    let store = income_statement();
    let hits = store.search("element_id_exact:NetIncomeLoss", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document, document("NetIncomeLoss", "Net Income", 3.0));
}

#[test]
fn malformed_queries_are_rejected() {
    let store = income_statement();
    for query in ["revenue", "bogus:revenue", "label:\"open", "(label:revenue", "order:abc", "balance:x*^"] {
        assert!(matches!(store.search(query, 10), Err(Error::QueryParse(_))), "{query}");
    }
}

#[test]
fn replace_keeps_a_single_document_per_identity() {
    let store = income_statement();
    let mut renamed = document("Revenue", "Operating Revenue", 1.0);
    store.replace_document("Revenue", "IncomeStatement/", 1.0, Some(&renamed)).unwrap();
    assert_eq!(store.num_docs(), 5);
    assert_eq!(ids(&store, "label:operating"), ["Revenue"]);

    renamed.label = "Total Revenue".to_string();
    store.replace_document("Revenue", "IncomeStatement/", 1.0, Some(&renamed)).unwrap();
    assert_eq!(ids(&store, "element_id_exact:Revenue"), ["Revenue"]);
    assert!(ids(&store, "label:operating").is_empty());

    store.replace_document("Revenue", "IncomeStatement/", 1.0, None).unwrap();
    assert!(ids(&store, "element_id_exact:Revenue").is_empty());
}

#[test]
fn delete_matching_only_touches_the_exact_identity() {
    let store = income_statement();
    store.add_document(&document("Revenue", "Revenue", 9.0)).unwrap();
    store.commit().unwrap();
    store.delete_matching("Revenue", "IncomeStatement/", 1.0).unwrap();
    store.commit().unwrap();
    let hits = store.search("element_id_exact:Revenue", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.order, 9.0);
}

#[test]
fn path_scoped_search_ignores_better_hits_elsewhere() {
    let store = IndexStore::create_in_ram(ViewKey::new("en", "presentation"), HEAP).expect("store");
    for (id, path) in [("R1", "Other/"), ("R2", "Other/"), ("R3", "Target/Sub/"), ("R4", "Target/")] {
        let mut doc = document(id, "Revenue", 1.0);
        doc.path = path.to_string();
        store.add_document(&doc).unwrap();
    }
    store.commit().unwrap();

    assert_eq!(store.search("label:revenue", 2).unwrap().len(), 2);
    let mut ids: Vec<String> = store
        .search_under("label:revenue", "Target/", 2)
        .unwrap()
        .into_iter()
        .map(|h| h.document.element_id)
        .collect();
    ids.sort();
    assert_eq!(ids, ["R3", "R4"]);
    assert_eq!(store.search_under("label:revenue", "Target/", 1).unwrap().len(), 1);
    assert!(store.search_under("label:revenue", "Missing/", 10).unwrap().is_empty());
}

#[test]
fn on_disk_store_finalizes_and_closes() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("en").join("presentation");
    let store = IndexStore::create_in_dir(ViewKey::new("en", "presentation"), &dir, HEAP).expect("store");
    for i in 0..3 {
        store.add_document(&document(&format!("E{i}"), "Revenue", f64::from(i))).unwrap();
        store.commit().unwrap();
    }
    store.finalize().unwrap();
    assert_eq!(store.num_docs(), 3);
    assert_eq!(store.directory(), Some(dir.as_path()));

    store.close().unwrap();
    assert!(store.is_closed());
    assert!(store.add_document(&document("Late", "Late", 0.0)).is_err());
    assert_eq!(ids(&store, "label:revenue").len(), 3);
}
