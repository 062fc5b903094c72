use figment::providers::{Format, Toml};
use figment::Figment;
use std::fs;
use tempfile::TempDir;

use taxlib_core::config::{Config, SearchSettings};
use taxlib_core::node::{enum_value_element_id, is_enum_value_id, ENUM_VALUE_MARKER};
use taxlib_core::{
    BalanceType, EnumValueNode, ExtendedFilter, IndexItem, Node, NodeProvider, NodeSpec, ResetMode,
    SearchCriteria, SearchField, StaticNodeProvider, TaxonomyFile,
};

fn sample_tree() -> std::sync::Arc<Node> {
    Node::from_spec(NodeSpec::new("Statement", "Balance Sheet").with_children(vec![
        NodeSpec::new("Assets", "Assets").with_children(vec![NodeSpec::new("Cash", "Cash")]),
        NodeSpec::new("", "Unnamed group").with_children(vec![NodeSpec::new("Goodwill", "Goodwill")]),
    ]))
}

#[test]
fn node_paths_follow_ancestry() {
    let root = sample_tree();
    let assets = &root.children()[0];
    let cash = &assets.children()[0];

    assert_eq!(root.path(), "");
    assert_eq!(assets.path(), "Statement/");
    assert_eq!(cash.path(), "Statement/Assets/");
    assert_eq!(assets.subtree_path(), "Statement/Assets/");
    assert!(cash.path().starts_with(&assets.subtree_path()));
    assert_eq!(cash.parent().map(|p| p.id().to_string()).as_deref(), Some("Assets"));
}

#[test]
fn structural_nodes_contribute_their_label_to_paths() {
    let root = sample_tree();
    let goodwill = &root.children()[1].children()[0];
    assert_eq!(goodwill.path(), "Statement/Unnamed group/");
    assert!(!root.children()[1].is_identifiable());
}

#[test]
fn labels_can_change_after_construction() {
    let root = sample_tree();
    root.set_label("Statement of Financial Position");
    assert_eq!(root.label(), "Statement of Financial Position");
}

#[test]
fn enum_value_items_live_under_their_parent() {
    let root = sample_tree();
    let assets = root.children()[0].clone();
    let item = IndexItem::EnumValue(EnumValueNode::new(assets.clone(), "us-gaap:CashMember"));

    assert_eq!(item.id(), format!("{ENUM_VALUE_MARKER}us-gaap:CashMember"));
    assert_eq!(item.path(), "Statement/Assets/");
    assert!(is_enum_value_id(&item.id()));
    assert_eq!(enum_value_element_id(&item.id()), "us-gaap:CashMember");
    assert_eq!(enum_value_element_id("Cash"), "Cash");
    assert!(std::sync::Arc::ptr_eq(item.node(), &assets));
}

#[test]
fn whole_word_and_stemming_are_mutually_exclusive() {
    let criteria = SearchCriteria::builder().stem_plurals(true).whole_word(true).build();
    assert!(criteria.whole_word());
    assert!(!criteria.stem_plurals());

    let criteria = criteria.to_builder().stem_plurals(true).build();
    assert!(!criteria.whole_word());
    assert!(criteria.stem_plurals());
}

#[test]
fn builder_splits_words_and_dedups_fields() {
    let criteria = SearchCriteria::builder()
        .required("net-income, revenue")
        .fields([SearchField::Definition, SearchField::Label, SearchField::Definition])
        .build();
    assert_eq!(criteria.required_words(), ["net", "income", "revenue"]);
    assert_eq!(criteria.fields(), [SearchField::Definition, SearchField::Label]);
}

#[test]
fn reset_modes() {
    let configured = SearchCriteria::builder()
        .required("cash")
        .ancestry_path("Statement/Assets/$")
        .extended(ExtendedFilter::Only)
        .build();

    let mut full = configured.clone();
    full.reset(ResetMode::Full);
    assert_eq!(full, SearchCriteria::default());

    let mut keep = configured.clone();
    keep.reset(ResetMode::KeepPath);
    assert!(keep.required_words().is_empty());
    assert_eq!(keep.ancestry_path(), Some("Statement/Assets/$"));
    assert_eq!(keep.ancestry_prefix(), Some("Statement/Assets/"));

    let mut untouched = configured.clone();
    untouched.reset(ResetMode::None);
    assert_eq!(untouched, configured);
}

#[test]
fn update_from_copies_lists_deeply() {
    let original = SearchCriteria::builder().required("cash").balance_types([BalanceType::Debit]).build();
    let mut copy = SearchCriteria::default();
    copy.update_from(&original);
    assert_eq!(copy, original);

    let copy = copy.to_builder().required("equivalents").build();
    assert_eq!(original.required_words(), ["cash"]);
    assert_eq!(copy.required_words(), ["cash", "equivalents"]);
}

#[test]
fn criteria_round_trips_through_json() {
    let criteria = SearchCriteria::builder()
        .optional("accounts payable")
        .include_abstract(false)
        .top_percent(150)
        .build();
    assert_eq!(criteria.top_percent(), Some(100));
    let json = serde_json::to_string(&criteria).expect("serialize");
    let back: SearchCriteria = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, criteria);
}

#[test]
fn search_settings_default_when_section_missing() {
    let config = Config::from_figment(Figment::new());
    assert_eq!(config.search_settings().expect("settings"), SearchSettings::default());
}

#[test]
fn search_settings_merge_partial_section() {
    let config = Config::from_figment(Figment::new().merge(Toml::string("[search]\nmax_hits = 25\nphrase_slop = 3\n")));
    let settings = config.search_settings().expect("settings");
    assert_eq!(settings.max_hits, 25);
    assert_eq!(settings.phrase_slop, 3);
    assert_eq!(settings.progress_interval_ms, 500);
    let max_hits: usize = config.get("search.max_hits").expect("get");
    assert_eq!(max_hits, 25);
}

#[test]
fn invalid_settings_are_rejected() {
    let settings = SearchSettings { writer_heap_bytes: 1_000, ..SearchSettings::default() };
    assert!(settings.validate().is_err());
}

#[test]
fn load_from_reads_config_toml() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[search]\nstop_timeout_ms = 2000\n").unwrap();
    let config = Config::load_from(tmp.path()).expect("load");
    assert_eq!(config.search_settings().unwrap().stop_timeout_ms, 2000);
}

#[test]
fn relative_store_root_resolves_against_the_config_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[search]\nstore_root = \"indexes\"\n").unwrap();
    let config = Config::load_from(tmp.path()).expect("load");
    assert_eq!(config.base_dir(), tmp.path());
    let settings = config.search_settings().unwrap();
    assert_eq!(settings.store_root_path(), Some(tmp.path().join("indexes")));

    let absolute = tmp.path().join("elsewhere");
    let toml = format!("[search]\nstore_root = {:?}\n", absolute.to_string_lossy());
    let config = Config::from_figment(Figment::new().merge(Toml::string(&toml)));
    assert_eq!(config.search_settings().unwrap().store_root_path(), Some(absolute));
}

#[test]
fn taxonomy_file_builds_a_provider() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("taxonomy.json");
    fs::write(
        &path,
        r#"{"view":"presentation","roots":[{"id":"Root","label":"Root","abstract":true,
            "children":[{"id":"Revenue","label":"Revenue","balance":"credit","order":1.0}]}]}"#,
    )
    .unwrap();

    let provider = StaticNodeProvider::from(TaxonomyFile::read(&path).expect("read"));
    assert_eq!(provider.current_language(), "en");
    assert_eq!(provider.view_key_component(), "presentation");
    let revenue = provider.find("Revenue").expect("revenue");
    assert_eq!(revenue.balance(), BalanceType::Credit);
    assert!(provider.roots()[0].is_abstract());
}
