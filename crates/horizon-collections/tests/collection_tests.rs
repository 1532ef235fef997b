//! Integration tests for collection building, rebuilds and navigation.

use horizon_collections::{
    Collection, CollectionConfig, CollectionError, Entry, ExpansionManager, Item, Key, KeyRule,
    KeySet, KeyboardDelegate, Navigator, Section, SelectionManager, SelectionMode,
};
use serde_json::json;

fn folders() -> Vec<Entry<serde_json::Value>> {
    vec![
        Item::new(json!({ "uuid": "a", "name": "Projects" }))
            .with_title("Projects")
            .with_child_items(vec![
                Item::new(json!({ "uuid": "a1", "name": "Lattice" })).with_text_value("Lattice"),
                Item::new(json!({ "uuid": "a2", "name": "Ledger" })).with_text_value("Ledger"),
            ])
            .into(),
        Section::new("shared")
            .with_title("Shared")
            .with_items(vec![
                Item::new(json!({ "uuid": "s1", "name": "Budget" })).with_text_value("Budget"),
            ])
            .into(),
        Item::new(json!({ "uuid": "b", "name": "Archive" }))
            .with_title("Archive")
            .with_has_child_items(true)
            .into(),
    ]
}

fn uuid_rule() -> KeyRule<serde_json::Value> {
    let config = CollectionConfig::from_toml_str("item_key = \"uuid\"").unwrap();
    KeyRule::from_config(&config)
}

#[test]
fn test_keys_match_input_in_order() {
    let collection = Collection::build(folders(), &uuid_rule()).unwrap();
    let keys: Vec<String> = collection.keys().map(ToString::to_string).collect();
    assert_eq!(keys, vec!["a", "a1", "a2", "shared", "s1", "b"]);
    assert_eq!(collection.top_level(), &[Key::from("a"), Key::from("shared"), Key::from("b")]);
    assert_eq!(collection.item_values().count(), 2);
}

#[test]
fn test_duplicate_key_scenario() {
    let entries: Vec<Entry<&str>> = vec![
        Item::new("A").with_key(1).with_title("A").into(),
        Item::new("B").with_key(1).with_title("B").into(),
    ];
    let err = Collection::build(entries, &KeyRule::explicit()).unwrap_err();
    assert!(matches!(err, CollectionError::DuplicateKey { key } if key == Key::Int(1)));
}

#[test]
fn test_missing_key_field_reports_rule() {
    let err = Collection::from_values(vec![json!({ "name": "orphan" })], &uuid_rule()).unwrap_err();
    assert!(err.to_string().contains("uuid"));
}

#[test]
fn test_rebuild_prunes_state() {
    let before = Collection::build(folders(), &uuid_rule())
        .unwrap()
        .with_disabled_keys(["a2"]);
    let selection = SelectionManager::new(SelectionMode::Multiple);
    selection.replace_selection(&before, [Key::from("a1"), Key::from("s1"), Key::from("b")]);
    let expansion = ExpansionManager::new(KeySet::single("a"));

    // The shared section disappears in the next snapshot.
    let mut entries = folders();
    entries.remove(1);
    let after = Collection::build(entries, &uuid_rule())
        .unwrap()
        .with_disabled_keys(before.disabled_keys());

    selection.prune(&after);
    expansion.prune(&after);
    assert_eq!(selection.raw_keys(), ["a1", "b"].into_iter().collect::<KeySet>());
    assert_eq!(expansion.raw_keys(), KeySet::single("a"));
    assert!(after.is_disabled(&Key::from("a2")));
    assert_eq!(after.retain_existing(&KeySet::single("s1")), KeySet::new());
}

#[test]
fn test_navigation_follows_expansion() {
    let collection = Collection::build(folders(), &uuid_rule()).unwrap();
    let expansion = ExpansionManager::default();

    let navigator = Navigator::new(&collection, &expansion.expanded_keys(&collection));
    assert_eq!(navigator.key_below(&Key::from("a")), Some(Key::from("s1")));

    expansion.toggle(&collection, &Key::from("a"));
    let navigator = Navigator::new(&collection, &expansion.expanded_keys(&collection));
    assert_eq!(navigator.key_below(&Key::from("a")), Some(Key::from("a1")));
    assert_eq!(navigator.key_right_of(&Key::from("a")), Some(Key::from("a1")));
    assert_eq!(navigator.key_left_of(&Key::from("a2")), Some(Key::from("a")));
    assert_eq!(
        navigator.key_for_search("l", Some(&Key::from("a1"))),
        Some(Key::from("a2"))
    );
    assert_eq!(navigator.key_for_search("arch", None), Some(Key::from("b")));
}

#[test]
fn test_single_selection_never_exceeds_one() {
    let collection = Collection::build(folders(), &uuid_rule()).unwrap();
    let selection = SelectionManager::from_config(&CollectionConfig::default());
    for key in ["a", "a1", "s1", "b", "shared"] {
        selection.toggle(&collection, &Key::from(key));
        assert!(selection.selected_keys(&collection).len() <= 1);
    }
    selection.replace_selection(&collection, collection.item_keys().cloned());
    assert_eq!(selection.raw_keys(), KeySet::single("b"));
}
