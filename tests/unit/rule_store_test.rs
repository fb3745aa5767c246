//! Unit tests for the RuleStore public API.
//!
//! Exercises rule CRUD, validation, id allocation, and wholesale
//! replacement through the `RuleStoreTrait` interface, using an in-memory
//! SQLite database.

use rstest::rstest;
use webshield::database::Database;
use webshield::managers::rule_store::{RuleStore, RuleStoreTrait};
use webshield::types::errors::RuleError;
use webshield::types::rule::{
    ResourceType, RuleAction, RuleCondition, RuleDraft, RulePatch, RuleRecord,
};

fn setup() -> Database {
    Database::open_in_memory().expect("Failed to open in-memory database")
}

#[test]
fn test_create_assigns_monotonic_ids_and_persists_fields() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let a = store.create(RuleDraft::block("ads.example.com")).unwrap();
    let b = store.create(RuleDraft::block("tracker.example.net")).unwrap();

    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
    assert_eq!(store.high_water_mark().unwrap(), 2);

    let fetched = store.get(a.id).unwrap().expect("rule should exist");
    assert_eq!(fetched, a);
    assert!(fetched.enabled);
    assert_eq!(
        fetched.condition.url_filter.as_deref(),
        Some("ads.example.com")
    );
}

#[test]
fn test_deleted_rule_id_is_never_reused() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let a = store.create(RuleDraft::block("a.example.com")).unwrap();
    assert!(store.delete(a.id).unwrap());

    let b = store.create(RuleDraft::block("b.example.com")).unwrap();
    assert!(b.id > a.id, "id {} should not reuse deleted id {}", b.id, a.id);
}

#[rstest]
#[case("*")]
#[case("**")]
fn test_create_rejects_unconstrained_wildcard(#[case] pattern: &str) {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let result = store.create(RuleDraft::block(pattern));
    assert!(matches!(result, Err(RuleError::DangerousPattern(_))));

    // No store mutation: nothing inserted, no id burned
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(store.high_water_mark().unwrap(), 0);
}

#[test]
fn test_create_rejects_empty_filter() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let draft = RuleDraft {
        priority: 1,
        action: RuleAction::Block,
        condition: RuleCondition::default(),
        enabled: true,
    };
    assert!(matches!(store.create(draft), Err(RuleError::EmptyFilter)));

    // An empty string counts as no filter
    assert!(matches!(
        store.create(RuleDraft::block("")),
        Err(RuleError::EmptyFilter)
    ));
}

#[test]
fn test_create_rejects_both_filters_populated() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let draft = RuleDraft {
        priority: 1,
        action: RuleAction::Block,
        condition: RuleCondition {
            url_filter: Some("ads.example.com".to_string()),
            regex_filter: Some("^https://ads".to_string()),
            resource_types: None,
        },
        enabled: true,
    };
    assert!(matches!(
        store.create(draft),
        Err(RuleError::ConflictingFilters)
    ));
}

#[test]
fn test_create_rejects_explicitly_empty_resource_types() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let draft = RuleDraft {
        priority: 1,
        action: RuleAction::Block,
        condition: RuleCondition {
            url_filter: Some("ads.example.com".to_string()),
            regex_filter: None,
            resource_types: Some(vec![]),
        },
        enabled: true,
    };
    assert!(matches!(
        store.create(draft),
        Err(RuleError::NoResourceTypes)
    ));

    // None means "all resource types" and is accepted
    assert!(store.create(RuleDraft::block("ads.example.com")).is_ok());
}

#[test]
fn test_create_accepts_regex_filter_and_resource_types() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let draft = RuleDraft {
        priority: 5,
        action: RuleAction::Allow,
        condition: RuleCondition {
            url_filter: None,
            regex_filter: Some(r"^https://cdn\.".to_string()),
            resource_types: Some(vec![ResourceType::Script, ResourceType::Image]),
        },
        enabled: false,
    };
    let record = store.create(draft).unwrap();

    let fetched = store.get(record.id).unwrap().unwrap();
    assert_eq!(fetched.priority, 5);
    assert_eq!(fetched.action, RuleAction::Allow);
    assert_eq!(
        fetched.condition.regex_filter.as_deref(),
        Some(r"^https://cdn\.")
    );
    assert_eq!(
        fetched.condition.resource_types,
        Some(vec![ResourceType::Script, ResourceType::Image])
    );
    assert!(!fetched.enabled);
}

#[test]
fn test_redirect_action_roundtrips_through_storage() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let draft = RuleDraft {
        priority: 2,
        action: RuleAction::Redirect {
            redirect: webshield::types::rule::RedirectTarget {
                url: "https://safe.example.com/blank.gif".to_string(),
            },
        },
        condition: RuleCondition {
            url_filter: Some("banner.example.com".to_string()),
            regex_filter: None,
            resource_types: None,
        },
        enabled: true,
    };
    let record = store.create(draft).unwrap();

    let fetched = store.get(record.id).unwrap().unwrap();
    assert_eq!(fetched.action, record.action);
}

#[test]
fn test_update_patches_fields_and_revalidates() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let record = store.create(RuleDraft::block("ads.example.com")).unwrap();

    let updated = store
        .update(
            record.id,
            RulePatch {
                priority: Some(9),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(updated);
    let fetched = store.get(record.id).unwrap().unwrap();
    assert_eq!(fetched.priority, 9);
    // Untouched fields survive
    assert_eq!(
        fetched.condition.url_filter.as_deref(),
        Some("ads.example.com")
    );

    // A patched condition goes through the same validation as create
    let result = store.update(
        record.id,
        RulePatch {
            condition: Some(RuleCondition {
                url_filter: Some("*".to_string()),
                regex_filter: None,
                resource_types: None,
            }),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(RuleError::DangerousPattern(_))));
}

#[test]
fn test_update_and_delete_unknown_id_are_noops() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    assert!(!store.update(999, RulePatch::default()).unwrap());
    assert!(!store.delete(999).unwrap());
    assert!(!store.set_enabled(999, true).unwrap());
}

#[test]
fn test_set_enabled_moves_rule_between_lists() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    let record = store.create(RuleDraft::block("ads.example.com")).unwrap();
    assert_eq!(store.enabled_rules().unwrap().len(), 1);

    assert!(store.set_enabled(record.id, false).unwrap());
    assert_eq!(store.enabled_rules().unwrap().len(), 0);
    // Disabled records stay in the store
    assert_eq!(store.list().unwrap().len(), 1);

    assert!(store.set_enabled(record.id, true).unwrap());
    let reenabled = store.get(record.id).unwrap().unwrap();
    assert!(reenabled.enabled);
    // All other fields untouched by the flips
    assert_eq!(reenabled.condition, record.condition);
    assert_eq!(reenabled.action, record.action);
    assert_eq!(reenabled.priority, record.priority);
}

#[test]
fn test_list_is_insertion_ordered() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    for host in ["a.example.com", "b.example.com", "c.example.com"] {
        store.create(RuleDraft::block(host)).unwrap();
    }

    let listed = store.list().unwrap();
    let ids: Vec<i64> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_replace_all_is_wholesale_and_raises_high_water_mark() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    store.create(RuleDraft::block("old.example.com")).unwrap();

    let imported = vec![
        RuleRecord {
            id: 10,
            priority: 1,
            action: RuleAction::Block,
            condition: RuleCondition {
                url_filter: Some("ads.example.com".to_string()),
                regex_filter: None,
                resource_types: None,
            },
            enabled: true,
        },
        RuleRecord {
            id: 20,
            priority: 1,
            action: RuleAction::Allow,
            condition: RuleCondition {
                url_filter: Some("cdn.example.com".to_string()),
                regex_filter: None,
                resource_types: None,
            },
            enabled: false,
        },
    ];
    store.replace_all(&imported).unwrap();

    // Previous contents are gone, imported ids preserved
    let ids: Vec<i64> = store.list().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![10, 20]);
    assert_eq!(store.high_water_mark().unwrap(), 20);

    // The next create continues past the imported ids
    let next = store.create(RuleDraft::block("new.example.com")).unwrap();
    assert_eq!(next.id, 21);
}

#[test]
fn test_replace_all_never_lowers_high_water_mark() {
    let db = setup();
    let mut store = RuleStore::new(db.connection());

    for host in ["a.example.com", "b.example.com", "c.example.com"] {
        store.create(RuleDraft::block(host)).unwrap();
    }
    assert_eq!(store.high_water_mark().unwrap(), 3);

    // Replacement with a lower max id keeps the old mark
    let imported = vec![RuleRecord {
        id: 1,
        priority: 1,
        action: RuleAction::Block,
        condition: RuleCondition {
            url_filter: Some("only.example.com".to_string()),
            regex_filter: None,
            resource_types: None,
        },
        enabled: true,
    }];
    store.replace_all(&imported).unwrap();
    assert_eq!(store.high_water_mark().unwrap(), 3);

    let next = store.create(RuleDraft::block("d.example.com")).unwrap();
    assert_eq!(next.id, 4);
}

#[test]
fn test_store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let db_path = dir.path().join("webshield.db");

    let created = {
        let db = Database::open(&db_path).expect("open failed");
        let mut store = RuleStore::new(db.connection());
        let record = store.create(RuleDraft::block("ads.example.com")).unwrap();
        store.set_enabled(record.id, false).unwrap();
        record
    };

    let db = Database::open(&db_path).expect("reopen failed");
    let store = RuleStore::new(db.connection());

    let fetched = store.get(created.id).unwrap().expect("rule should survive");
    assert!(!fetched.enabled);
    assert_eq!(fetched.condition, created.condition);
    assert_eq!(store.high_water_mark().unwrap(), created.id);
}
