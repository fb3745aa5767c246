//! Property-based tests for rule id allocation.
//!
//! For any sequence of create, delete, and toggle operations, every id the
//! allocator hands out is pairwise distinct and strictly increasing in
//! allocation order, and the high-water mark never trails the largest
//! allocated id.

use proptest::prelude::*;
use webshield::database::Database;
use webshield::managers::rule_store::{RuleStore, RuleStoreTrait};
use webshield::types::rule::RuleDraft;

/// One step of an allocation-relevant operation sequence.
#[derive(Debug, Clone)]
enum Op {
    Create(String),
    /// Delete the nth previously created rule (modulo how many exist).
    Delete(usize),
    /// Flip the nth previously created rule (modulo how many exist).
    Toggle(usize),
}

fn arb_host() -> impl Strategy<Value = String> {
    ("[a-z]{3,10}", prop_oneof![Just(".com"), Just(".net"), Just(".org")])
        .prop_map(|(host, tld)| format!("{}{}", host, tld))
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => arb_host().prop_map(Op::Create),
        1 => any::<usize>().prop_map(Op::Delete),
        1 => any::<usize>().prop_map(Op::Toggle),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn allocated_ids_are_distinct_and_strictly_increasing(
        ops in proptest::collection::vec(arb_op(), 1..40),
    ) {
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        let mut store = RuleStore::new(db.connection());

        let mut allocated: Vec<i64> = Vec::new();
        let mut live: Vec<i64> = Vec::new();

        for op in ops {
            match op {
                Op::Create(host) => {
                    let record = store
                        .create(RuleDraft::block(&host))
                        .expect("create should succeed for valid drafts");
                    allocated.push(record.id);
                    live.push(record.id);
                }
                Op::Delete(n) => {
                    if !live.is_empty() {
                        let id = live.remove(n % live.len());
                        prop_assert!(store.delete(id).unwrap());
                    }
                }
                Op::Toggle(n) => {
                    if !live.is_empty() {
                        let id = live[n % live.len()];
                        let enabled = store.get(id).unwrap().unwrap().enabled;
                        prop_assert!(store.set_enabled(id, !enabled).unwrap());
                    }
                }
            }
        }

        // Strictly increasing implies pairwise distinct
        for pair in allocated.windows(2) {
            prop_assert!(
                pair[0] < pair[1],
                "ids must be strictly increasing, got {} then {}",
                pair[0],
                pair[1]
            );
        }

        // The high-water mark never trails the largest allocated id,
        // deletions included
        let max_allocated = allocated.last().copied().unwrap_or(0);
        prop_assert!(store.high_water_mark().unwrap() >= max_allocated);
    }

    #[test]
    fn replace_all_never_enables_id_collisions(
        hosts_before in proptest::collection::vec(arb_host(), 1..10),
        imported_ids in proptest::collection::btree_set(1i64..100, 1..10),
        hosts_after in proptest::collection::vec(arb_host(), 1..10),
    ) {
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        let mut store = RuleStore::new(db.connection());

        for host in &hosts_before {
            store.create(RuleDraft::block(host)).unwrap();
        }

        let records: Vec<_> = imported_ids
            .iter()
            .map(|&id| webshield::types::rule::RuleRecord {
                id,
                priority: 1,
                action: webshield::types::rule::RuleAction::Block,
                condition: webshield::types::rule::RuleCondition {
                    url_filter: Some(format!("imported{}.example.com", id)),
                    regex_filter: None,
                    resource_types: None,
                },
                enabled: true,
            })
            .collect();
        store.replace_all(&records).unwrap();

        let mut seen: Vec<i64> = store.list().unwrap().iter().map(|r| r.id).collect();
        for host in &hosts_after {
            let record = store.create(RuleDraft::block(host)).unwrap();
            prop_assert!(
                !seen.contains(&record.id),
                "freshly allocated id {} collides with an existing id",
                record.id
            );
            seen.push(record.id);
        }
    }
}
