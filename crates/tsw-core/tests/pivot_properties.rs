//! Property-based tests for pivot and schema governor invariants.

use std::collections::BTreeMap;

use proptest::prelude::*;
use tsw_common::Value;
use tsw_config::Denylist;
use tsw_core::group::Observation;
use tsw_core::pivot::pivot;
use tsw_store::{govern, is_governed};

fn key_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["A", "B", "Temperature", "humidity", "z"]).prop_map(String::from)
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::Int),
        (-100.0f64..100.0).prop_map(Value::Float),
        "[a-z]{1,6}".prop_map(Value::Str),
        Just(Value::Empty),
    ]
}

fn observation_strategy() -> impl Strategy<Value = Observation> {
    (key_strategy(), 0i64..20, value_strategy()).prop_map(|(key, ts, value)| Observation {
        key,
        ts,
        value,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn pivot_last_write_wins(observations in prop::collection::vec(observation_strategy(), 0..60)) {
        let mut expected: BTreeMap<(i64, String), Value> = BTreeMap::new();
        for obs in &observations {
            expected.insert((obs.ts, obs.key.clone()), obs.value.clone());
        }
        let distinct = expected.len();

        let pivoted = pivot(observations.clone());

        prop_assert_eq!(pivoted.overwritten, observations.len() - distinct);
        for row in pivoted.table.rows() {
            for (key, text) in &row.cells {
                let value = &expected[&(row.ts, key.clone())];
                prop_assert_eq!(text, &value.render());
            }
        }
        for ((ts, key), value) in &expected {
            let row = pivoted.table.rows().iter().find(|r| r.ts == *ts);
            prop_assert!(row.is_some());
            prop_assert_eq!(row.map(|r| r.get(key)).unwrap_or_default(), value.render());
        }
    }

    #[test]
    fn pivot_one_row_per_timestamp(observations in prop::collection::vec(observation_strategy(), 1..60)) {
        let mut timestamps: Vec<i64> = observations.iter().map(|o| o.ts).collect();
        timestamps.sort();
        timestamps.dedup();

        let pivoted = pivot(observations);
        let row_ts: Vec<i64> = pivoted.table.rows().iter().map(|r| r.ts).collect();

        prop_assert_eq!(row_ts, timestamps);
    }

    #[test]
    fn governed_pivot_is_ordered(observations in prop::collection::vec(observation_strategy(), 0..60)) {
        let mut keys: Vec<String> = observations.iter().map(|o| o.key.clone()).collect();
        keys.sort();
        keys.dedup();

        let table = govern(pivot(observations).table, &Denylist::empty());

        prop_assert!(is_governed(&table));
        prop_assert_eq!(table.columns(), keys.as_slice());
        let header = table.header();
        prop_assert_eq!(header.first().map(String::as_str), Some("ts"));
    }

    #[test]
    fn denylisted_keys_never_survive(
        observations in prop::collection::vec(observation_strategy(), 0..60),
        removed in prop::collection::btree_set(key_strategy(), 0..3),
    ) {
        let denylist = Denylist::from_keys(&removed).unwrap();
        let table = govern(pivot(observations).table, &denylist);

        for key in &removed {
            prop_assert!(!table.columns().contains(key));
            prop_assert!(table.rows().iter().all(|r| !r.cells.contains_key(key)));
        }
    }
}
