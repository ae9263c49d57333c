// Property-based tests for the merge, path and ledger primitives.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use creditmemo_recon::merge::deep_merge;
use creditmemo_recon::path::{get, set};
use creditmemo_recon::{Candidate, CandidateLedger, FieldPath, Value};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("borrower".to_string()),
        Just("riskAssessment".to_string()),
        Just("publicRatings".to_string()),
        r"[a-z]{1,6}",
    ]
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1000i64..1000).prop_map(Value::from),
        r"[A-Za-z0-9 +\-]{0,12}".prop_map(Value::from),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map(arb_key(), inner, 0..4)
                .prop_map(|m: BTreeMap<String, Value>| Value::Object(Arc::new(m))),
        ]
    })
}

fn arb_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(arb_key(), arb_value(), 0..5).prop_map(|m| Value::Object(Arc::new(m)))
}

fn arb_path() -> impl Strategy<Value = FieldPath> {
    prop::collection::vec(arb_key(), 1..4).prop_map(|segments| FieldPath::parse(&segments.join(".")).unwrap())
}

fn arb_candidate() -> impl Strategy<Value = Candidate> {
    (r"(3B|3B-|3b|Ba1|BA1|Strong|strong|Weak)", r"[a-z]{1,8}\.pdf")
        .prop_map(|(value, file)| Candidate::new(value, file, "1"))
}

/// Strip intermediate scalars and sequences on `path` so `set` can descend.
fn make_addressable(record: Value, path: &FieldPath) -> Value {
    let segments: Vec<&str> = path.segments().collect();
    let mut prefix = Vec::new();
    let mut out = record;
    for segment in &segments[..segments.len() - 1] {
        prefix.push(*segment);
        let here = FieldPath::parse(&prefix.join(".")).unwrap();
        if !matches!(get(&out, &here), None | Some(Value::Object(_))) {
            out = set(&out, &here, Value::empty_object()).unwrap();
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn merge_with_sequence_source_is_the_source(target in arb_value(), items in prop::collection::vec(arb_value(), 0..4)) {
        let source = Value::from(items);
        prop_assert_eq!(deep_merge(&target, &source), source);
    }

    #[test]
    fn merge_is_idempotent(target in arb_object(), source in arb_object()) {
        let once = deep_merge(&target, &source);
        let twice = deep_merge(&once, &source);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_keeps_target_keys_absent_from_source(target in arb_object(), source in arb_object()) {
        let merged = deep_merge(&target, &source);
        let (Some(t), Some(s), Some(m)) = (target.as_object(), source.as_object(), merged.as_object()) else {
            unreachable!("objects in, object out");
        };
        for (key, value) in t {
            if !s.contains_key(key) {
                prop_assert_eq!(m.get(key), Some(value));
            }
        }
    }

    #[test]
    fn set_then_get_round_trips(record in arb_object(), path in arb_path(), value in arb_value()) {
        let record = make_addressable(record, &path);
        let updated = set(&record, &path, value.clone()).unwrap();
        prop_assert_eq!(get(&updated, &path), Some(&value));
    }

    #[test]
    fn ledger_never_holds_two_equal_keys_after_first_batch(
        first in prop::collection::vec(arb_candidate(), 1..2),
        batches in prop::collection::vec(prop::collection::vec(arb_candidate(), 0..4), 1..4),
    ) {
        let path = FieldPath::parse("riskAssessment.borrowerRating.proposedBrr").unwrap();
        let mut ledger = CandidateLedger::new().add_candidates(&path, &first);
        for batch in &batches {
            let before = ledger.get(&path).to_vec();
            ledger = ledger.add_candidates(&path, batch);

            // Arrival order is stable: the old entry is a prefix of the new one.
            prop_assert_eq!(&ledger.get(&path)[..before.len()], before.as_slice());

            let keys: Vec<String> = ledger.get(&path).iter().map(Candidate::dedup_key).collect();
            for (i, key) in keys.iter().enumerate() {
                prop_assert!(!keys[..i].contains(key), "duplicate key {}", key);
            }

            // Re-adding anything already present changes nothing.
            let again = ledger.add_candidates(&path, ledger.get(&path));
            prop_assert_eq!(&again, &ledger);
        }
    }
}
