//! # Property-Based Tests
//!
//! Cache-authority and enumeration invariants over arbitrary keys and
//! values, against real redb store files.

use proptest::collection::btree_map;
use proptest::prelude::*;
use std::collections::BTreeMap;
use tether_core::{AccessMode, Namespace, REDB_BACKEND};

/// Store keys: short, non-empty, arbitrary unicode.
fn key_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-zA-Z0-9_\\u{80}-\\u{10FF}]{1,12}")
        .expect("valid key regex")
}

/// Values: anything, including the empty string.
fn value_strategy() -> impl Strategy<Value = String> {
    any::<String>()
}

proptest! {
    // On-disk database per case; keep the case count modest.
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// set(k, v) then get(k) returns v, including across an
    /// unbind/rebind cycle (the cache is authoritative, the store is the
    /// durable mirror).
    #[test]
    fn set_get_roundtrips_and_survives_rebind(
        key in key_strategy(),
        value in value_strategy(),
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.db");
        let mut ns = Namespace::new();

        ns.bind(REDB_BACKEND, &path, AccessMode::ReadWriteCreate, "m")
            .expect("bind");
        ns.set("m", &key, Some(&value)).expect("set");
        prop_assert_eq!(ns.get("m", &key).expect("get"), value.clone());

        prop_assert!(ns.unbind(&["m"], false).is_ok());
        ns.bind(REDB_BACKEND, &path, AccessMode::ReadWriteCreate, "m2")
            .expect("rebind");
        prop_assert_eq!(ns.get("m2", &key).expect("get"), value);
    }

    /// Enumeration visits exactly the replaced-in key set, each key once,
    /// whatever the declared insertion order was.
    #[test]
    fn enumerate_visits_exactly_the_inserted_keys(
        entries in btree_map(key_strategy(), value_strategy(), 0..6),
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.db");
        let mut ns = Namespace::new();

        ns.bind(REDB_BACKEND, &path, AccessMode::ReadWriteCreate, "m")
            .expect("bind");
        ns.replace("m", entries.clone()).expect("replace");

        let mut visits: BTreeMap<String, usize> = BTreeMap::new();
        let mut seen: BTreeMap<String, String> = BTreeMap::new();
        ns.enumerate("m", |k, v| {
            *visits.entry(k.to_string()).or_insert(0) += 1;
            seen.insert(k.to_string(), v.to_string());
        })
        .expect("enumerate");

        prop_assert_eq!(seen, entries);
        prop_assert!(visits.values().all(|&count| count == 1));
    }
}
