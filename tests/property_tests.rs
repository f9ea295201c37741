//! Property-based tests for the mutation pipeline.

use futures::FutureExt;
use proptest::prelude::*;
use statecell::{Mutation, SetConfig, Store, StoreOptions, Update, VersionId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug)]
enum Op {
    Add(i64),
    Mul(i64),
    Neg,
}

impl Op {
    fn apply(self, x: i64) -> i64 {
        match self {
            Op::Add(n) => x.wrapping_add(n),
            Op::Mul(n) => x.wrapping_mul(n),
            Op::Neg => x.wrapping_neg(),
        }
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-1000i64..1000).prop_map(Op::Add),
        (-10i64..10).prop_map(Op::Mul),
        Just(Op::Neg),
    ]
}

proptest! {
    #[test]
    fn prop_state_is_fold_of_mutators(
        initial in -1000i64..1000,
        ops in prop::collection::vec(op_strategy(), 0..50),
    ) {
        let store = Store::new(initial);
        for op in &ops {
            let op = *op;
            let _ = store.set(move |x| Mutation::ready(op.apply(*x)), SetConfig::new());
        }

        let expected = ops.iter().fold(initial, |acc, op| op.apply(acc));
        prop_assert_eq!(*store.get(None).unwrap().state, expected);
    }

    #[test]
    fn prop_id_changes_only_on_commit(
        outcomes in prop::collection::vec(any::<bool>(), 1..30),
    ) {
        let store = Store::new(0u32);
        let mut seen = HashSet::new();
        seen.insert(store.id());

        for succeed in outcomes {
            let before = store.id();
            let _ = store.set(
                move |x| if succeed { Mutation::ready(x + 1) } else { Mutation::failed("skip") },
                SetConfig::new(),
            );
            let after = store.id();

            if succeed {
                prop_assert_ne!(&after, &before);
                seen.insert(after);
            } else {
                prop_assert_eq!(&after, &before);
            }
            prop_assert_eq!(store.id(), store.id());
        }
    }

    #[test]
    fn prop_indexed_versions_resolve(
        values in prop::collection::vec(any::<Option<i16>>(), 1..20),
    ) {
        let store: Store<Option<i16>> = Store::create(StoreOptions::new(None));
        let mut recorded: Vec<(VersionId, Option<i16>)> = Vec::new();

        for value in &values {
            let value = *value;
            let update = store
                .set(move |_| Mutation::ready(value), SetConfig::indexed())
                .now_or_never()
                .unwrap()
                .unwrap();
            recorded.push((update.id.unwrap(), value));
        }

        for (id, value) in &recorded {
            prop_assert_eq!(*store.get(Some(id.as_str())).unwrap().state, *value);
        }
        prop_assert_eq!(store.history_len(), recorded.len());
    }

    #[test]
    fn prop_subscribers_see_every_commit_in_order(
        ops in prop::collection::vec(op_strategy(), 1..30),
    ) {
        let store = Store::new(0i64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _handle = store.subscribe_fn(move |update: &Update<i64>| {
            sink.lock().unwrap().push(*update.state);
        });

        let mut expected = Vec::new();
        let mut acc = 0i64;
        for op in &ops {
            let op = *op;
            acc = op.apply(acc);
            expected.push(acc);
            let _ = store.set(move |x| Mutation::ready(op.apply(*x)), SetConfig::new());
        }

        prop_assert_eq!(&*seen.lock().unwrap(), &expected);
    }
}

#[test]
fn test_every_falsy_like_state_round_trips() {
    fn check<S>(value: S)
    where
        S: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
    {
        let store = Store::new(value.clone());
        let update = store
            .set(move |_| Mutation::ready(value), SetConfig::indexed())
            .now_or_never()
            .unwrap()
            .unwrap();
        let id = update.id.unwrap();
        assert_eq!(store.get(Some(id.as_str())).unwrap().state, update.state);
    }

    check(0i32);
    check(false);
    check(String::new());
    check(None::<i32>);
    check(Some(()));
    check(Vec::<u8>::new());
    check(vec![1, 2, 3]);
    check(serde_json::json!({"nested": {"list": [0, false, ""]}}));
    check(serde_json::Value::Null);
}
