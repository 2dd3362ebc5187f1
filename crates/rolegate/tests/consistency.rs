//! Property tests: after a rebuild, live inherited evaluation and
//! materialized evaluation agree for every role and key, and rebuilding
//! unchanged data is a no-op on the entry set.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use rolegate::authz::{Authorizer, LiveEvaluator, MaterializedEvaluator};
use rolegate::store::{MemoryStore, SqliteStore, Store};
use rolegate::{EvaluationMode, Gate, GateConfig};
use rolegate_testkit::generators::{any_key, forest_organization, key, role_forest, ForestParams};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn check_agreement<S: Store + ?Sized>(
    store: Arc<S>,
    params: &ForestParams,
    extra_keys: &[String],
) -> Result<(), TestCaseError> {
    let (org, forest) = forest_organization(store.clone(), params).await.unwrap();
    let gate = Gate::with_shared_store(store.clone(), GateConfig::materialized()).unwrap();
    gate.rebuild_organization(&org.id()).await.unwrap();

    let live = LiveEvaluator::new(store.clone(), EvaluationMode::Inherited);
    let materialized = MaterializedEvaluator::new(store.clone());

    let keys: Vec<String> = (0..params.key_count)
        .map(key)
        .chain(extra_keys.iter().cloned())
        .collect();

    for (i, user) in forest.users.iter().enumerate() {
        for (k, key) in keys.iter().enumerate() {
            let by_live = live.can(&user.id, key).await.unwrap();
            let by_closure = materialized.can(&user.id, key).await.unwrap();
            prop_assert_eq!(by_live, by_closure, "role {} key {}", i, key);

            if k < params.key_count {
                prop_assert_eq!(by_closure, params.reaches(i, k), "role {} key {}", i, key);
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn live_and_materialized_agree_memory(
        params in role_forest(10, 5),
        extra in prop::collection::vec(any_key(), 0..3),
    ) {
        runtime().block_on(check_agreement(Arc::new(MemoryStore::new()), &params, &extra))?;
    }

    #[test]
    fn live_and_materialized_agree_sqlite(params in role_forest(8, 4)) {
        let store = Arc::new(SqliteStore::open_memory().unwrap());
        runtime().block_on(check_agreement(store, &params, &[]))?;
    }

    #[test]
    fn rebuild_is_idempotent(params: ForestParams) {
        runtime().block_on(async {
            let store = Arc::new(MemoryStore::new());
            let (org, _) = forest_organization(store.clone(), &params).await.unwrap();
            let gate = Gate::with_shared_store(store.clone(), GateConfig::materialized()).unwrap();

            let first = gate.rebuild_organization(&org.id()).await.unwrap();
            let first_set: BTreeSet<_> = store.closure_entries(&org.id()).await.unwrap().into_iter().collect();
            let second = gate.rebuild_organization(&org.id()).await.unwrap();
            let second_set: BTreeSet<_> = store.closure_entries(&org.id()).await.unwrap().into_iter().collect();

            prop_assert_eq!(&first_set, &second_set);
            prop_assert_eq!(first.digest, second.digest);
            prop_assert_eq!(first.entry_count, first_set.len());
            prop_assert!(second.generation > first.generation);
            Ok(())
        })?;
    }
}
