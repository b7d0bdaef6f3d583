//! Concurrency, race and fan-out behavior of reconciliation.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use cairn_catalog::{CatalogError, CatalogIndex, ReconcileRequest};
use cairn_test_utils::{TestContext, TracingLister, assert_single_latest, assert_versions};

#[tokio::test]
async fn concurrent_runs_on_one_key_register_once() {
    let ctx = TestContext::new();
    ctx.put("data-v=0/part-0.txt");
    ctx.put("data-v=1/part-0.txt");
    let engine = Arc::new(ctx.engine());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let key = ctx.key.clone();
            tokio::spawn(async move { engine.reconcile(&key, TestContext::STORAGE).await })
        })
        .collect();

    let mut registered = 0;
    for handle in handles {
        registered += handle.await.unwrap().unwrap().len();
    }

    assert_eq!(registered, 2);
    assert_eq!(
        ctx.index.existing_versions(&ctx.key).await.unwrap(),
        BTreeSet::from([0, 1])
    );
    assert_single_latest(ctx.index.as_ref(), &ctx.key).await;
}

#[tokio::test]
async fn reconciliation_and_pre_registration_never_share_a_version() {
    let ctx = TestContext::with_storage(TracingLister::with_latency(Duration::from_millis(5)));
    ctx.put("found-in-storage.txt");
    let engine = Arc::new(ctx.engine());
    let registration = Arc::new(ctx.registration());

    let mut handles = Vec::new();
    for i in 0..6 {
        let key = ctx.key.clone();
        if i % 2 == 0 {
            let registration = Arc::clone(&registration);
            handles.push(tokio::spawn(async move {
                registration
                    .pre_register(&key, TestContext::STORAGE)
                    .await
                    .map(|row| vec![row])
            }));
        } else {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.reconcile(&key, TestContext::STORAGE).await
            }));
        }
    }

    let mut versions = Vec::new();
    for handle in handles {
        versions.extend(handle.await.unwrap().unwrap().into_iter().map(|r| r.version));
    }
    versions.sort_unstable();

    // Three pre-registrations plus exactly one reconciled root grouping.
    assert_eq!(versions, vec![0, 1, 2, 3]);
    assert_single_latest(ctx.index.as_ref(), &ctx.key).await;
}

#[tokio::test]
async fn lost_race_surfaces_conflict_and_retry_proceeds() {
    let ctx = TestContext::new();
    ctx.put("part-0.txt");
    ctx.index.steal_next_persists(1);
    let engine = ctx.engine();

    let err = engine.reconcile(&ctx.key, TestContext::STORAGE).await.unwrap_err();
    assert!(matches!(err, CatalogError::Conflict { version: 0, .. }));
    assert!(err.is_retryable());

    let rows = engine.reconcile(&ctx.key, TestContext::STORAGE).await.unwrap();
    assert_versions(&rows, &[1]);
    assert_single_latest(ctx.index.as_ref(), &ctx.key).await;
}

#[tokio::test]
async fn conflict_inside_a_run_writes_none_of_its_versions() {
    let ctx = TestContext::new();
    ctx.put("data-v=0/part-0.txt");
    ctx.put("data-v=1/part-0.txt");
    ctx.put("data-v=2/part-0.txt");
    ctx.index.steal_version(1);
    let engine = ctx.engine();

    let err = engine.reconcile(&ctx.key, TestContext::STORAGE).await.unwrap_err();
    assert!(matches!(err, CatalogError::Conflict { version: 1, .. }));
    // Only the rival's row exists; versions 0 and 2 were not committed.
    assert_eq!(
        ctx.index.existing_versions(&ctx.key).await.unwrap(),
        BTreeSet::from([1])
    );
    assert!(ctx.index.persisted().is_empty());

    // The rival records no directory, so it accounts for data-v=1 by number.
    let rows = engine.reconcile(&ctx.key, TestContext::STORAGE).await.unwrap();
    assert_versions(&rows, &[2, 3]);
    assert_single_latest(ctx.index.as_ref(), &ctx.key).await;
}

#[tokio::test]
async fn fan_out_keeps_keys_independent_and_ordered() {
    let ctx = TestContext::new();
    let good = ctx.key_with_value("good");
    let failing = ctx.key_with_value("failing");
    let mut blank = ctx.key.clone();
    blank.partition_value = " ".into();

    ctx.put_for(&good, "part-0.txt");
    ctx.put_for(&failing, "part-0.txt");
    ctx.storage
        .inject_failure(TestContext::prefix_of(&failing).into_string());

    let outcomes = ctx
        .engine()
        .with_concurrency(2)
        .reconcile_many(vec![
            ReconcileRequest::new(good.clone(), TestContext::STORAGE),
            ReconcileRequest::new(failing.clone(), TestContext::STORAGE),
            ReconcileRequest::new(blank, TestContext::STORAGE),
            ReconcileRequest::new(good.clone(), TestContext::ARCHIVE),
        ])
        .await;

    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0].request.key, good);
    assert_versions(outcomes[0].result.as_ref().unwrap(), &[0]);
    assert!(matches!(
        outcomes[1].result,
        Err(CatalogError::StorageUnavailable { .. })
    ));
    assert!(matches!(outcomes[2].result, Err(CatalogError::Validation { .. })));
    assert!(matches!(
        outcomes[3].result,
        Err(CatalogError::UnsupportedPlatform { .. })
    ));
    assert!(ctx.index.existing_versions(&failing).await.unwrap().is_empty());
}

#[tokio::test]
async fn fan_out_timeouts_leave_the_catalog_untouched() {
    let ctx = TestContext::with_storage(TracingLister::with_latency(Duration::from_millis(300)));
    let keys: Vec<_> = ["a", "b", "c"].iter().map(|v| ctx.key_with_value(v)).collect();
    for key in &keys {
        ctx.put_for(key, "part-0.txt");
    }

    let outcomes = ctx
        .engine()
        .with_timeout(Duration::from_millis(20))
        .reconcile_many(
            keys.iter()
                .map(|k| ReconcileRequest::new(k.clone(), TestContext::STORAGE))
                .collect(),
        )
        .await;

    for (outcome, key) in outcomes.iter().zip(&keys) {
        match &outcome.result {
            Err(CatalogError::Timeout { key: timed_out, .. }) => assert_eq!(timed_out, key),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
    assert!(ctx.index.inner().is_empty());
}

#[tokio::test]
async fn fan_out_bounds_concurrency() {
    let ctx = TestContext::with_storage(TracingLister::with_latency(Duration::from_millis(50)));
    let requests: Vec<_> = (0..4)
        .map(|i| ReconcileRequest::new(ctx.key_with_value(&format!("v{i}")), TestContext::STORAGE))
        .collect();

    let started = std::time::Instant::now();
    let outcomes = ctx.engine().with_concurrency(1).reconcile_many(requests).await;
    let elapsed = started.elapsed();

    assert!(outcomes.iter().all(cairn_catalog::ReconcileOutcome::is_ok));
    assert!(elapsed >= Duration::from_millis(200), "ran in {elapsed:?}");
    assert_eq!(ctx.storage.operations().len(), 4);
}
