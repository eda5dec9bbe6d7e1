//! Behaviour of the optimistic manager end to end: cache contents, status
//! transitions, timers and notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use super::{ConflictResolution, FailureOutcome, UpdateId, UpdateStats, UpdateStatus, UpdateType};
use crate::Optimist;
use crate::cache::notify::{NotificationVariant, RecordingSink};
use crate::cache::store::MemoryStore;
use crate::cache::traits::{CacheStore, QueryKey};
use crate::cache::types::{OptimistError, RecoveryHint};

struct Harness<V: Clone + Send + Sync + 'static> {
    optimist: Optimist<V>,
    store: Arc<MemoryStore<V>>,
    sink: Arc<RecordingSink>,
}

fn harness<V: Clone + Send + Sync + 'static>() -> Harness<V> {
    harness_with(|builder| builder)
}

fn harness_with<V: Clone + Send + Sync + 'static>(
    configure: impl FnOnce(crate::OptimistBuilder<V>) -> crate::OptimistBuilder<V>,
) -> Harness<V> {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::new());
    let builder = Optimist::builder().store(store.clone()).notifier(sink.clone());
    let optimist = configure(builder).build().expect("valid configuration");
    Harness {
        optimist,
        store,
        sink,
    }
}

fn key(segments: &[&str]) -> QueryKey {
    QueryKey::from(segments)
}

fn status_of<V: Clone + Send + Sync + 'static>(optimist: &Optimist<V>, id: UpdateId) -> Option<UpdateStatus> {
    optimist.get_update(id).map(|update| update.status)
}

#[tokio::test(start_paused = true)]
async fn test_unknown_id_is_silent_noop() {
    let h = harness::<i32>();
    let slot = key(&["property", "42"]);
    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);
    let before = h.optimist.get_update_stats();
    let stranger = UpdateId::generate();

    assert!(!h.optimist.confirm_update(stranger, Some(99)));
    assert!(!h.optimist.rollback_update(stranger, Some("nope")));
    assert_eq!(h.optimist.handle_update_failure(stranger, "boom"), None);

    assert_eq!(h.optimist.get_update_stats(), before);
    assert_eq!(h.store.get(&slot), Some(2));
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::Pending));
}

#[tokio::test(start_paused = true)]
async fn test_rollback_restores_exact_prior_value() {
    let h = harness::<Value>();
    let slot = key(&["property", "42"]);
    let prior = json!({"price": 100, "title": "2 bed flat, GRA"});
    h.store.set(&slot, prior.clone());

    let id = h.optimist.apply_optimistic_update(
        slot.clone(),
        |old| {
            let mut next = old.cloned().unwrap_or(Value::Null);
            next["price"] = json!(120);
            next
        },
        UpdateType::Update,
    );
    assert_eq!(h.store.get(&slot), Some(json!({"price": 120, "title": "2 bed flat, GRA"})));

    assert!(h.optimist.rollback_update(id, Some("Listing save rejected")));
    assert_eq!(h.store.get(&slot), Some(prior));
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::RolledBack));

    let last = h.sink.notifications().pop().expect("rollback notification");
    assert_eq!(last.variant, NotificationVariant::Destructive);
    assert_eq!(last.description, "Listing save rejected");
}

#[tokio::test(start_paused = true)]
async fn test_rollback_without_snapshot_invalidates() {
    let h = harness::<Value>();
    let slot = key(&["property", "new"]);

    let id = h
        .optimist
        .apply_optimistic_update(slot.clone(), |_| json!({"id": "tmp"}), UpdateType::Create);
    assert!(h.optimist.rollback_update(id, None));

    assert_eq!(h.store.get(&slot), None);
    assert!(h.store.is_invalidated(&slot));
}

#[tokio::test(start_paused = true)]
async fn test_confirm_without_server_data_keeps_optimistic_value() {
    let h = harness::<i32>();
    let slot = key(&["views"]);
    h.store.set(&slot, 10);

    let id = h
        .optimist
        .apply_optimistic_update(slot.clone(), |old| old.copied().unwrap_or(0) + 1, UpdateType::Update);
    assert!(h.optimist.confirm_update(id, None));

    assert_eq!(h.store.get(&slot), Some(11));
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::Confirmed));
}

#[tokio::test(start_paused = true)]
async fn test_confirm_with_server_data_overwrites() {
    let h = harness::<i32>();
    let slot = key(&["views"]);
    h.store.set(&slot, 10);

    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 11, UpdateType::Update);
    assert!(h.optimist.confirm_update(id, Some(14)));

    assert_eq!(h.store.get(&slot), Some(14));
}

#[tokio::test(start_paused = true)]
async fn test_bounded_retries_end_in_rollback() {
    let h = harness_with::<i32>(|b| b.max_retries(2).retry_delay(Duration::from_millis(100)));
    let slot = key(&["x"]);
    h.store.set(&slot, 1);
    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);

    assert_eq!(
        h.optimist.handle_update_failure(id, "timeout"),
        Some(FailureOutcome::Retrying {
            attempt: 1,
            max_retries: 2,
            delay: Duration::from_millis(100)
        })
    );
    assert_eq!(
        h.optimist.handle_update_failure(id, "timeout"),
        Some(FailureOutcome::Retrying {
            attempt: 2,
            max_retries: 2,
            delay: Duration::from_millis(200)
        })
    );
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::Pending));

    assert_eq!(
        h.optimist.handle_update_failure(id, "timeout"),
        Some(FailureOutcome::RolledBack { attempts: 3 })
    );
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::RolledBack));
    assert_eq!(h.store.get(&slot), Some(1));

    let notifications = h.sink.notifications();
    assert_eq!(notifications[0].description, "Attempt 1/2");
    assert_eq!(notifications[1].description, "Attempt 2/2");
    assert_eq!(notifications[2].description, "Failed after 3 attempts: timeout");
    assert_eq!(h.optimist.lifetime_stats().retried, 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_forces_rollback() {
    let h = harness_with::<i32>(|b| b.rollback_timeout(Duration::from_millis(100)));
    let slot = key(&["x"]);
    h.store.set(&slot, 1);
    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::Pending));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::RolledBack));
    assert_eq!(h.store.get(&slot), Some(1));
    assert_eq!(h.optimist.lifetime_stats().timed_out, 1);

    let last = h.sink.notifications().pop().expect("timeout notification");
    assert_eq!(last.description, "Update timed out");
}

#[tokio::test(start_paused = true)]
async fn test_confirm_disarms_timeout() {
    let h = harness_with::<i32>(|b| b.rollback_timeout(Duration::from_millis(100)));
    let slot = key(&["x"]);
    h.store.set(&slot, 1);
    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);
    assert!(h.optimist.confirm_update(id, None));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.store.get(&slot), Some(2));
    assert_eq!(h.optimist.lifetime_stats().timed_out, 0);
}

#[tokio::test(start_paused = true)]
async fn test_settled_updates_are_collected_after_delay() {
    let h = harness::<i32>();
    let slot = key(&["x"]);
    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);
    h.optimist.confirm_update(id, None);

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::Confirmed));
    assert!(h.optimist.has_pending_updates(&slot));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(status_of(&h.optimist, id), None);
    assert!(!h.optimist.has_pending_updates(&slot));
    assert_eq!(h.optimist.lifetime_stats().confirmed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_under_retry_then_success() {
    let h = harness::<Value>();
    let slot = key(&["properties"]);
    h.store.set(&slot, json!([]));
    let listing = json!({"id": "p-1", "title": "Self-contained, Rumuola", "price": 450000});

    let created = listing.clone();
    let id = h.optimist.apply_optimistic_update(
        slot.clone(),
        move |old| {
            let mut list = old.and_then(Value::as_array).cloned().unwrap_or_default();
            list.push(created);
            Value::Array(list)
        },
        UpdateType::Create,
    );
    assert_eq!(h.store.get(&slot), Some(json!([listing.clone()])));

    assert!(matches!(
        h.optimist.handle_update_failure(id, "503 Service Unavailable"),
        Some(FailureOutcome::Retrying {
            attempt: 1,
            max_retries: 3,
            ..
        })
    ));
    assert!(h.optimist.confirm_update(id, Some(json!([listing.clone()]))));

    assert_eq!(h.store.get(&slot), Some(json!([listing])));
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::Confirmed));
}

#[tokio::test(start_paused = true)]
async fn test_update_then_conflict_merge() {
    let h = harness::<Value>();
    let slot = key(&["property", "42"]);
    h.store.set(&slot, json!({"price": 100}));
    let id = h
        .optimist
        .apply_optimistic_update(slot.clone(), |_| json!({"price": 120}), UpdateType::Update);

    let merged = h.optimist.resolve_conflict(
        id,
        json!({"price": 110, "views": 5}),
        ConflictResolution::Merge(None),
    );
    assert_eq!(merged, json!({"price": 120, "views": 5}));

    // Resolution alone writes nothing.
    assert_eq!(h.store.get(&slot), Some(json!({"price": 120})));
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::Pending));

    assert!(h.optimist.confirm_update(id, Some(merged.clone())));
    assert_eq!(h.store.get(&slot), Some(merged));
}

#[tokio::test(start_paused = true)]
async fn test_manual_conflict_prompts_and_defaults_to_server() {
    let h = harness::<Value>();
    let slot = key(&["property", "42"]);
    let id = h
        .optimist
        .apply_optimistic_update(slot, |_| json!({"price": 120}), UpdateType::Update);

    let resolved = h
        .optimist
        .resolve_conflict(id, json!({"price": 110}), ConflictResolution::Manual);
    assert_eq!(resolved, json!({"price": 110}));

    let prompt = h.sink.notifications().pop().expect("manual prompt");
    assert!(prompt.is_persistent());
    assert_eq!(prompt.title, "Conflict detected");
}

#[tokio::test(start_paused = true)]
async fn test_conflict_on_unknown_id_returns_server_data() {
    let h = harness::<Value>();
    let resolved = h.optimist.resolve_conflict(
        UpdateId::generate(),
        json!({"price": 110}),
        ConflictResolution::ClientWins,
    );
    assert_eq!(resolved, json!({"price": 110}));
}

#[tokio::test(start_paused = true)]
async fn test_same_key_updates_are_last_write_wins() {
    let h = harness::<i32>();
    let slot = key(&["x"]);
    h.store.set(&slot, 1);

    let a = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);
    let b = h.optimist.apply_optimistic_update(slot.clone(), |_| 3, UpdateType::Update);
    assert_eq!(h.store.get(&slot), Some(3));

    // A restores its own snapshot, discarding B's visible value.
    assert!(h.optimist.rollback_update(a, None));
    assert_eq!(h.store.get(&slot), Some(1));

    // B then writes whatever its own settlement dictates.
    assert!(h.optimist.rollback_update(b, None));
    assert_eq!(h.store.get(&slot), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_same_key_confirm_after_foreign_rollback_keeps_slot() {
    let h = harness::<i32>();
    let slot = key(&["x"]);
    h.store.set(&slot, 1);

    let a = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);
    let b = h.optimist.apply_optimistic_update(slot.clone(), |_| 3, UpdateType::Update);
    h.optimist.rollback_update(a, None);
    h.optimist.confirm_update(b, None);

    assert_eq!(h.store.get(&slot), Some(1));
    let tracked = h.optimist.get_pending_updates(&slot);
    assert_eq!(tracked.iter().map(|u| u.id).collect::<Vec<_>>(), vec![a, b]);
}

#[tokio::test(start_paused = true)]
async fn test_settled_update_ignores_further_operations() {
    let h = harness::<i32>();
    let slot = key(&["x"]);
    h.store.set(&slot, 1);
    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);
    h.optimist.confirm_update(id, None);

    assert!(!h.optimist.rollback_update(id, None));
    assert!(!h.optimist.confirm_update(id, Some(7)));
    assert_eq!(h.optimist.handle_update_failure(id, "late"), None);
    assert_eq!(h.store.get(&slot), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_rollback_disabled() {
    let h = harness_with::<i32>(|b| b.enable_rollback(false).max_retries(1));
    let slot = key(&["x"]);
    h.store.set(&slot, 1);
    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);

    assert!(!h.optimist.rollback_update(id, None));
    assert!(matches!(
        h.optimist.handle_update_failure(id, "down"),
        Some(FailureOutcome::Retrying { attempt: 1, .. })
    ));
    assert_eq!(
        h.optimist.handle_update_failure(id, "down"),
        Some(FailureOutcome::Exhausted { attempts: 2 })
    );

    // No safety net either.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::Pending));
    assert_eq!(h.store.get(&slot), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_update_stats_partition() {
    let h = harness::<i32>();
    let a = h.optimist.apply_optimistic_update(["a"], |_| 1, UpdateType::Create);
    let b = h.optimist.apply_optimistic_update(["b"], |_| 1, UpdateType::Create);
    let _c = h.optimist.apply_optimistic_update(["c"], |_| 1, UpdateType::Create);
    h.optimist.confirm_update(a, None);
    h.optimist.rollback_update(b, None);

    assert_eq!(
        h.optimist.get_update_stats(),
        UpdateStats {
            total: 3,
            pending: 1,
            confirmed: 1,
            failed: 0,
            rolled_back: 1
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_clear_all_updates_cancels_timers() {
    let h = harness_with::<i32>(|b| b.rollback_timeout(Duration::from_millis(100)));
    let slot = key(&["x"]);
    h.store.set(&slot, 1);
    h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);
    h.optimist.apply_optimistic_update(["y"], |_| 5, UpdateType::Create);

    h.optimist.clear_all_updates();
    assert_eq!(h.optimist.get_update_stats().total, 0);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.store.get(&slot), Some(2));
    assert_eq!(h.optimist.lifetime_stats().rolled_back, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_notification_is_opt_in() {
    let quiet = harness::<i32>();
    quiet.optimist.apply_optimistic_update(["x"], |_| 1, UpdateType::Create);
    assert!(quiet.sink.is_empty());

    let loud = harness_with::<i32>(|b| b.notify_pending(true));
    loud.optimist.apply_optimistic_update(["x"], |_| 1, UpdateType::Create);
    assert_eq!(loud.sink.notifications()[0].title, "Updating...");
}

#[tokio::test(start_paused = true)]
async fn test_mutate_retries_until_success() {
    let h = harness::<Value>();
    let slot = key(&["property", "42"]);
    h.store.set(&slot, json!({"price": 100}));
    let calls = Arc::new(AtomicU32::new(0));

    let counter = calls.clone();
    let id = h
        .optimist
        .mutate(
            slot.clone(),
            |_| json!({"price": 120}),
            UpdateType::Update,
            move || {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err("connection reset")
                    } else {
                        Ok(Some(json!({"price": 120, "updated_at": "2026-10-19"})))
                    }
                }
            },
        )
        .await
        .expect("third attempt succeeds");

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::Confirmed));
    assert_eq!(
        h.store.get(&slot),
        Some(json!({"price": 120, "updated_at": "2026-10-19"}))
    );
}

#[tokio::test(start_paused = true)]
async fn test_mutate_gives_up_and_rolls_back() {
    let h = harness_with::<Value>(|b| b.max_retries(1).retry_delay(Duration::from_millis(10)));
    let slot = key(&["property", "42"]);
    h.store.set(&slot, json!({"price": 100}));

    let err = h
        .optimist
        .mutate(
            slot.clone(),
            |_| json!({"price": 120}),
            UpdateType::Update,
            || async { Err::<Option<Value>, _>("payment verification failed") },
        )
        .await
        .expect_err("always fails");

    assert!(matches!(
        err,
        OptimistError::MutationFailed { attempts: 2, ref message, .. } if message == "payment verification failed"
    ));
    assert_eq!(err.recovery_hint(), RecoveryHint::Refetch);
    assert!(err.retryable());
    assert_eq!(h.store.get(&slot), Some(json!({"price": 100})));
}

#[tokio::test(start_paused = true)]
async fn test_mutate_reports_timeout_during_flight() {
    let h = harness_with::<i32>(|b| b.rollback_timeout(Duration::from_millis(500)));
    let slot = key(&["x"]);
    h.store.set(&slot, 1);

    let err = h
        .optimist
        .mutate(slot.clone(), |_| 2, UpdateType::Update, || async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, &str>(Some(2))
        })
        .await
        .expect_err("timed out before the server answered");

    assert!(matches!(err, OptimistError::UpdateNotPending(_)));
    assert_eq!(err.recovery_hint(), RecoveryHint::Refetch);
    assert_eq!(h.store.get(&slot), Some(1));
}

#[test]
fn test_apply_without_runtime_is_total() {
    let h = harness::<i32>();
    let slot = key(&["x"]);
    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);

    assert_eq!(h.store.get(&slot), Some(2));
    assert!(h.optimist.rollback_update(id, None));
    assert_eq!(h.store.get(&slot), None);
}

#[test]
fn test_builder_rejects_invalid_configuration() {
    let result = Optimist::<i32>::builder()
        .rollback_timeout(Duration::ZERO)
        .build();
    assert!(matches!(result, Err(OptimistError::InvalidConfiguration(_))));
}

#[tokio::test(start_paused = true)]
async fn test_rolled_back_updates_are_collected_after_delay() {
    let h = harness_with::<i32>(|b| b.rollback_timeout(Duration::from_millis(100)));
    let slot = key(&["x"]);
    h.store.set(&slot, 1);
    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::RolledBack));

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::RolledBack));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(status_of(&h.optimist, id), None);
    assert_eq!(h.store.get(&slot), Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_apply_from_plain_thread_still_times_out() {
    let h = harness_with::<i32>(|b| b.rollback_timeout(Duration::from_millis(50)));
    let slot = key(&["x"]);
    h.store.set(&slot, 1);

    let optimist = h.optimist.clone();
    let target = slot.clone();
    let id = std::thread::spawn(move || {
        optimist.apply_optimistic_update(target, |_| 2, UpdateType::Update)
    })
    .join()
    .expect("apply thread");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::RolledBack));
    assert_eq!(h.store.get(&slot), Some(1));
}

#[test]
fn test_explicit_runtime_handle_drives_timers() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()
        .expect("runtime");
    let h = harness_with::<i32>(|b| {
        b.runtime(runtime.handle().clone())
            .rollback_timeout(Duration::from_millis(50))
    });
    let slot = key(&["x"]);
    h.store.set(&slot, 1);

    let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);
    runtime.block_on(async { tokio::time::sleep(Duration::from_millis(300)).await });

    assert_eq!(status_of(&h.optimist, id), Some(UpdateStatus::RolledBack));
    assert_eq!(h.store.get(&slot), Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_confirm_racing_timeout_settles_once() {
    let h = harness_with::<i32>(|b| b.rollback_timeout(Duration::from_millis(5)));

    let mut races = Vec::new();
    for i in 0..100 {
        let slot = QueryKey::new(["race".to_string(), i.to_string()]);
        h.store.set(&slot, 1);
        let id = h.optimist.apply_optimistic_update(slot.clone(), |_| 2, UpdateType::Update);

        let optimist = h.optimist.clone();
        let confirmer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            optimist.confirm_update(id, None)
        });
        races.push((slot, id, confirmer));
    }

    let mut outcomes = Vec::new();
    for (slot, id, confirmer) in races {
        let confirmed = confirmer.await.expect("confirm task");
        outcomes.push((slot, id, confirmed));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut rolled_back = 0;
    for (slot, id, confirmed) in outcomes {
        let status = status_of(&h.optimist, id).expect("still tracked before cleanup");
        if confirmed {
            assert_eq!(status, UpdateStatus::Confirmed);
            assert_eq!(h.store.get(&slot), Some(2));
        } else {
            assert_eq!(status, UpdateStatus::RolledBack);
            assert_eq!(h.store.get(&slot), Some(1));
            rolled_back += 1;
        }
    }

    let lifetime = h.optimist.lifetime_stats();
    assert_eq!(lifetime.timed_out, rolled_back);
    assert_eq!(lifetime.confirmed + lifetime.rolled_back, 100);
}

#[test]
fn test_builder_rejects_zero_cleanup_delay() {
    let result = Optimist::<i32>::builder()
        .cleanup_delay(Duration::ZERO)
        .build();
    assert!(matches!(result, Err(OptimistError::InvalidConfiguration(_))));
}

#[test]
fn test_huge_durations_saturate() {
    let h = harness_with::<i32>(|b| b.cleanup_delay(Duration::MAX));
    assert_eq!(h.optimist.config().cleanup_delay_ms, u64::MAX);
}
