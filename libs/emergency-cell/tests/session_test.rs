use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;

use emergency_cell::models::{DispatchError, DispatchState};
use emergency_cell::services::{DispatchSettings, Scheduler, SessionStore, VirtualScheduler};
use shared_config::{DispatchConfig, LocatorConfig};

const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

fn store() -> (Arc<VirtualScheduler>, SessionStore) {
    let scheduler = Arc::new(VirtualScheduler::new());
    // Long acceptance delay so a request is still searching when the session expires.
    let dispatch = DispatchConfig {
        acceptance_delay: Duration::from_secs(2 * 60 * 60),
        ..DispatchConfig::default()
    };
    let settings = DispatchSettings::new(&dispatch, &LocatorConfig::default());
    let store = SessionStore::new(scheduler.clone(), settings, IDLE_TIMEOUT);
    (scheduler, store)
}

#[tokio::test]
async fn test_idle_session_is_evicted_on_next_create_and_its_timers_cancelled() {
    let (scheduler, store) = store();
    let abandoned = store.create().await;
    abandoned.dispatch().request_help();
    assert_eq!(scheduler.pending(), 2);

    scheduler.advance(minutes(31));
    let fresh = store.create().await;

    assert_eq!(store.len().await, 1);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(abandoned.dispatch().state(), DispatchState::Idle);
    assert_matches!(store.get(abandoned.id).await, Err(DispatchError::SessionNotFound));
    assert!(store.get(fresh.id).await.is_ok());
}

#[tokio::test]
async fn test_lookup_keeps_a_session_alive() {
    let (scheduler, store) = store();
    let session = store.create().await;

    scheduler.advance(minutes(20));
    store.get(session.id).await.unwrap();
    assert_eq!(session.last_seen(), scheduler.now());

    scheduler.advance(minutes(20));
    store.create().await;
    assert_eq!(store.len().await, 2);

    scheduler.advance(minutes(31));
    assert_eq!(store.evict_idle().await, 2);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_nothing_is_evicted_before_the_timeout() {
    let (scheduler, store) = store();
    store.create().await;
    store.create().await;

    scheduler.advance(minutes(29));

    assert_eq!(store.evict_idle().await, 0);
    assert_eq!(store.len().await, 2);
}
