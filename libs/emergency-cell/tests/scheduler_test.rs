use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use emergency_cell::models::DispatchState;
use emergency_cell::services::{DispatchSettings, DispatchStateMachine, Scheduler, TokioScheduler};
use shared_config::{DispatchConfig, LocatorConfig};

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let read = {
        let count = count.clone();
        move || count.load(Ordering::SeqCst)
    };
    (count, read)
}

#[test]
fn test_from_current_requires_a_runtime() {
    assert!(TokioScheduler::from_current().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_one_shot_fires_after_delay() {
    let scheduler = TokioScheduler::from_current().unwrap();
    let (count, fired) = counter();

    scheduler.schedule_once(
        Duration::from_secs(10),
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(scheduler.pending(), 1);

    sleep(Duration::from_secs(9)).await;
    assert_eq!(fired(), 0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(fired(), 1);
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_one_shot_never_runs() {
    let scheduler = TokioScheduler::from_current().unwrap();
    let (count, fired) = counter();

    let id = scheduler.schedule_once(
        Duration::from_secs(5),
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }),
    );
    scheduler.cancel(id);
    scheduler.cancel(id);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(fired(), 0);
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_repeating_timer_ticks_each_period_until_cancelled() {
    let scheduler = TokioScheduler::from_current().unwrap();
    let (count, ticks) = counter();

    let id = scheduler.schedule_repeating(
        Duration::from_secs(3),
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }),
    );

    sleep(Duration::from_secs(2)).await;
    assert_eq!(ticks(), 0);

    sleep(Duration::from_secs(8)).await;
    assert_eq!(ticks(), 3);

    scheduler.cancel(id);
    sleep(Duration::from_secs(30)).await;
    assert_eq!(ticks(), 3);
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_scheduler_aborts_timers() {
    let scheduler = TokioScheduler::from_current().unwrap();
    let (count, fired) = counter();

    scheduler.schedule_once(
        Duration::from_secs(1),
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }),
    );
    drop(scheduler);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(fired(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_on_wall_clock_scheduler_accepts_after_delay() {
    let scheduler = Arc::new(TokioScheduler::from_current().unwrap());
    let settings = DispatchSettings::new(&DispatchConfig::default(), &LocatorConfig::default());
    let machine = DispatchStateMachine::new(scheduler.clone(), settings);
    let mut updates = machine.subscribe();

    machine.request_help();
    updates.borrow_and_update();

    let mut states = Vec::new();
    while states.last() != Some(&DispatchState::Accepted) {
        updates.changed().await.unwrap();
        states.push(updates.borrow_and_update().state);
    }

    // Three rotations at 3s, 6s and 9s, then acceptance at 10s.
    assert_eq!(
        states,
        vec![
            DispatchState::Searching,
            DispatchState::Searching,
            DispatchState::Searching,
            DispatchState::Accepted,
        ]
    );
    assert_eq!(machine.snapshot().eta_minutes, Some(4));
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dismissed_request_ignores_stale_acceptance() {
    let scheduler = Arc::new(TokioScheduler::from_current().unwrap());
    let settings = DispatchSettings::new(&DispatchConfig::default(), &LocatorConfig::default());
    let machine = DispatchStateMachine::new(scheduler.clone(), settings);

    machine.request_help();
    sleep(Duration::from_secs(4)).await;
    machine.teardown();

    sleep(Duration::from_secs(20)).await;
    assert_eq!(machine.state(), DispatchState::Idle);
    assert_eq!(scheduler.pending(), 0);
}
