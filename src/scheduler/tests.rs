//! Tests for the recluster scheduler
//!
//! Timing tests run on tokio's paused clock so virtual windows elapse
//! deterministically without real sleeps.

use super::*;
use std::sync::atomic::AtomicU64;
use tokio::time::sleep;

fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        debounce: Duration::from_millis(100),
        cooldown: Duration::from_millis(300),
    }
}

/// Spawn the run loop with a counting job that takes `job_duration`
fn spawn_counting(
    scheduler: &Arc<ReclusterScheduler>,
    job_duration: Duration,
) -> Arc<AtomicU64> {
    let runs = Arc::new(AtomicU64::new(0));
    let runs_clone = Arc::clone(&runs);
    let sched = Arc::clone(scheduler);
    tokio::spawn(sched.run(move || {
        let runs = Arc::clone(&runs_clone);
        async move {
            sleep(job_duration).await;
            runs.fetch_add(1, Ordering::SeqCst);
        }
    }));
    runs
}

#[test]
fn test_valid_transitions() {
    use SchedulerState::*;
    assert!(Idle.can_transition_to(Pending));
    assert!(Pending.can_transition_to(Running));
    assert!(Running.can_transition_to(Pending));
    assert!(Running.can_transition_to(Cooldown));
    assert!(Cooldown.can_transition_to(Pending));
    assert!(Cooldown.can_transition_to(Idle));

    assert!(!Idle.can_transition_to(Running));
    assert!(!Pending.can_transition_to(Cooldown));
    assert!(!Running.can_transition_to(Idle));
}

#[tokio::test(start_paused = true)]
async fn test_single_request_runs_once() {
    let scheduler = ReclusterScheduler::new(test_config());
    let runs = spawn_counting(&scheduler, Duration::ZERO);

    scheduler.request();
    assert_eq!(scheduler.state(), SchedulerState::Pending);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_requests_coalesces_into_one_run() {
    let scheduler = ReclusterScheduler::new(test_config());
    let runs = spawn_counting(&scheduler, Duration::ZERO);

    for _ in 0..10 {
        scheduler.request();
    }

    sleep(Duration::from_millis(250)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_resets_debounce_timer() {
    let scheduler = ReclusterScheduler::new(test_config());
    let runs = spawn_counting(&scheduler, Duration::ZERO);

    scheduler.request();
    // A second request inside the window defers the run past the
    // original deadline
    sleep(Duration::from_millis(80)).await;
    scheduler.request();

    sleep(Duration::from_millis(60)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_requests_while_running_merge_into_one_followup() {
    let scheduler = ReclusterScheduler::new(test_config());
    let runs = spawn_counting(&scheduler, Duration::from_millis(50));

    scheduler.request();
    sleep(Duration::from_millis(120)).await;
    assert_eq!(scheduler.state(), SchedulerState::Running);

    // Many requests while the pass is running
    for _ in 0..5 {
        scheduler.request();
    }

    // One follow-up pass, not five
    sleep(Duration::from_millis(400)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // And nothing further once the follow-up has drained
    sleep(Duration::from_millis(600)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_defers_requests() {
    let scheduler = ReclusterScheduler::new(test_config());
    let runs = spawn_counting(&scheduler, Duration::ZERO);

    scheduler.request();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.state(), SchedulerState::Cooldown);

    // A request during cooldown does not start a run early...
    scheduler.request();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // ...but is honored once the cooldown lapses
    sleep(Duration::from_millis(500)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_quiet_cooldown_returns_to_idle() {
    let scheduler = ReclusterScheduler::new(test_config());
    let _runs = spawn_counting(&scheduler, Duration::ZERO);

    scheduler.request();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(scheduler.state(), SchedulerState::Cooldown);

    sleep(Duration::from_millis(400)).await;
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_completed_runs_counter_matches_job_invocations() {
    let scheduler = ReclusterScheduler::new(test_config());
    let runs = spawn_counting(&scheduler, Duration::ZERO);

    scheduler.request();
    sleep(Duration::from_millis(150)).await;

    // Full second cycle after the cooldown
    sleep(Duration::from_millis(400)).await;
    scheduler.request();
    sleep(Duration::from_millis(200)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.completed_runs(), 2);
}
