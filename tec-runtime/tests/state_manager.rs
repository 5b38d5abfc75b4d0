use std::time::{Duration, Instant};
use tec_runtime::{PowerPhase, RunState, RunStatus};

#[test]
fn test_new() {
    let now = Instant::now();
    let state = RunState::new(4, 3, Some(10), now);
    assert_eq!(state.cycle, 4);
    assert_eq!(state.phase, PowerPhase::Off);
    assert_eq!(state.last_transition, now);
    assert!(state.is_empty());
    assert_eq!(state.temperatures().len(), 3);
    assert_eq!(state.max_points(), Some(10));
}

#[test]
fn test_elapsed_steps_by_sample_period() {
    let mut state = RunState::new(0, 2, None, Instant::now());
    for _ in 0..4 {
        state.push_sample(3, &[20.0, 21.0]);
    }
    assert_eq!(state.elapsed().iter().copied().collect::<Vec<_>>(), vec![0, 3, 6, 9]);
    assert!(state.temperatures().iter().all(|series| series.len() == 4));
}

#[test]
fn test_eviction_drops_oldest_everywhere() {
    let mut state = RunState::new(0, 2, Some(3), Instant::now());
    for i in 0..5u32 {
        let value = f64::from(i);
        state.push_sample(1, &[value, value * 10.0]);
        assert_eq!(state.len(), state.temperatures()[0].len());
        assert_eq!(state.len(), state.temperatures()[1].len());
    }
    assert_eq!(state.len(), 3);
    assert_eq!(state.elapsed().iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    assert_eq!(
        state.temperatures()[1].iter().copied().collect::<Vec<_>>(),
        vec![20.0, 30.0, 40.0]
    );
}

#[test]
fn test_window_is_at_least_one_point() {
    let mut state = RunState::new(0, 1, Some(0), Instant::now());
    assert_eq!(state.max_points(), Some(1));
    state.push_sample(1, &[1.0]);
    state.push_sample(1, &[2.0]);
    assert_eq!(state.elapsed().iter().copied().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_transition_resets_phase_timer() {
    let t0 = Instant::now();
    let mut state = RunState::new(0, 1, None, t0);
    assert_eq!(state.time_in_phase(t0 + Duration::from_secs(4)), Duration::from_secs(4));

    state.transition(PowerPhase::On, t0 + Duration::from_secs(5));
    assert_eq!(state.phase, PowerPhase::On);
    assert_eq!(state.time_in_phase(t0 + Duration::from_secs(7)), Duration::from_secs(2));
    assert_eq!(state.time_in_phase(t0), Duration::ZERO);
}

#[test]
fn test_status_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&RunStatus::Complete).unwrap(), "\"complete\"");
    assert_eq!(serde_json::to_string(&PowerPhase::On).unwrap(), "\"on\"");
    assert!(RunStatus::Stopped.is_finished());
    assert!(!RunStatus::Running.is_finished());
    assert!(!RunStatus::Idle.is_finished());
}
