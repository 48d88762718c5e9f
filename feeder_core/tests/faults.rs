mod support;

use std::cell::Cell;
use std::rc::Rc;

use feeder_core::{
    DenialReason, EmergencyCause, FaultSource, FeedOutcome, FeederError, FeedingMode, Phase,
};
use rstest::rstest;
use support::Rig;

#[rstest]
fn five_dispense_failures_latch_emergency_until_cleared() {
    let rig = Rig::new();
    let mut feeder = rig.feeder();
    feeder.tick();
    rig.servo.borrow_mut().fail_moves = true;
    rig.clock.advance_ms(6_000);

    for attempt in 1..=5 {
        match feeder.request_feed(FeedingMode::Scheduled) {
            FeedOutcome::Failed(FeederError::Hardware(msg)) => assert!(msg.contains("stuck")),
            other => panic!("attempt {attempt}: expected Failed, got {other:?}"),
        }
        assert_eq!(feeder.emergency_cause().is_some(), attempt == 5);
    }
    assert_eq!(
        feeder.emergency_cause(),
        Some(EmergencyCause::RepeatedFailures(FaultSource::Actuator))
    );
    assert_eq!(feeder.phase(), Phase::EmergencyStop);

    rig.servo.borrow_mut().fail_moves = false;
    match feeder.request_feed(FeedingMode::Scheduled) {
        FeedOutcome::Denied(DenialReason::EmergencyStop) => {}
        other => panic!("expected EmergencyStop, got {other:?}"),
    }

    feeder.clear_emergency();
    assert_eq!(feeder.phase(), Phase::Idle);
    assert!(matches!(
        feeder.request_feed(FeedingMode::Scheduled),
        FeedOutcome::Dispensed(_)
    ));
}

#[rstest]
fn success_resets_the_failure_count() {
    let rig = Rig::new();
    let mut feeder = rig.feeder();
    feeder.tick();
    rig.clock.advance_ms(6_000);

    rig.servo.borrow_mut().fail_moves = true;
    for _ in 0..4 {
        feeder.request_feed(FeedingMode::Scheduled);
    }
    rig.servo.borrow_mut().fail_moves = false;
    assert!(matches!(
        feeder.request_feed(FeedingMode::Scheduled),
        FeedOutcome::Dispensed(_)
    ));

    rig.servo.borrow_mut().fail_moves = true;
    rig.clock.advance_ms(6_000);
    for _ in 0..4 {
        feeder.request_feed(FeedingMode::Scheduled);
    }
    assert_eq!(feeder.emergency_cause(), None);
}

#[rstest]
fn unreadable_scale_latches_emergency_after_five_polls() {
    let rig = Rig::new();
    let mut feeder = rig.feeder();
    rig.inputs.borrow_mut().weights_fail = true;

    let reports = rig.run(&mut feeder, 500, 100);
    let latched: Vec<bool> = reports.iter().map(|r| r.emergency).collect();
    assert_eq!(latched, vec![false, false, false, false, true]);
    assert_eq!(
        feeder.emergency_cause(),
        Some(EmergencyCause::RepeatedFailures(FaultSource::Sensor))
    );
    assert!(!feeder.state().sensors_valid);

    // Recovery of the sensor alone does not release the latch.
    rig.inputs.borrow_mut().weights_fail = false;
    let reports = rig.run(&mut feeder, 30_000, 500);
    assert!(reports.iter().all(|r| r.emergency && r.feed.is_none()));
}

#[rstest]
fn invalid_readings_deny_feeding() {
    let rig = Rig::new();
    let mut feeder = rig.feeder();
    rig.inputs.borrow_mut().weights_fail = true;
    feeder.tick();
    rig.clock.advance_ms(6_000);
    match feeder.request_feed(FeedingMode::Scheduled) {
        FeedOutcome::Denied(DenialReason::InvalidSensorReading) => {}
        other => panic!("expected InvalidSensorReading, got {other:?}"),
    }
}

#[rstest]
fn estop_input_latches_after_debounce() {
    let rig = Rig::new();
    let pressed = Rc::new(Cell::new(true));
    let input = Rc::clone(&pressed);
    let mut feeder = rig
        .builder()
        .with_estop_debounce(2)
        .with_estop_check(move || input.get())
        .build()
        .expect("feeder build");

    assert!(!feeder.tick().emergency);
    assert!(feeder.tick().emergency);
    assert_eq!(feeder.emergency_cause(), Some(EmergencyCause::ExternalStop));

    pressed.set(false);
    feeder.clear_emergency();
    assert!(!feeder.tick().emergency);
}

#[rstest]
fn estop_bounce_does_not_trip() {
    let rig = Rig::new();
    let pattern = [true, false, true, false, true];
    let idx = Rc::new(Cell::new(0usize));
    let idx_ref = Rc::clone(&idx);
    let mut feeder = rig
        .builder()
        .with_estop_debounce(2)
        .with_estop_check(move || {
            let i = idx_ref.get();
            idx_ref.set(i + 1);
            pattern.get(i).copied().unwrap_or(false)
        })
        .build()
        .expect("feeder build");

    for _ in 0..pattern.len() {
        assert!(!feeder.tick().emergency);
    }
    assert_eq!(idx.get(), pattern.len());
}

#[rstest]
fn detached_actuator_is_denied_then_reattached_by_health_check() {
    let rig = Rig::new();
    let mut feeder = rig.feeder();
    feeder.tick();
    rig.servo.borrow_mut().attached = false;
    rig.clock.advance_ms(6_000);
    match feeder.request_feed(FeedingMode::Scheduled) {
        FeedOutcome::Denied(DenialReason::ActuatorNotReady) => {}
        other => panic!("expected ActuatorNotReady, got {other:?}"),
    }

    rig.clock.advance_ms(24_000);
    feeder.tick();
    assert!(rig.servo.borrow().attached);
}
