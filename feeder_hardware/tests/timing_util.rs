use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use feeder_hardware::error::HwError;
use feeder_hardware::util::{sweep, wait_until_low_with_timeout};

#[test]
fn wait_until_low_returns_once_line_drops() {
    let high = Arc::new(AtomicBool::new(true));
    let high_bg = high.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        high_bg.store(false, Ordering::Relaxed);
    });

    let res = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(200),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_until_low_times_out_on_stuck_line() {
    let err = wait_until_low_with_timeout(
        || true,
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");
    assert!(matches!(err, HwError::DataReadyTimeout), "got {err:?}");
}

#[test]
fn sweep_visits_every_degree_in_order() {
    let mut seen = Vec::new();
    sweep(3, 0, Duration::ZERO, Duration::from_secs(1), |a| {
        seen.push(a);
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, vec![2, 1, 0]);
}

#[test]
fn sweep_to_same_angle_is_a_no_op() {
    let mut calls = 0;
    sweep(45, 45, Duration::ZERO, Duration::ZERO, |_| {
        calls += 1;
        Ok(())
    })
    .unwrap();
    assert_eq!(calls, 0);
}

#[test]
fn sweep_reports_where_it_stopped() {
    let err = sweep(0, 90, Duration::from_millis(2), Duration::from_millis(10), |_| Ok(()))
        .expect_err("90 steps of 2 ms cannot finish in 10 ms");
    match err {
        HwError::MoveTimeout { target, reached } => {
            assert_eq!(target, 90);
            assert!(reached < 90);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn sweep_propagates_output_errors() {
    let err = sweep(0, 10, Duration::ZERO, Duration::from_secs(1), |a| {
        if a == 5 {
            Err(HwError::Gpio("pwm write failed".into()))
        } else {
            Ok(())
        }
    })
    .expect_err("output error");
    assert!(matches!(err, HwError::Gpio(_)));
}
