use feeder_core::{Calibration, SensorDevices, SensorFault, SensorHub, SensorHubCfg, Sensors};
use feeder_hardware::{SimLoadCell, SimPantry, SimPin, SimPot, Vessel};
use feeder_traits::TestClock;
use rstest::rstest;

struct Bench {
    pantry: SimPantry,
    pot: SimPot,
    button: SimPin,
    switch: SimPin,
    clock: TestClock,
    hub: SensorHub,
}

fn bench_with(cfg: SensorHubCfg) -> Bench {
    let pantry = SimPantry::new(1500.0, 2000.0);
    pantry.set_bowl_g(40.0);
    let pot = SimPot::new(512);
    let button = SimPin::new(true);
    let switch = SimPin::new(true);
    let clock = TestClock::new();
    let hub = SensorHub::with_clock(
        SensorDevices {
            bowl: Box::new(SimLoadCell::new(pantry.clone(), Vessel::Bowl)),
            tank: Box::new(SimLoadCell::new(pantry.clone(), Vessel::Tank)),
            dial: Box::new(pot.clone()),
            feed_button: Box::new(button.clone()),
            mode_switch: Box::new(switch.clone()),
        },
        &cfg,
        Box::new(clock.clone()),
    );
    Bench {
        pantry,
        pot,
        button,
        switch,
        clock,
        hub,
    }
}

fn bench() -> Bench {
    bench_with(SensorHubCfg::default())
}

#[rstest]
fn weights_follow_the_pantry() {
    let mut b = bench();
    assert!((b.hub.read_bowl_weight().unwrap() - 40.0).abs() < 0.01);
    assert!((b.hub.read_tank_weight().unwrap() - 1500.0).abs() < 0.01);

    b.pantry.set_bowl_g(0.0);
    let mut last = f32::MAX;
    for _ in 0..60 {
        last = b.hub.read_bowl_weight().unwrap();
    }
    assert!(last < 0.5, "filter should settle, got {last}");
}

#[rstest]
fn overloaded_bowl_is_a_fault() {
    let mut b = bench();
    b.pantry.set_bowl_g(900.0);
    match b.hub.read_bowl_weight() {
        Err(SensorFault::OutOfRange { .. }) => {}
        other => panic!("expected OutOfRange, got {other:?}"),
    }
}

#[rstest]
fn timed_out_cell_is_unavailable() {
    let pantry = SimPantry::new(1500.0, 2000.0);
    let cell = SimLoadCell::new(pantry.clone(), Vessel::Tank);
    let failures = cell.failure_handle();
    failures.set(1);
    let mut hub = SensorHub::with_clock(
        SensorDevices {
            bowl: Box::new(SimLoadCell::new(pantry.clone(), Vessel::Bowl)),
            tank: Box::new(cell),
            dial: Box::new(SimPot::new(0)),
            feed_button: Box::new(SimPin::new(true)),
            mode_switch: Box::new(SimPin::new(true)),
        },
        &SensorHubCfg::default(),
        Box::new(TestClock::new()),
    );
    match hub.read_tank_weight() {
        Err(SensorFault::Unavailable { reason, .. }) => assert!(reason.contains("timeout")),
        other => panic!("expected Unavailable, got {other:?}"),
    }
    assert!(hub.read_tank_weight().is_ok());
}

#[rstest]
fn calibration_is_applied() {
    let mut b = bench_with(SensorHubCfg {
        bowl_calibration: Calibration {
            gain_g_per_count: 0.02,
            zero_counts: 0,
            offset_g: 0.0,
        },
        ..SensorHubCfg::default()
    });
    // sim reports 4000 counts for 40 g at 0.01 g/count; read back at 0.02 g/count
    assert!((b.hub.read_bowl_weight().unwrap() - 80.0).abs() < 0.01);
}

#[rstest]
fn button_press_is_reported_once_after_debounce() {
    let mut b = bench();
    assert!(!b.hub.read_feed_button());

    b.button.set_high(false);
    b.clock.advance_ms(10);
    assert!(!b.hub.read_feed_button());
    b.clock.advance_ms(49);
    assert!(!b.hub.read_feed_button());
    b.clock.advance_ms(1);
    assert!(b.hub.read_feed_button());
    b.clock.advance_ms(100);
    assert!(!b.hub.read_feed_button(), "holding is not a second press");

    b.button.set_high(true);
    b.clock.advance_ms(60);
    b.hub.read_feed_button();
    b.clock.advance_ms(60);
    assert!(!b.hub.read_feed_button());
}

#[rstest]
fn short_glitch_is_not_a_press() {
    let mut b = bench();
    b.hub.read_feed_button();
    b.button.set_high(false);
    b.clock.advance_ms(20);
    b.hub.read_feed_button();
    b.button.set_high(true);
    b.clock.advance_ms(20);
    b.hub.read_feed_button();
    b.clock.advance_ms(100);
    assert!(!b.hub.read_feed_button());
}

#[rstest]
fn low_switch_selects_manual() {
    let mut b = bench();
    assert!(!b.hub.read_mode_switch());
    b.switch.set_high(false);
    b.clock.advance_ms(1);
    assert!(!b.hub.read_mode_switch(), "not yet debounced");
    b.clock.advance_ms(50);
    assert!(b.hub.read_mode_switch());
}

#[rstest]
fn dial_maps_to_portion_range() {
    let mut b = bench();
    assert_eq!(b.hub.read_potentiometer().unwrap(), 52);
    b.pot.set(1023);
    let mut p = 0;
    for _ in 0..80 {
        p = b.hub.read_potentiometer().unwrap();
    }
    assert_eq!(p, 75);
    b.pot.set(5000);
    assert!(b.hub.read_potentiometer().is_err());
}

#[rstest]
fn tare_zeroes_the_current_load() {
    let mut b = bench();
    b.hub.tare_bowl().unwrap();
    assert!(b.hub.read_bowl_weight().unwrap().abs() < 0.01);
    assert_eq!(b.hub.bowl_calibration().zero_counts, 4_000);
}
