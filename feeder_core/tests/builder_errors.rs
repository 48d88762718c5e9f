mod support;

use feeder_core::builder::Set;
use feeder_core::error::BuildError;
use feeder_core::{ActuatorCfg, Feeder, FeederBuilder, ScheduleCfg, SystemSettings};
use rstest::rstest;
use support::{FakeSensors, Rig};

#[rstest]
fn builder_missing_actuator_yields_typed_build_error() {
    let err = Feeder::builder()
        .with_sensors(FakeSensors::default())
        .try_build()
        .expect_err("should fail with MissingActuator");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingActuator) => {}
        other => panic!("expected MissingActuator, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_sensors_yields_typed_build_error() {
    let err = Feeder::builder()
        .try_build()
        .expect_err("should fail with MissingSensors");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingSensors) => {}
        other => panic!("expected MissingSensors, got: {other:?}"),
    }
}

type Ready = FeederBuilder<Set, Set>;

fn inverted_intervals(b: Ready) -> Ready {
    b.with_schedule(ScheduleCfg {
        fastest_interval_ms: 40_000,
        slowest_interval_ms: 10_000,
        ..ScheduleCfg::default()
    })
}

fn timeout_shorter_than_hold(b: Ready) -> Ready {
    b.with_actuator_cfg(ActuatorCfg {
        dispense_timeout_ms: 300,
        ..ActuatorCfg::default()
    })
}

fn angle_beyond_servo_range(b: Ready) -> Ready {
    b.with_actuator_cfg(ActuatorCfg {
        open_max_deg: 120,
        ..ActuatorCfg::default()
    })
}

fn default_portion_out_of_range(b: Ready) -> Ready {
    b.with_defaults(SystemSettings {
        default_portion_g: 90,
        ..SystemSettings::default()
    })
}

#[rstest]
#[case(inverted_intervals, "fastest_interval_ms")]
#[case(timeout_shorter_than_hold, "dispense_timeout_ms")]
#[case(angle_beyond_servo_range, "[0, 90]")]
#[case(default_portion_out_of_range, "default settings")]
fn invalid_configuration_is_rejected(#[case] tweak: fn(Ready) -> Ready, #[case] needle: &str) {
    let rig = Rig::new();
    let err = tweak(rig.builder())
        .build()
        .expect_err("config should be rejected");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => {
            assert!(msg.contains(needle), "expected '{needle}' in '{msg}'");
        }
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[rstest]
fn build_closes_the_gate() {
    let rig = Rig::new();
    let _feeder = rig.feeder();
    let servo = rig.servo.borrow();
    assert!(servo.attached);
    assert_eq!(servo.moves, vec![0]);
}

#[rstest]
fn build_survives_actuator_that_will_not_attach() {
    let rig = Rig::new();
    rig.servo.borrow_mut().refuse_attach = true;
    let feeder = rig.feeder();
    assert!(!rig.servo.borrow().attached);
    assert_eq!(feeder.state().portion_size_g, 50);
}
