use feeder_config::load_toml;
use rstest::rstest;

#[rstest]
#[case("[schedule]\nfastest_interval_ms = 40000\nslowest_interval_ms = 10000\n", "fastest_interval_ms must be <")]
#[case("[schedule]\nfastest_interval_ms = 20000\nslowest_interval_ms = 20000\n", "fastest_interval_ms must be <")]
#[case("[defaults]\ndefault_portion_g = 80\n", "default_portion_g must be in [30, 75]")]
#[case("[defaults]\nfeeding_interval_ms = 5000\n", "feeding_interval_ms must be within")]
#[case("[defaults]\nbowl_empty_threshold_g = 90.0\n", "bowl_empty_threshold_g")]
#[case("[defaults]\ntank_low_fraction = 1.5\n", "tank_low_fraction")]
#[case("[filter]\nweight_alpha = 1.0\n", "filter.weight_alpha")]
#[case("[filter]\ndebounce_ms = 0\n", "filter.debounce_ms")]
#[case("[actuator]\nopen_max_deg = 120\n", "within [0, 90]")]
#[case("[actuator]\nopen_min_deg = 80\nopen_max_deg = 60\n", "open_min_deg must be <=")]
#[case("[actuator]\ndispense_timeout_ms = 400\n", "dispense_timeout_ms must exceed")]
#[case("[safety]\nmax_consecutive_failures = 0\n", "max_consecutive_failures")]
#[case("[schedule]\nday_length_ms = 10\n", "day_length_ms")]
#[case("[estop]\ndebounce_n = 0\n", "estop.debounce_n")]
#[case("[telemetry]\nenabled = true\ntopic_prefix = \" \"\n", "topic_prefix")]
#[case("[calibration.bowl]\ngain_g_per_count = 0.0\nzero_counts = 10\n", "calibration.bowl.gain_g_per_count")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("config should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[rstest]
fn accepts_a_full_config() {
    let toml = r#"
[pins]
bowl_dt = 5
bowl_sck = 6
tank_dt = 20
tank_sck = 21
servo = 18
feed_button = 17
mode_switch = 27
pot_channel = 0
estop_in = 22

[filter]
weight_alpha = 0.85
pot_alpha = 0.9
pot_hysteresis_g = 2
debounce_ms = 50
adc_max = 1023

[actuator]
closed_deg = 0
open_min_deg = 30
open_max_deg = 90
hold_min_ms = 200
hold_max_ms = 500
dispense_timeout_ms = 4000

[safety]
min_feed_gap_ms = 5000
max_consecutive_failures = 5
sensor_timeout_ms = 10000

[schedule]
day_length_ms = 120000
fastest_interval_ms = 10000
slowest_interval_ms = 40000
interval_step_ms = 2500

[defaults]
default_portion_g = 50
feeding_interval_ms = 20000
bowl_full_threshold_g = 80.0
bowl_empty_threshold_g = 5.0
tank_low_fraction = 0.25
adaptive_enabled = true

[telemetry]
enabled = true
topic_prefix = "catfeeder"

[calibration.tank]
gain_g_per_count = 0.01
zero_counts = 8000
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.pins.estop_in, Some(22));
    let tank = cfg.calibration.tank.expect("tank calibration");
    assert_eq!(tank.zero_counts, 8_000);
    assert_eq!(tank.offset_g, 0.0);
}

#[rstest]
fn rejects_wrong_types_at_parse_time() {
    let err = load_toml("[defaults]\nadaptive_enabled = \"yes\"\n").expect_err("type mismatch");
    assert!(format!("{err}").contains("adaptive_enabled"));
}
