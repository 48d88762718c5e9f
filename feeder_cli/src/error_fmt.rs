//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use feeder_core::error::{BuildError, FeederError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensors => {
                "What happened: No sensors were provided to the feeder.\nLikely causes: The sensor hub failed to initialize or was not wired into the builder.\nHow to fix: Ensure the load cells and inputs open successfully and are passed via with_sensors(...).".to_string()
            }
            BuildError::MissingActuator => {
                "What happened: No gate actuator was provided to the feeder.\nLikely causes: Servo driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the servo is created successfully and passed via with_actuator(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/feeder_config.toml for a sample."
            ),
        };
    }

    if let Some(fe) = err.downcast_ref::<FeederError>() {
        if matches!(fe, FeederError::Timeout) {
            return "What happened: A device did not answer in time.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing hardware.sensor_read_timeout_ms in the config.".to_string();
        }
        return format!(
            "What happened: {fe}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML.\nDetails: {}\nHow to fix: Correct the syntax or remove the offending key.",
            te.message()
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid.\nDetails: {msg}\nHow to fix: Edit the TOML config and try again."
        );
    }

    if (lower.contains("hx711") && lower.contains("timeout")) || lower.contains("data-ready timeout")
    {
        return "What happened: HX711 did not produce data within the configured timeout.\nLikely causes: Wrong DT/SCK pins, wiring/power issues, or timeout configured too low.\nHow to fix: Check [pins] in the config, verify 5V/GND, and raise hardware.sensor_read_timeout_ms.".to_string();
    }

    if lower.contains("open bowl hx711")
        || lower.contains("open tank hx711")
        || (lower.contains("pin") && lower.contains("open"))
    {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'raw,grams'.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration problems, 3 for hardware, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use feeder_core::error::{BuildError, FeederError};
    if err.downcast_ref::<BuildError>().is_some() || err.downcast_ref::<toml::de::Error>().is_some()
    {
        return 2;
    }
    if format!("{err:#}").to_ascii_lowercase().contains("invalid configuration") {
        return 2;
    }
    match err.downcast_ref::<FeederError>() {
        Some(FeederError::Hardware(_) | FeederError::HardwareFault(_) | FeederError::Timeout) => 3,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({
        "reason": "Error",
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
