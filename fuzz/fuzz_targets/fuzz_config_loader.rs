#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are both fine; panics are not.
    if let Ok(cfg) = toml::from_str::<feeder_config::Config>(data) {
        if cfg.validate().is_ok() {
            // The core re-checks defaults with its own limits when building.
            let settings = feeder_core::SystemSettings::from(&cfg.defaults);
            let schedule = feeder_core::ScheduleCfg::from(&cfg.schedule);
            let _ = settings.validate(&feeder_core::SettingsLimits::from(&schedule));
            let _ = feeder_core::SensorHubCfg::from(&cfg);
        }
    }
});
