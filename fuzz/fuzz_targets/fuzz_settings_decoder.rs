#![no_main]
use feeder_core::{SettingsLimits, SystemSettings};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let limits = SettingsLimits::default();
    // Anything that decodes must re-encode to the same bytes.
    if let Ok(settings) = SystemSettings::decode(data, &limits) {
        let encoded = settings.encode().expect("decoded settings encode");
        assert_eq!(&encoded[..], &data[..encoded.len()]);
    }
});
