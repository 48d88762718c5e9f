mod support;

use feeder_core::event_log::{COMPACTION_DROP, LOG_CAPACITY};
use feeder_core::settings::{RECORD_LEN, checksum};
use feeder_core::{
    EventLog, FeedingEvent, FeedingMode, MemoryStore, SettingUpdate, SettingsError,
    SettingsLimits, SettingsStore, SystemSettings,
};
use rstest::rstest;
use support::Rig;

fn event(ts: u64) -> FeedingEvent {
    FeedingEvent {
        timestamp_ms: ts,
        mode: FeedingMode::Scheduled,
        requested_g: 50,
        bowl_before_g: 0.0,
        bowl_after_g: 50.0,
        consumed_g: None,
        eating_duration_ms: None,
    }
}

fn custom_settings() -> SystemSettings {
    SystemSettings {
        default_portion_g: 62,
        feeding_interval_ms: 32_500,
        bowl_full_threshold_g: 120.0,
        bowl_empty_threshold_g: 8.0,
        tank_low_fraction: 0.3,
        adaptive_enabled: false,
    }
}

#[rstest]
fn settings_survive_encode_and_decode() {
    let s = custom_settings();
    let bytes = s.encode().unwrap();
    assert_eq!(bytes.len(), RECORD_LEN);
    assert_eq!(
        SystemSettings::decode(&bytes, &SettingsLimits::default()).unwrap(),
        s
    );
}

#[rstest]
#[case(0, "magic")]
#[case(2, "version")]
#[case(4, "checksum")]
#[case(21, "checksum")]
#[case(22, "checksum")]
fn any_flipped_byte_is_detected(#[case] index: usize, #[case] needle: &str) {
    let mut bytes = custom_settings().encode().unwrap();
    bytes[index] ^= 0x01;
    let err = SystemSettings::decode(&bytes, &SettingsLimits::default()).unwrap_err();
    assert!(
        err.to_string().contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[rstest]
fn valid_checksum_with_bad_value_is_still_rejected() {
    let mut bytes = custom_settings().encode().unwrap();
    bytes[3..5].copy_from_slice(&200u16.to_le_bytes());
    bytes[RECORD_LEN - 1] = checksum(&bytes[..RECORD_LEN - 1]);
    match SystemSettings::decode(&bytes, &SettingsLimits::default()) {
        Err(SettingsError::OutOfRange { field, .. }) => assert_eq!(field, "default_portion_g"),
        other => panic!("expected OutOfRange, got {other:?}"),
    }
}

#[rstest]
fn truncated_record_is_rejected() {
    let bytes = custom_settings().encode().unwrap();
    assert_eq!(
        SystemSettings::decode(&bytes[..10], &SettingsLimits::default()),
        Err(SettingsError::Length(10))
    );
}

#[rstest]
fn feeder_restores_stored_settings() {
    let mut store = MemoryStore::new();
    store.save_settings(&custom_settings()).unwrap();
    let rig = Rig::with_store(store);
    let feeder = rig.feeder();
    assert_eq!(feeder.settings(), &custom_settings());
    assert_eq!(feeder.state().portion_size_g, 62);
    assert_eq!(feeder.state().feed_interval_ms, 32_500);
    assert_eq!(feeder.thresholds().bowl_full_g, 120.0);
}

#[rstest]
fn corrupted_settings_fall_back_to_defaults() {
    let mut store = MemoryStore::new();
    store.save_settings(&custom_settings()).unwrap();
    if let Some(record) = store.record_mut() {
        record[6] ^= 0xFF;
    }
    let rig = Rig::with_store(store);
    let feeder = rig.feeder();
    assert_eq!(feeder.settings(), &SystemSettings::default());
    assert_eq!(feeder.state().portion_size_g, 50);
}

#[rstest]
fn feeder_restores_history() {
    let mut store = MemoryStore::new();
    for ts in 1..=3 {
        store.append_event(&event(ts)).unwrap();
    }
    let rig = Rig::with_store(store);
    let feeder = rig.feeder();
    let ts: Vec<u64> = feeder.events().iter().map(|e| e.timestamp_ms).collect();
    assert_eq!(ts, vec![1, 2, 3]);
}

#[rstest]
fn full_log_drops_oldest_ten_then_appends() {
    let mut log = EventLog::new();
    for ts in 1..=LOG_CAPACITY as u64 {
        assert_eq!(log.append(event(ts)), 0);
    }
    assert_eq!(log.append(event(51)), COMPACTION_DROP);
    assert_eq!(log.len(), 41);
    let ts: Vec<u64> = log.iter().map(|e| e.timestamp_ms).collect();
    assert_eq!(ts, (11..=51).collect::<Vec<_>>());
}

#[rstest]
fn interval_update_respects_schedule_bounds() {
    let limits = SettingsLimits::default();
    let mut s = SystemSettings::default();
    assert!(s.apply(SettingUpdate::FeedingInterval(9_999), &limits).is_err());
    assert!(s.apply(SettingUpdate::FeedingInterval(40_001), &limits).is_err());
    s.apply(SettingUpdate::FeedingInterval(10_000), &limits).unwrap();
    assert_eq!(s.feeding_interval_ms, 10_000);
}

#[rstest]
fn events_serialize_as_json_lines() {
    let mut e = event(1234);
    e.consumed_g = Some(48.5);
    let line = serde_json::to_string(&e).unwrap();
    assert!(!line.contains('\n'));
    let back: FeedingEvent = serde_json::from_str(&line).unwrap();
    assert_eq!(back, e);
}
