//! Persistence seam for settings and the event log.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::{info, warn};

use crate::event_log::{EventLog, FeedingEvent};
use crate::settings::{SettingsError, SettingsLimits, SystemSettings};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no settings stored")]
    Missing,
    #[error(transparent)]
    Invalid(#[from] SettingsError),
    #[error("storage i/o: {0}")]
    Io(String),
}

pub trait SettingsStore {
    fn save_settings(&mut self, settings: &SystemSettings) -> Result<(), StoreError>;
    fn load_settings(&mut self, limits: &SettingsLimits) -> Result<SystemSettings, StoreError>;
    fn append_event(&mut self, event: &FeedingEvent) -> Result<(), StoreError>;
    /// Replace the most recent event (consumption filled in).
    fn update_last_event(&mut self, event: &FeedingEvent) -> Result<(), StoreError>;
    /// Persisted events, oldest first.
    fn load_events(&mut self) -> Result<Vec<FeedingEvent>, StoreError>;
}

/// Shared handle, so a caller can inspect what the controller persisted.
impl<T: SettingsStore> SettingsStore for Rc<RefCell<T>> {
    fn save_settings(&mut self, settings: &SystemSettings) -> Result<(), StoreError> {
        self.borrow_mut().save_settings(settings)
    }
    fn load_settings(&mut self, limits: &SettingsLimits) -> Result<SystemSettings, StoreError> {
        self.borrow_mut().load_settings(limits)
    }
    fn append_event(&mut self, event: &FeedingEvent) -> Result<(), StoreError> {
        self.borrow_mut().append_event(event)
    }
    fn update_last_event(&mut self, event: &FeedingEvent) -> Result<(), StoreError> {
        self.borrow_mut().update_last_event(event)
    }
    fn load_events(&mut self) -> Result<Vec<FeedingEvent>, StoreError> {
        self.borrow_mut().load_events()
    }
}

/// Load settings, falling back to `defaults` on any problem.
pub fn load_or_default(
    store: &mut dyn SettingsStore,
    limits: &SettingsLimits,
    defaults: &SystemSettings,
) -> SystemSettings {
    match store.load_settings(limits) {
        Ok(s) => {
            info!(portion_g = s.default_portion_g, interval_ms = s.feeding_interval_ms, "settings restored");
            s
        }
        Err(StoreError::Missing) => {
            info!("no stored settings; using defaults");
            defaults.clone()
        }
        Err(e) => {
            warn!(error = %e, "stored settings rejected; using defaults");
            defaults.clone()
        }
    }
}

/// Volatile store; keeps the encoded record so corruption can be exercised.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Option<Vec<u8>>,
    events: EventLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw settings record, if one was saved.
    pub fn record_mut(&mut self) -> Option<&mut Vec<u8>> {
        self.record.as_mut()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }
}

impl SettingsStore for MemoryStore {
    fn save_settings(&mut self, settings: &SystemSettings) -> Result<(), StoreError> {
        self.record = Some(settings.encode()?.to_vec());
        Ok(())
    }

    fn load_settings(&mut self, limits: &SettingsLimits) -> Result<SystemSettings, StoreError> {
        let bytes = self.record.as_deref().ok_or(StoreError::Missing)?;
        Ok(SystemSettings::decode(bytes, limits)?)
    }

    fn append_event(&mut self, event: &FeedingEvent) -> Result<(), StoreError> {
        self.events.append(event.clone());
        Ok(())
    }

    fn update_last_event(&mut self, event: &FeedingEvent) -> Result<(), StoreError> {
        if let (Some(consumed), Some(duration)) = (event.consumed_g, event.eating_duration_ms) {
            self.events.complete_last(consumed, duration);
        }
        Ok(())
    }

    fn load_events(&mut self) -> Result<Vec<FeedingEvent>, StoreError> {
        Ok(self.events.iter().cloned().collect())
    }
}
