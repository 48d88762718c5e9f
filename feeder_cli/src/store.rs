//! File-backed settings record and event journal.
//!
//! `settings.bin` holds the checksummed binary record and is replaced
//! atomically. `events.jsonl` holds one event per line; appends are plain
//! appends, anything else rewrites the file from the in-memory mirror.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use feeder_core::{EventLog, FeedingEvent, SettingsLimits, SettingsStore, StoreError, SystemSettings};
use tracing::{debug, warn};

pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

fn io_err(what: &str, path: &Path, e: &io::Error) -> StoreError {
    StoreError::Io(format!("{what} {}: {e}", path.display()))
}

#[derive(Debug)]
pub struct FileStore {
    settings_path: PathBuf,
    events_path: PathBuf,
    mirror: EventLog,
}

impl FileStore {
    pub fn open(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut store = Self {
            settings_path: dir.join("settings.bin"),
            events_path: dir.join("events.jsonl"),
            mirror: EventLog::new(),
        };
        store.mirror = EventLog::from_events(store.read_journal());
        Ok(store)
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Parse the journal, skipping lines that do not decode.
    fn read_journal(&self) -> Vec<FeedingEvent> {
        let Ok(text) = fs::read_to_string(&self.events_path) else {
            return Vec::new();
        };
        text.lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .filter_map(|(n, l)| match serde_json::from_str(l) {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!(line = n + 1, error = %e, "skipping unreadable journal line");
                    None
                }
            })
            .collect()
    }

    fn rewrite_journal(&self) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        for e in self.mirror.iter() {
            serde_json::to_writer(&mut buf, e).map_err(|e| StoreError::Io(e.to_string()))?;
            buf.push(b'\n');
        }
        write_atomic(&self.events_path, &buf).map_err(|e| io_err("write", &self.events_path, &e))
    }
}

impl SettingsStore for FileStore {
    fn save_settings(&mut self, settings: &SystemSettings) -> Result<(), StoreError> {
        let record = settings.encode()?;
        write_atomic(&self.settings_path, &record)
            .map_err(|e| io_err("write", &self.settings_path, &e))?;
        debug!(path = %self.settings_path.display(), "settings saved");
        Ok(())
    }

    fn load_settings(&mut self, limits: &SettingsLimits) -> Result<SystemSettings, StoreError> {
        let bytes = match fs::read(&self.settings_path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::Missing),
            Err(e) => return Err(io_err("read", &self.settings_path, &e)),
        };
        Ok(SystemSettings::decode(&bytes, limits)?)
    }

    fn append_event(&mut self, event: &FeedingEvent) -> Result<(), StoreError> {
        if self.mirror.append(event.clone()) > 0 {
            return self.rewrite_journal();
        }
        let mut line = serde_json::to_vec(event).map_err(|e| StoreError::Io(e.to_string()))?;
        line.push(b'\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .and_then(|mut f| f.write_all(&line))
            .map_err(|e| io_err("append", &self.events_path, &e))
    }

    fn update_last_event(&mut self, event: &FeedingEvent) -> Result<(), StoreError> {
        if let (Some(consumed), Some(duration)) = (event.consumed_g, event.eating_duration_ms)
            && self.mirror.complete_last(consumed, duration).is_some()
        {
            return self.rewrite_journal();
        }
        Ok(())
    }

    fn load_events(&mut self) -> Result<Vec<FeedingEvent>, StoreError> {
        Ok(self.mirror.iter().cloned().collect())
    }
}
