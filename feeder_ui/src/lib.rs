#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Text rendering of feeder screens for a small character display.
//!
//! Frames are at most [`ROWS`] lines of [`COLS`] characters, the text grid of
//! a 128x64 OLED at the smallest font. The status screen rotates through a
//! few pages, one page per refresh.

use std::io::Write;
use std::time::Instant;

use feeder_core::{Display, FeederState, FeedingMode, Screen};
use feeder_traits::{Clock, MonotonicClock};
use tracing::warn;

pub const COLS: usize = 21;
pub const ROWS: usize = 8;

/// Pages shown in turn on the periodic status screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPage {
    Overview,
    Levels,
    Schedule,
}

impl StatusPage {
    const ALL: [Self; 3] = [Self::Overview, Self::Levels, Self::Schedule];

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

/// `hh:mm:ss` for a millisecond count, wrapping at 24 h.
pub fn format_clock(ms: u64) -> String {
    let s = ms / 1000;
    format!("{:02}:{:02}:{:02}", (s / 3600) % 24, (s / 60) % 60, s % 60)
}

/// Compact duration: `42s`, `3m 5s`, `2h 10m`, `1d 4h`.
pub fn format_span(ms: u64) -> String {
    let s = ms / 1000;
    let (m, h, d) = (s / 60, s / 3600, s / 86_400);
    if d > 0 {
        format!("{d}d {}h", h % 24)
    } else if h > 0 {
        format!("{h}h {}m", m % 60)
    } else if m > 0 {
        format!("{m}m {}s", s % 60)
    } else {
        format!("{s}s")
    }
}

fn bar(value: f32, full: f32, width: usize) -> String {
    let ratio = if full > 0.0 {
        (value / full).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * width as f32).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

fn mode_label(mode: FeedingMode) -> &'static str {
    match mode {
        FeedingMode::Scheduled => "SCHEDULED",
        FeedingMode::Manual => "MANUAL",
    }
}

/// Context a frame is rendered in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Only used by [`Screen::Status`].
    pub page: StatusPage,
    pub now_ms: u64,
    pub tank_capacity_g: f32,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            page: StatusPage::Overview,
            now_ms: 0,
            tank_capacity_g: 2000.0,
        }
    }
}

fn status_page(frame: &Frame, s: &FeederState) -> Vec<String> {
    let now_ms = frame.now_ms;
    match frame.page {
        StatusPage::Overview => vec![
            "SMART CAT FEEDER".into(),
            format!("Mode: {}", mode_label(s.mode)),
            format!("Portion: {} g", portion_for(s)),
            format!("Feeds today: {}", s.feed_events_today),
            format!("Day {}", s.day_cycle),
            if s.sensors_valid {
                String::new()
            } else {
                "SENSORS INVALID".into()
            },
        ],
        StatusPage::Levels => vec![
            "FOOD LEVELS".into(),
            format!("Bowl {:>6.1} g", s.bowl_level_g),
            if s.bowl_is_full { "  (full)".into() } else { String::new() },
            format!("Tank {:>6.1} g", s.tank_level_g),
            bar(s.tank_level_g, frame.tank_capacity_g, 10),
            if s.tank_low { "  REFILL TANK".into() } else { String::new() },
        ],
        StatusPage::Schedule => {
            let next = match s.mode {
                FeedingMode::Scheduled => format_span(s.ms_until_next_feed(now_ms)),
                FeedingMode::Manual => "press button".into(),
            };
            vec![
                "FEEDING SCHEDULE".into(),
                format!("Every {}", format_span(s.feed_interval_ms)),
                format!("Next: {next}"),
                format!("Uptime {}", format_span(now_ms)),
                format!("Clock {}", format_clock(now_ms)),
            ]
        }
    }
}

fn portion_for(s: &FeederState) -> u16 {
    match s.mode {
        FeedingMode::Scheduled => s.portion_size_g,
        FeedingMode::Manual => s.dial_portion_g,
    }
}

/// Lines for one screen, wrapped to the grid.
pub fn render_lines(screen: &Screen, state: &FeederState, frame: &Frame) -> Vec<String> {
    let lines = match screen {
        Screen::Status => status_page(frame, state),
        Screen::Dispensing { portion_g } => {
            vec!["DISPENSING".into(), format!("{portion_g} g ...")]
        }
        Screen::Dispensed { portion_g } => vec![
            "FEEDING DONE".into(),
            format!("{portion_g} g dispensed"),
            format!("Bowl {:.1} g", state.bowl_level_g),
        ],
        Screen::Denied(reason) => vec!["FEED DENIED".into(), reason.to_string()],
        Screen::Failure(msg) => vec!["FEED FAILED".into(), msg.clone()],
        Screen::LowFood { tank_g } => vec![
            "LOW FOOD".into(),
            format!("Tank {tank_g:.0} g"),
            "Please refill".into(),
        ],
        Screen::Alert(alert) => vec!["HEALTH ALERT".into(), alert.to_string()],
        Screen::Emergency(cause) => vec![
            "!! EMERGENCY STOP !!".into(),
            cause.to_string(),
            "Feeding disabled".into(),
        ],
        Screen::DayComplete { day, feeds } => vec![
            format!("DAY {day} COMPLETE"),
            format!("{feeds} feeds"),
        ],
    };
    fit(lines)
}

/// Word-wrap to the grid and drop whatever does not fit.
fn fit(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(ROWS);
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            let mut word = word.to_string();
            while word.chars().count() > COLS {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                let head: String = word.chars().take(COLS).collect();
                word = word.chars().skip(COLS).collect();
                out.push(head);
            }
            let needed =
                current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
            if needed > COLS {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out.truncate(ROWS);
    out
}

/// Writes each changed frame to `W`, boxed by rule lines.
///
/// The clock should share its epoch with the feeder's so uptime and
/// next-feed countdowns line up with the state timestamps.
pub struct TextDisplay<W: Write> {
    out: W,
    clock: Box<dyn Clock + Send + Sync>,
    epoch: Instant,
    page: StatusPage,
    tank_capacity_g: f32,
    last_frame: Vec<String>,
    frames: u64,
}

impl<W: Write> TextDisplay<W> {
    pub fn new(out: W) -> Self {
        Self::with_clock(out, Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(out: W, clock: Box<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        Self {
            out,
            clock,
            epoch,
            page: StatusPage::Overview,
            tank_capacity_g: Frame::default().tank_capacity_g,
            last_frame: Vec::new(),
            frames: 0,
        }
    }

    #[must_use]
    pub fn with_tank_capacity(mut self, grams: f32) -> Self {
        self.tank_capacity_g = grams;
        self
    }

    /// Frames actually written.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_frame(&mut self, lines: &[String]) -> std::io::Result<()> {
        writeln!(self.out, "+{}+", "-".repeat(COLS))?;
        for line in lines {
            writeln!(self.out, "|{line:<COLS$}|")?;
        }
        writeln!(self.out, "+{}+", "-".repeat(COLS))?;
        self.out.flush()
    }
}

impl<W: Write> Display for TextDisplay<W> {
    fn render(&mut self, screen: &Screen, state: &FeederState) {
        let frame = Frame {
            page: self.page,
            now_ms: self.clock.ms_since(self.epoch),
            tank_capacity_g: self.tank_capacity_g,
        };
        let lines = render_lines(screen, state, &frame);
        if matches!(screen, Screen::Status) {
            self.page = self.page.next();
        }
        if lines == self.last_frame {
            return;
        }
        if let Err(e) = self.write_frame(&lines) {
            warn!(error = %e, "display write failed");
            return;
        }
        self.frames += 1;
        self.last_frame = lines;
    }
}
