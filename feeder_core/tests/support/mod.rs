//! Fakes shared by the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;
use std::time::Duration;

use feeder_core::builder::Set;
use feeder_core::{Feeder, FeederBuilder, FeederState, MemoryStore, Screen, SensorFault, Sensors};
use feeder_traits::{Actuator, BoxError, Telemetry, TestClock};

#[derive(Debug)]
pub struct Inputs {
    pub bowl_g: f32,
    pub tank_g: f32,
    pub dial_g: u16,
    pub manual: bool,
    pub pending_presses: u32,
    pub weights_fail: bool,
    pub tares: u32,
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            bowl_g: 10.0,
            tank_g: 1500.0,
            dial_g: 40,
            manual: false,
            pending_presses: 0,
            weights_fail: false,
            tares: 0,
        }
    }
}

/// Sensors whose readings are set directly by the test.
#[derive(Clone, Default)]
pub struct FakeSensors(pub Rc<RefCell<Inputs>>);

impl Sensors for FakeSensors {
    fn read_bowl_weight(&mut self) -> Result<f32, SensorFault> {
        let i = self.0.borrow();
        if i.weights_fail {
            return Err(SensorFault::Unavailable {
                sensor: feeder_core::sensors::SensorId::Bowl,
                reason: "unplugged".into(),
            });
        }
        Ok(i.bowl_g)
    }
    fn read_tank_weight(&mut self) -> Result<f32, SensorFault> {
        Ok(self.0.borrow().tank_g)
    }
    fn read_potentiometer(&mut self) -> Result<u16, SensorFault> {
        Ok(self.0.borrow().dial_g)
    }
    fn read_feed_button(&mut self) -> bool {
        let mut i = self.0.borrow_mut();
        if i.pending_presses > 0 {
            i.pending_presses -= 1;
            true
        } else {
            false
        }
    }
    fn read_mode_switch(&mut self) -> bool {
        self.0.borrow().manual
    }
    fn tare_bowl(&mut self) -> Result<(), SensorFault> {
        self.0.borrow_mut().tares += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ServoState {
    pub attached: bool,
    pub refuse_attach: bool,
    pub fail_moves: bool,
    /// Simulated time each move takes.
    pub move_ms: u64,
    pub moves: Vec<u8>,
}

#[derive(Clone)]
pub struct FakeServo {
    pub state: Rc<RefCell<ServoState>>,
    pub clock: TestClock,
}

#[derive(Debug)]
struct Stuck;
impl std::fmt::Display for Stuck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("gate stuck")
    }
}
impl Error for Stuck {}

impl Actuator for FakeServo {
    fn attach(&mut self) -> Result<(), BoxError> {
        let mut s = self.state.borrow_mut();
        if s.refuse_attach {
            return Err(Box::new(Stuck));
        }
        s.attached = true;
        Ok(())
    }
    fn is_ready(&self) -> bool {
        self.state.borrow().attached
    }
    fn move_to(&mut self, angle_deg: u8, _timeout: Duration) -> Result<(), BoxError> {
        let mut s = self.state.borrow_mut();
        if s.fail_moves {
            return Err(Box::new(Stuck));
        }
        self.clock.advance_ms(s.move_ms);
        s.moves.push(angle_deg);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingTelemetry(pub Rc<RefCell<Vec<(String, String)>>>);

impl Telemetry for RecordingTelemetry {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BoxError> {
        self.0.borrow_mut().push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingDisplay(pub Rc<RefCell<Vec<Screen>>>);

impl feeder_core::Display for RecordingDisplay {
    fn render(&mut self, screen: &Screen, _state: &FeederState) {
        if *screen != Screen::Status {
            self.0.borrow_mut().push(screen.clone());
        }
    }
}

/// Handles onto everything a built feeder talks to.
pub struct Rig {
    pub clock: TestClock,
    pub inputs: Rc<RefCell<Inputs>>,
    pub servo: Rc<RefCell<ServoState>>,
    pub store: Rc<RefCell<MemoryStore>>,
    pub published: Rc<RefCell<Vec<(String, String)>>>,
    pub screens: Rc<RefCell<Vec<Screen>>>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            clock: TestClock::new(),
            inputs: Rc::default(),
            servo: Rc::default(),
            store: Rc::new(RefCell::new(store)),
            published: Rc::default(),
            screens: Rc::default(),
        }
    }

    pub fn builder(&self) -> FeederBuilder<Set, Set> {
        Feeder::builder()
            .with_sensors(FakeSensors(Rc::clone(&self.inputs)))
            .with_actuator(FakeServo {
                state: Rc::clone(&self.servo),
                clock: self.clock.clone(),
            })
            .with_store(Rc::clone(&self.store))
            .with_telemetry(RecordingTelemetry(Rc::clone(&self.published)))
            .with_display(RecordingDisplay(Rc::clone(&self.screens)))
            .with_clock(Box::new(self.clock.clone()))
    }

    pub fn feeder(&self) -> Feeder {
        self.builder().build().expect("feeder build")
    }

    /// Advance simulated time in `step_ms` increments, ticking after each.
    pub fn run(&self, feeder: &mut Feeder, total_ms: u64, step_ms: u64) -> Vec<feeder_core::TickReport> {
        let mut reports = Vec::new();
        let mut elapsed = 0;
        while elapsed < total_ms {
            self.clock.advance_ms(step_ms);
            elapsed += step_ms;
            reports.push(feeder.tick());
        }
        reports
    }

    pub fn topics_published(&self, topic: &str) -> Vec<String> {
        self.published
            .borrow()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}
