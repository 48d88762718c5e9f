//! Text command parser.
//!
//! Input is trimmed and matched case-insensitively. Lines longer than
//! `MAX_COMMAND_LEN` are rejected before parsing.

use thiserror::Error;

pub const MAX_COMMAND_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Feed,
    Sensors,
    History,
    Calibrate,
    Reset,
    Emergency,
    ClearEmergency,
    Help,
    FillTank,
    /// Feed more often.
    IncreaseRate,
    /// Feed less often.
    DecreaseRate,
    DefaultRate,
    SetPortion(u16),
    SetInterval(u64),
    SetAdaptive(bool),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("command longer than {MAX_COMMAND_LEN} characters")]
    TooLong,
    #[error("Command '{0}' not recognized. Type 'help' for available commands.")]
    NotRecognized(String),
    #[error("invalid argument for '{command}': {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.chars().count() > MAX_COMMAND_LEN {
        return Err(CommandError::TooLong);
    }
    let lower = line.to_ascii_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let cmd = match words.as_slice() {
        [] => return Err(CommandError::Empty),
        ["status"] => Command::Status,
        ["feed"] => Command::Feed,
        ["sensors"] => Command::Sensors,
        ["history"] => Command::History,
        ["calibrate"] => Command::Calibrate,
        ["reset"] => Command::Reset,
        ["emergency"] => Command::Emergency,
        ["clear", "emergency"] => Command::ClearEmergency,
        ["help"] => Command::Help,
        ["fill", "tank"] => Command::FillTank,
        ["increase"] => Command::IncreaseRate,
        ["decrease"] => Command::DecreaseRate,
        ["default"] => Command::DefaultRate,
        ["set", "portion", n] => Command::SetPortion(number("set portion", n)?),
        ["set", "interval", n] => Command::SetInterval(number("set interval", n)?),
        ["set", "adaptive", "on"] => Command::SetAdaptive(true),
        ["set", "adaptive", "off"] => Command::SetAdaptive(false),
        ["set", "adaptive", other] => {
            return Err(CommandError::InvalidArgument {
                command: "set adaptive",
                reason: format!("expected 'on' or 'off', got '{other}'"),
            });
        }
        _ => return Err(CommandError::NotRecognized(line.to_string())),
    };
    Ok(cmd)
}

fn number<T: std::str::FromStr>(command: &'static str, word: &str) -> Result<T, CommandError> {
    word.parse().map_err(|_| CommandError::InvalidArgument {
        command,
        reason: format!("'{word}' is not a number"),
    })
}

pub const HELP: &str = "\
Available commands:
  status              show feeder state
  feed                dispense one portion now
  sensors             show current sensor readings
  history             show recent feeding events
  calibrate           tare the bowl scale
  reset               reattach actuator and clear faults
  emergency           latch the emergency stop
  clear emergency     release the emergency stop
  fill tank           mark the storage tank as full
  increase            feed more often
  decrease            feed less often
  default             restore the default feeding interval
  set portion <g>     set the scheduled portion (30-75 g)
  set interval <ms>   set the feeding interval
  set adaptive on|off toggle adaptive feeding
  help                show this list";
