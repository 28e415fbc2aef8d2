//! Normalized commands, result payloads and the error taxonomy.

use crate::board_config::{Pin, PinRole};
use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Link mode reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Generic firmware executes each command as it arrives.
    #[default]
    Interactive,
    /// A compiled program has been flashed.
    Upload,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Interactive => f.write_str("interactive"),
            ConnectionMode::Upload => f.write_str("upload"),
        }
    }
}

impl FromStr for ConnectionMode {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "interactive" | "realtime" => Ok(ConnectionMode::Interactive),
            "upload" => Ok(ConnectionMode::Upload),
            _ => Err(UnknownToken(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// A menu token that matched none of the accepted spellings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized value '{0}'")]
pub struct UnknownToken(pub String);

// ---------------------------------------------------------------------------
// Menu enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
    InputPullup,
}

impl PinMode {
    fn token(self) -> &'static str {
        match self {
            PinMode::Input => "INPUT",
            PinMode::Output => "OUTPUT",
            PinMode::InputPullup => "INPUT_PULLUP",
        }
    }
}

impl FromStr for PinMode {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INPUT" => Ok(PinMode::Input),
            "OUTPUT" => Ok(PinMode::Output),
            "INPUT_PULLUP" => Ok(PinMode::InputPullup),
            _ => Err(UnknownToken(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

impl FromStr for Level {
    type Err = UnknownToken;

    /// Reporter blocks may plug a boolean or number into the level slot.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" | "1" | "TRUE" => Ok(Level::High),
            "LOW" | "0" | "FALSE" => Ok(Level::Low),
            _ => Err(UnknownToken(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptMode {
    Rising,
    Falling,
    Change,
    Low,
}

impl InterruptMode {
    fn token(self) -> &'static str {
        match self {
            InterruptMode::Rising => "RISING",
            InterruptMode::Falling => "FALLING",
            InterruptMode::Change => "CHANGE",
            InterruptMode::Low => "LOW",
        }
    }
}

impl FromStr for InterruptMode {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RISING" => Ok(InterruptMode::Rising),
            "FALLING" => Ok(InterruptMode::Falling),
            "CHANGE" => Ok(InterruptMode::Change),
            "LOW" => Ok(InterruptMode::Low),
            _ => Err(UnknownToken(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelColor {
    Black,
    White,
}

impl FromStr for PixelColor {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BLACK" => Ok(PixelColor::Black),
            "WHITE" => Ok(PixelColor::White),
            _ => Err(UnknownToken(s.to_string())),
        }
    }
}

/// Bitmaps stored in the display firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Picture {
    SmileyFace,
    Heart,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Mushroom,
    Music,
    Spaceship,
    Controller,
    Tree,
    Cup,
    Coin,
    Player1,
    Player2,
}

impl Picture {
    pub const ALL: [Picture; 15] = [
        Picture::SmileyFace,
        Picture::Heart,
        Picture::ArrowLeft,
        Picture::ArrowRight,
        Picture::ArrowUp,
        Picture::ArrowDown,
        Picture::Mushroom,
        Picture::Music,
        Picture::Spaceship,
        Picture::Controller,
        Picture::Tree,
        Picture::Cup,
        Picture::Coin,
        Picture::Player1,
        Picture::Player2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Picture::SmileyFace => "smileyFace",
            Picture::Heart => "heart",
            Picture::ArrowLeft => "arrowL",
            Picture::ArrowRight => "arrowR",
            Picture::ArrowUp => "arrowU",
            Picture::ArrowDown => "arrowD",
            Picture::Mushroom => "mushroom",
            Picture::Music => "music",
            Picture::Spaceship => "spaceship",
            Picture::Controller => "controller",
            Picture::Tree => "tree",
            Picture::Cup => "cup",
            Picture::Coin => "coin",
            Picture::Player1 => "player1",
            Picture::Player2 => "player2",
        }
    }
}

impl FromStr for Picture {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Picture::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownToken(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A validated command ready for the peripheral session. Every value in
/// here has already passed mode, capability and range checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPinMode { pin: Pin, mode: PinMode },
    DigitalWrite { pin: Pin, level: Level },
    PwmWrite { pin: Pin, duty: u8 },
    DigitalRead { pin: Pin },
    AnalogRead { pin: Pin },
    ServoWrite { pin: Pin, angle: u8 },
    /// Drive low for `settle_micros`, high for `high_micros`, then low.
    PulseOut { pin: Pin, settle_micros: u32, high_micros: u32 },
    /// Width of the next pulse at `level` in microseconds; 0 when none arrives in time.
    PulseIn { pin: Pin, level: Level, timeout_micros: u32 },
    Tone { pin: Pin, frequency_hz: f64, duration_ms: u32 },
    NoTone { pin: Pin, silence_ms: u32 },
    AttachInterrupt { pin: Pin, mode: InterruptMode },
    DetachInterrupt { pin: Pin },
    SerialBegin { baud: u32 },
    SerialPrint { text: String, newline: bool },
    SerialAvailable,
    SerialRead,
    LcdInit,
    LcdDisplay,
    LcdClear,
    LcdContrast { level: u8 },
    LcdCursor { x: u8, y: u8 },
    LcdText { text: String },
    LcdPixel { x: u8, y: u8, color: PixelColor },
    LcdPicture { x: u8, y: u8, picture: Picture, color: PixelColor },
}

impl Command {
    pub fn tag(&self) -> &'static str {
        match self {
            Command::SetPinMode { .. } => "set_pin_mode",
            Command::DigitalWrite { .. } => "digital_write",
            Command::PwmWrite { .. } => "pwm_write",
            Command::DigitalRead { .. } => "digital_read",
            Command::AnalogRead { .. } => "analog_read",
            Command::ServoWrite { .. } => "servo_write",
            Command::PulseOut { .. } => "pulse_out",
            Command::PulseIn { .. } => "pulse_in",
            Command::Tone { .. } => "tone",
            Command::NoTone { .. } => "no_tone",
            Command::AttachInterrupt { .. } => "attach_interrupt",
            Command::DetachInterrupt { .. } => "detach_interrupt",
            Command::SerialBegin { .. } => "serial_begin",
            Command::SerialPrint { .. } => "serial_print",
            Command::SerialAvailable => "serial_available",
            Command::SerialRead => "serial_read",
            Command::LcdInit => "lcd_init",
            Command::LcdDisplay => "lcd_display",
            Command::LcdClear => "lcd_clear",
            Command::LcdContrast { .. } => "lcd_contrast",
            Command::LcdCursor { .. } => "lcd_cursor",
            Command::LcdText { .. } => "lcd_text",
            Command::LcdPixel { .. } => "lcd_pixel",
            Command::LcdPicture { .. } => "lcd_picture",
        }
    }

    /// Single-line form, e.g. `digital_write D13 1`.
    pub fn to_line(&self) -> String {
        let tag = self.tag();
        let bit = |level: &Level| if *level == Level::High { 1 } else { 0 };
        let color = |c: &PixelColor| if *c == PixelColor::Black { 1 } else { 0 };
        match self {
            Command::SetPinMode { pin, mode } => format!("{} {} {}", tag, pin, mode.token()),
            Command::DigitalWrite { pin, level } => format!("{} {} {}", tag, pin, bit(level)),
            Command::PwmWrite { pin, duty } => format!("{} {} {}", tag, pin, duty),
            Command::DigitalRead { pin } | Command::AnalogRead { pin } => {
                format!("{} {}", tag, pin)
            }
            Command::ServoWrite { pin, angle } => format!("{} {} {}", tag, pin, angle),
            Command::PulseOut { pin, settle_micros, high_micros } => {
                format!("{} {} {} {}", tag, pin, settle_micros, high_micros)
            }
            Command::PulseIn { pin, level, timeout_micros } => {
                format!("{} {} {} {}", tag, pin, bit(level), timeout_micros)
            }
            Command::Tone { pin, frequency_hz, duration_ms } => {
                format!("{} {} {:.2} {}", tag, pin, frequency_hz, duration_ms)
            }
            Command::NoTone { pin, silence_ms } => format!("{} {} {}", tag, pin, silence_ms),
            Command::AttachInterrupt { pin, mode } => {
                format!("{} {} {}", tag, pin, mode.token())
            }
            Command::DetachInterrupt { pin } => format!("{} {}", tag, pin),
            Command::SerialBegin { baud } => format!("{} {}", tag, baud),
            Command::SerialPrint { text, newline } => {
                format!("{} {} {:?}", tag, if *newline { 1 } else { 0 }, text)
            }
            Command::SerialAvailable
            | Command::SerialRead
            | Command::LcdInit
            | Command::LcdDisplay
            | Command::LcdClear => tag.to_string(),
            Command::LcdContrast { level } => format!("{} {}", tag, level),
            Command::LcdCursor { x, y } => format!("{} {} {}", tag, x, y),
            Command::LcdText { text } => format!("{} {:?}", tag, text),
            Command::LcdPixel { x, y, color: c } => format!("{} {} {} {}", tag, x, y, color(c)),
            Command::LcdPicture { x, y, picture, color: c } => {
                format!("{} {} {} {} {}", tag, x, y, picture.name(), color(c))
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Value carried back by a successful operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Unit,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Payload {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Payload::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(b) => Some(*b),
            Payload::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Local validation failures. Terminal for the request and never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("pin {pin} does not support the {role} role")]
    IncompatiblePin { pin: Pin, role: PinRole },
    #[error("{operation} is not available in {mode} mode")]
    WrongMode {
        operation: Operation,
        mode: ConnectionMode,
    },
    #[error("input range is empty")]
    DivisionByZero,
    #[error("invalid range: {low} is greater than {high}")]
    InvalidRange { low: f64, high: f64 },
    #[error("cannot parse '{0}' as a number")]
    ParseError(String),
    #[error("input is empty")]
    EmptyInput,
    #[error("value {0} is out of range")]
    OutOfRange(i64),
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    #[error("missing argument {0}")]
    MissingArgument(&'static str),
    #[error("invalid value '{value}' for {name}")]
    InvalidArgument { name: &'static str, value: String },
    #[error("no {0} pin has been assigned")]
    PinNotAssigned(&'static str),
    #[error("{operation} is not supported by device {device}")]
    UnsupportedOperation {
        operation: Operation,
        device: &'static str,
    },
}

/// Failures that happen after validation passed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    #[error("no echo within {timeout_micros}us")]
    EchoTimeout { timeout_micros: u32 },
    #[error("peripheral is not connected")]
    NotConnected,
    #[error("no response to {command} within {timeout_ms}ms")]
    ResponseTimeout {
        command: &'static str,
        timeout_ms: u64,
    },
    #[error("peripheral session failed: {0}")]
    Session(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("failed: {0}")]
    Failed(#[from] Failure),
}

pub type CommandResult = Result<Payload, CommandError>;
