//! Typed block requests parsed from editor arguments.
//!
//! The editor sends an opcode and a map of upper-case argument names to
//! strings. Parsing only checks shape (is it a pin, a number, a menu item);
//! mode and pin-role checks belong to the dispatcher.

use firmbridge_shared::command::UnknownToken;
use firmbridge_shared::numeric::DataType;
use firmbridge_shared::{
    InterruptMode, Level, Operation, Picture, Pin, PinMode, PixelColor, Rejection,
};
use std::collections::HashMap;
use std::str::FromStr;

pub type BlockArgs = HashMap<String, String>;

/// Baud rates offered by the serial block menu.
pub const SERIAL_BAUD_RATES: [u32; 7] = [4800, 9600, 19200, 38400, 57600, 76800, 115200];

/// PCD8544 geometry and contrast range.
pub const LCD_WIDTH: u8 = 84;
pub const LCD_HEIGHT: u8 = 48;
pub const LCD_MAX_CONTRAST: u8 = 127;

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SetPinMode { pin: Pin, mode: PinMode },
    SetDigitalOutput { pin: Pin, level: Level },
    /// Raw slider value; rounded and clamped to a duty cycle on dispatch.
    SetPwmOutput { pin: Pin, value: f64 },
    ReadDigitalPin { pin: Pin },
    ReadAnalogPin { pin: Pin },
    SetServoOutput { pin: Pin, angle: f64 },
    SetPinTrigger { pin: Pin },
    SetPinEcho { pin: Pin },
    GetDistance,
    ReadDistance,
    SetPinBuzzer { pin: Pin },
    SetTone {
        frequency_hz: f64,
        duration_ms: u32,
        silence_ms: u32,
    },
    BendTones {
        initial_hz: f64,
        final_hz: f64,
        step_hz: f64,
        duration_ms: u32,
        silence_ms: u32,
    },
    AttachInterrupt { pin: Pin, mode: InterruptMode },
    DetachInterrupt { pin: Pin },
    SerialBegin { baud: u32 },
    SerialPrint { text: String, newline: bool },
    SerialAvailable,
    SerialReadData,
    DataMap {
        value: f64,
        in_min: f64,
        in_max: f64,
        out_min: f64,
        out_max: f64,
    },
    DataConstrain { value: f64, low: f64, high: f64 },
    DataConvert { value: String, target: DataType },
    /// Code to character.
    DataConvertAsciiCharacter { code: f64 },
    /// Character to code.
    DataConvertAsciiNumber { text: String },
    LcdInitial,
    LcdDisplay,
    LcdClear,
    LcdSetContrast { level: u8 },
    LcdSetCursor { x: u8, y: u8 },
    LcdWriteText { text: String },
    LcdDrawPixel { x: u8, y: u8, color: PixelColor },
    LcdDrawPicture {
        x: u8,
        y: u8,
        picture: Picture,
        color: PixelColor,
    },
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::SetPinMode { .. } => Operation::SetPinMode,
            Request::SetDigitalOutput { .. } => Operation::SetDigitalOutput,
            Request::SetPwmOutput { .. } => Operation::SetPwmOutput,
            Request::ReadDigitalPin { .. } => Operation::ReadDigitalPin,
            Request::ReadAnalogPin { .. } => Operation::ReadAnalogPin,
            Request::SetServoOutput { .. } => Operation::SetServoOutput,
            Request::SetPinTrigger { .. } => Operation::SetPinTrigger,
            Request::SetPinEcho { .. } => Operation::SetPinEcho,
            Request::GetDistance => Operation::GetDistance,
            Request::ReadDistance => Operation::ReadDistance,
            Request::SetPinBuzzer { .. } => Operation::SetPinBuzzer,
            Request::SetTone { .. } => Operation::SetTone,
            Request::BendTones { .. } => Operation::BendTones,
            Request::AttachInterrupt { .. } => Operation::AttachInterrupt,
            Request::DetachInterrupt { .. } => Operation::DetachInterrupt,
            Request::SerialBegin { .. } => Operation::SerialBegin,
            Request::SerialPrint { .. } => Operation::SerialPrint,
            Request::SerialAvailable => Operation::SerialAvailable,
            Request::SerialReadData => Operation::SerialReadData,
            Request::DataMap { .. } => Operation::DataMap,
            Request::DataConstrain { .. } => Operation::DataConstrain,
            Request::DataConvert { .. } => Operation::DataConvert,
            Request::DataConvertAsciiCharacter { .. } => Operation::DataConvertAsciiCharacter,
            Request::DataConvertAsciiNumber { .. } => Operation::DataConvertAsciiNumber,
            Request::LcdInitial => Operation::LcdInitial,
            Request::LcdDisplay => Operation::LcdDisplay,
            Request::LcdClear => Operation::LcdClear,
            Request::LcdSetContrast { .. } => Operation::LcdSetContrast,
            Request::LcdSetCursor { .. } => Operation::LcdSetCursor,
            Request::LcdWriteText { .. } => Operation::LcdWriteText,
            Request::LcdDrawPixel { .. } => Operation::LcdDrawPixel,
            Request::LcdDrawPicture { .. } => Operation::LcdDrawPicture,
        }
    }

    /// The pin this request addresses, if any.
    pub fn pin(&self) -> Option<Pin> {
        match self {
            Request::SetPinMode { pin, .. }
            | Request::SetDigitalOutput { pin, .. }
            | Request::SetPwmOutput { pin, .. }
            | Request::ReadDigitalPin { pin }
            | Request::ReadAnalogPin { pin }
            | Request::SetServoOutput { pin, .. }
            | Request::SetPinTrigger { pin }
            | Request::SetPinEcho { pin }
            | Request::SetPinBuzzer { pin }
            | Request::AttachInterrupt { pin, .. }
            | Request::DetachInterrupt { pin } => Some(*pin),
            _ => None,
        }
    }

    /// Look up the opcode and parse its arguments.
    pub fn from_block(opcode: &str, args: &BlockArgs) -> Result<Self, Rejection> {
        let operation = Operation::from_opcode(opcode)
            .ok_or_else(|| Rejection::UnknownOperation(opcode.to_string()))?;
        Self::parse(operation, args)
    }

    pub fn parse(operation: Operation, args: &BlockArgs) -> Result<Self, Rejection> {
        let a = Args(args);
        let request = match operation {
            Operation::SetPinMode => Request::SetPinMode {
                pin: a.pin()?,
                mode: a.token("MODE")?,
            },
            Operation::SetDigitalOutput => Request::SetDigitalOutput {
                pin: a.pin()?,
                level: a.token("LEVEL")?,
            },
            Operation::SetPwmOutput => Request::SetPwmOutput {
                pin: a.pin()?,
                value: a.number("OUT")?,
            },
            Operation::ReadDigitalPin => Request::ReadDigitalPin { pin: a.pin()? },
            Operation::ReadAnalogPin => Request::ReadAnalogPin { pin: a.pin()? },
            Operation::SetServoOutput => Request::SetServoOutput {
                pin: a.pin()?,
                angle: a.number("OUT")?,
            },
            Operation::SetPinTrigger => Request::SetPinTrigger { pin: a.pin()? },
            Operation::SetPinEcho => Request::SetPinEcho { pin: a.pin()? },
            Operation::GetDistance => Request::GetDistance,
            Operation::ReadDistance => Request::ReadDistance,
            Operation::SetPinBuzzer => Request::SetPinBuzzer { pin: a.pin()? },
            Operation::SetTone => Request::SetTone {
                frequency_hz: a.number("TONE")?,
                duration_ms: a.duration()?,
                silence_ms: a.millis("SILENT")?,
            },
            Operation::BendTones => Request::BendTones {
                initial_hz: a.number("INITIALTONE")?,
                final_hz: a.number("FINALTONE")?,
                step_hz: a.number("STEP")?,
                duration_ms: a.duration()?,
                silence_ms: a.millis("SILENT")?,
            },
            Operation::AttachInterrupt => Request::AttachInterrupt {
                pin: a.pin()?,
                mode: a.token("MODE")?,
            },
            Operation::DetachInterrupt => Request::DetachInterrupt { pin: a.pin()? },
            Operation::SerialBegin => Request::SerialBegin { baud: a.baud()? },
            Operation::SerialPrint => Request::SerialPrint {
                text: a.text("VALUE")?.to_string(),
                newline: a.eol()?,
            },
            Operation::SerialAvailable => Request::SerialAvailable,
            Operation::SerialReadData => Request::SerialReadData,
            Operation::DataMap => Request::DataMap {
                value: a.data_number("DATA")?,
                in_min: a.data_number("ARG0")?,
                in_max: a.data_number("ARG1")?,
                out_min: a.data_number("ARG2")?,
                out_max: a.data_number("ARG3")?,
            },
            Operation::DataConstrain => Request::DataConstrain {
                value: a.data_number("DATA")?,
                low: a.data_number("ARG0")?,
                high: a.data_number("ARG1")?,
            },
            Operation::DataConvert => Request::DataConvert {
                value: a.text("DATA")?.to_string(),
                target: a.token("TYPE")?,
            },
            Operation::DataConvertAsciiCharacter => Request::DataConvertAsciiCharacter {
                code: a.data_number("DATA")?,
            },
            Operation::DataConvertAsciiNumber => Request::DataConvertAsciiNumber {
                text: a.text("DATA")?.to_string(),
            },
            Operation::LcdInitial => Request::LcdInitial,
            Operation::LcdDisplay => Request::LcdDisplay,
            Operation::LcdClear => Request::LcdClear,
            Operation::LcdSetContrast => Request::LcdSetContrast {
                level: a.byte("LEVEL", LCD_MAX_CONTRAST)?,
            },
            Operation::LcdSetCursor => Request::LcdSetCursor {
                x: a.byte("X", LCD_WIDTH - 1)?,
                y: a.byte("Y", LCD_HEIGHT - 1)?,
            },
            Operation::LcdWriteText => Request::LcdWriteText {
                text: a.text("TEXT")?.to_string(),
            },
            Operation::LcdDrawPixel => Request::LcdDrawPixel {
                x: a.byte("X", LCD_WIDTH - 1)?,
                y: a.byte("Y", LCD_HEIGHT - 1)?,
                color: a.token("COLOR")?,
            },
            Operation::LcdDrawPicture => Request::LcdDrawPicture {
                x: a.byte("X", LCD_WIDTH - 1)?,
                y: a.byte("Y", LCD_HEIGHT - 1)?,
                picture: a.token("PICTURE")?,
                color: a.token("COLOR")?,
            },
        };
        Ok(request)
    }
}

struct Args<'a>(&'a BlockArgs);

impl<'a> Args<'a> {
    fn text(&self, name: &'static str) -> Result<&'a str, Rejection> {
        self.0
            .get(name)
            .map(String::as_str)
            .ok_or(Rejection::MissingArgument(name))
    }

    fn invalid(name: &'static str, value: &str) -> Rejection {
        Rejection::InvalidArgument {
            name,
            value: value.to_string(),
        }
    }

    fn pin(&self) -> Result<Pin, Rejection> {
        self.text("PIN")?.parse()
    }

    fn token<T>(&self, name: &'static str) -> Result<T, Rejection>
    where
        T: FromStr<Err = UnknownToken>,
    {
        let raw = self.text(name)?;
        raw.parse().map_err(|_| Self::invalid(name, raw))
    }

    fn number(&self, name: &'static str) -> Result<f64, Rejection> {
        let raw = self.text(name)?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| Self::invalid(name, raw))
    }

    /// Data blocks report bad numbers the way `convert` does.
    fn data_number(&self, name: &'static str) -> Result<f64, Rejection> {
        let raw = self.text(name)?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| Rejection::ParseError(raw.to_string()))
    }

    fn millis(&self, name: &'static str) -> Result<u32, Rejection> {
        let value = self.number(name)?.round();
        if value < 0.0 || value > f64::from(u32::MAX) {
            return Err(Self::invalid(name, self.text(name)?));
        }
        Ok(value as u32)
    }

    /// The tone blocks have always spelled this argument `DRUATION`.
    fn duration(&self) -> Result<u32, Rejection> {
        if self.0.contains_key("DURATION") {
            self.millis("DURATION")
        } else if self.0.contains_key("DRUATION") {
            self.millis("DRUATION")
        } else {
            Err(Rejection::MissingArgument("DURATION"))
        }
    }

    /// Whole number in `0..=max`.
    fn byte(&self, name: &'static str, max: u8) -> Result<u8, Rejection> {
        let value = self.number(name)?.trunc();
        if value < 0.0 || value > f64::from(max) {
            return Err(Rejection::OutOfRange(value as i64));
        }
        Ok(value as u8)
    }

    fn baud(&self) -> Result<u32, Rejection> {
        let raw = self.text("VALUE")?;
        raw.trim()
            .parse::<u32>()
            .ok()
            .filter(|b| SERIAL_BAUD_RATES.contains(b))
            .ok_or_else(|| Self::invalid("VALUE", raw))
    }

    fn eol(&self) -> Result<bool, Rejection> {
        let raw = self.text("EOL")?;
        match raw.trim() {
            "warp" => Ok(true),
            "noWarp" => Ok(false),
            _ => Err(Self::invalid("EOL", raw)),
        }
    }
}
