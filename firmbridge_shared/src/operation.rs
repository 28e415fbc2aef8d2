//! Block operations and the connection modes each one is legal in.

use crate::board_config::DeviceFeature;
use crate::command::ConnectionMode;
use std::fmt;

const BOTH: &[ConnectionMode] = &[ConnectionMode::Interactive, ConnectionMode::Upload];
const UPLOAD_ONLY: &[ConnectionMode] = &[ConnectionMode::Upload];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetPinMode,
    SetDigitalOutput,
    SetPwmOutput,
    ReadDigitalPin,
    ReadAnalogPin,
    SetServoOutput,
    SetPinTrigger,
    SetPinEcho,
    GetDistance,
    ReadDistance,
    SetPinBuzzer,
    SetTone,
    BendTones,
    AttachInterrupt,
    DetachInterrupt,
    SerialBegin,
    SerialPrint,
    SerialAvailable,
    SerialReadData,
    DataMap,
    DataConstrain,
    DataConvert,
    DataConvertAsciiCharacter,
    DataConvertAsciiNumber,
    LcdInitial,
    LcdDisplay,
    LcdClear,
    LcdSetContrast,
    LcdSetCursor,
    LcdWriteText,
    LcdDrawPixel,
    LcdDrawPicture,
}

impl Operation {
    pub const ALL: [Operation; 32] = [
        Operation::SetPinMode,
        Operation::SetDigitalOutput,
        Operation::SetPwmOutput,
        Operation::ReadDigitalPin,
        Operation::ReadAnalogPin,
        Operation::SetServoOutput,
        Operation::SetPinTrigger,
        Operation::SetPinEcho,
        Operation::GetDistance,
        Operation::ReadDistance,
        Operation::SetPinBuzzer,
        Operation::SetTone,
        Operation::BendTones,
        Operation::AttachInterrupt,
        Operation::DetachInterrupt,
        Operation::SerialBegin,
        Operation::SerialPrint,
        Operation::SerialAvailable,
        Operation::SerialReadData,
        Operation::DataMap,
        Operation::DataConstrain,
        Operation::DataConvert,
        Operation::DataConvertAsciiCharacter,
        Operation::DataConvertAsciiNumber,
        Operation::LcdInitial,
        Operation::LcdDisplay,
        Operation::LcdClear,
        Operation::LcdSetContrast,
        Operation::LcdSetCursor,
        Operation::LcdWriteText,
        Operation::LcdDrawPixel,
        Operation::LcdDrawPicture,
    ];

    /// The block opcode the editor sends.
    pub fn opcode(self) -> &'static str {
        match self {
            Operation::SetPinMode => "setPinMode",
            Operation::SetDigitalOutput => "setDigitalOutput",
            Operation::SetPwmOutput => "setPwmOutput",
            Operation::ReadDigitalPin => "readDigitalPin",
            Operation::ReadAnalogPin => "readAnalogPin",
            Operation::SetServoOutput => "setServoOutput",
            Operation::SetPinTrigger => "setPinTrigger",
            Operation::SetPinEcho => "setPinEcho",
            Operation::GetDistance => "getDistance",
            Operation::ReadDistance => "readDistance",
            Operation::SetPinBuzzer => "setPinBuzzer",
            Operation::SetTone => "setTone",
            Operation::BendTones => "bendTones",
            Operation::AttachInterrupt => "attachInterrupt",
            Operation::DetachInterrupt => "detachInterrupt",
            Operation::SerialBegin => "serialBegin",
            Operation::SerialPrint => "serialPrint",
            Operation::SerialAvailable => "serialAvailable",
            Operation::SerialReadData => "serialReadData",
            Operation::DataMap => "dataMap",
            Operation::DataConstrain => "dataConstrain",
            Operation::DataConvert => "dataConvert",
            Operation::DataConvertAsciiCharacter => "dataConvertASCIICharacter",
            Operation::DataConvertAsciiNumber => "dataConvertASCIINumber",
            Operation::LcdInitial => "setInitial",
            Operation::LcdDisplay => "setDisplay",
            Operation::LcdClear => "clearDisplay",
            Operation::LcdSetContrast => "setContrast",
            Operation::LcdSetCursor => "setCursor",
            Operation::LcdWriteText => "writeText",
            Operation::LcdDrawPixel => "drawPixel",
            Operation::LcdDrawPicture => "drawPicture",
        }
    }

    pub fn from_opcode(opcode: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.opcode() == opcode)
    }

    /// Serial control, interrupts and data helpers depend on flashed program
    /// logic; everything else also runs against the generic firmware.
    pub fn modes(self) -> &'static [ConnectionMode] {
        match self {
            Operation::AttachInterrupt
            | Operation::DetachInterrupt
            | Operation::SerialBegin
            | Operation::SerialPrint
            | Operation::SerialAvailable
            | Operation::SerialReadData
            | Operation::DataMap
            | Operation::DataConstrain
            | Operation::DataConvert
            | Operation::DataConvertAsciiCharacter
            | Operation::DataConvertAsciiNumber => UPLOAD_ONLY,
            _ => BOTH,
        }
    }

    pub fn is_legal_in(self, mode: ConnectionMode) -> bool {
        self.modes().contains(&mode)
    }

    /// Hardware the device kit must carry for this operation.
    pub fn required_feature(self) -> Option<DeviceFeature> {
        match self {
            Operation::LcdInitial
            | Operation::LcdDisplay
            | Operation::LcdClear
            | Operation::LcdSetContrast
            | Operation::LcdSetCursor
            | Operation::LcdWriteText
            | Operation::LcdDrawPixel
            | Operation::LcdDrawPicture => Some(DeviceFeature::Display),
            _ => None,
        }
    }

    /// Pure accessors answer from local state and never touch the link.
    pub fn needs_link(self) -> bool {
        self != Operation::ReadDistance
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode())
    }
}
