//! Block catalog for the editor host: opcodes, argument shapes and the modes
//! each block is legal in. Pure metadata; nothing here touches a device.

use crate::request::{LCD_HEIGHT, LCD_MAX_CONTRAST, LCD_WIDTH, SERIAL_BAUD_RATES};
use firmbridge_shared::tone::notes;
use firmbridge_shared::{
    CapabilityRegistry, ConnectionMode, DeviceProfile, Operation, Picture, Pin, PinRole,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    /// Statement block with no value.
    Command,
    Reporter,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteItem {
    pub name: String,
    pub frequency_hz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArgumentShape {
    Pin { choices: Vec<Pin> },
    Number { min: Option<f64>, max: Option<f64> },
    Menu { items: Vec<String> },
    Tone { notes: Vec<NoteItem> },
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentSpec {
    pub name: &'static str,
    #[serde(flatten)]
    pub shape: ArgumentShape,
    pub default: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSpec {
    pub opcode: &'static str,
    pub block_type: BlockType,
    pub modes: Vec<ConnectionMode>,
    pub arguments: Vec<ArgumentSpec>,
}

fn arg(name: &'static str, shape: ArgumentShape, default: impl ToString) -> ArgumentSpec {
    ArgumentSpec {
        name,
        shape,
        default: default.to_string(),
    }
}

fn menu(items: &[&str]) -> ArgumentShape {
    ArgumentShape::Menu {
        items: items.iter().map(|s| s.to_string()).collect(),
    }
}

fn number(min: Option<f64>, max: Option<f64>) -> ArgumentShape {
    ArgumentShape::Number { min, max }
}

fn block_type(operation: Operation) -> BlockType {
    match operation {
        Operation::ReadDigitalPin => BlockType::Boolean,
        Operation::ReadAnalogPin
        | Operation::ReadDistance
        | Operation::SerialAvailable
        | Operation::SerialReadData
        | Operation::DataMap
        | Operation::DataConstrain
        | Operation::DataConvert
        | Operation::DataConvertAsciiCharacter
        | Operation::DataConvertAsciiNumber => BlockType::Reporter,
        _ => BlockType::Command,
    }
}

struct ShapeBuilder<'a> {
    registry: &'a CapabilityRegistry,
    notes: Vec<NoteItem>,
}

impl ShapeBuilder<'_> {
    fn pins(&self, role: PinRole) -> ArgumentShape {
        ArgumentShape::Pin {
            choices: self.registry.pins_with(role),
        }
    }

    fn tone(&self) -> ArgumentShape {
        ArgumentShape::Tone {
            notes: self.notes.clone(),
        }
    }

    fn arguments(&self, operation: Operation) -> Vec<ArgumentSpec> {
        let coordinate = |name: &'static str, size: u8, default: u8| {
            arg(name, number(Some(0.0), Some(f64::from(size - 1))), default)
        };
        let color = || arg("COLOR", menu(&["BLACK", "WHITE"]), "BLACK");
        let durations = |duration: u32, silence: u32| {
            [
                arg("DURATION", number(Some(0.0), None), duration),
                arg("SILENT", number(Some(0.0), None), silence),
            ]
        };
        match operation {
            Operation::SetPinMode => vec![
                arg("PIN", self.pins(PinRole::Digital), "D0"),
                arg("MODE", menu(&["INPUT", "OUTPUT", "INPUT_PULLUP"]), "INPUT"),
            ],
            Operation::SetDigitalOutput => vec![
                arg("PIN", self.pins(PinRole::Digital), "D0"),
                arg("LEVEL", menu(&["HIGH", "LOW"]), "HIGH"),
            ],
            Operation::SetPwmOutput => vec![
                arg("PIN", self.pins(PinRole::Pwm), "D3"),
                arg("OUT", number(Some(0.0), Some(255.0)), 255),
            ],
            Operation::ReadDigitalPin | Operation::SetPinTrigger | Operation::SetPinEcho => {
                vec![arg("PIN", self.pins(PinRole::Digital), "D0")]
            }
            Operation::SetPinBuzzer => vec![arg("PIN", self.pins(PinRole::Digital), "D13")],
            Operation::ReadAnalogPin => vec![arg("PIN", self.pins(PinRole::Analog), "A0")],
            Operation::SetServoOutput => vec![
                arg("PIN", self.pins(PinRole::Pwm), "D3"),
                arg("OUT", number(Some(0.0), Some(180.0)), 90),
            ],
            Operation::SetTone => {
                let mut args = vec![arg("TONE", self.tone(), 523.25)];
                args.extend(durations(200, 500));
                args
            }
            Operation::BendTones => {
                let mut args = vec![
                    arg("INITIALTONE", self.tone(), 16.35),
                    arg("FINALTONE", self.tone(), 4978.03),
                    arg("STEP", number(Some(0.0), None), 20),
                ];
                args.extend(durations(100, 0));
                args
            }
            Operation::AttachInterrupt => vec![
                arg("PIN", self.pins(PinRole::Interrupt), "D3"),
                arg("MODE", menu(&["RISING", "FALLING", "CHANGE", "LOW"]), "RISING"),
            ],
            Operation::DetachInterrupt => vec![arg("PIN", self.pins(PinRole::Interrupt), "D3")],
            Operation::SerialBegin => vec![arg(
                "VALUE",
                ArgumentShape::Menu {
                    items: SERIAL_BAUD_RATES.iter().map(|b| b.to_string()).collect(),
                },
                9600,
            )],
            Operation::SerialPrint => vec![
                arg("VALUE", ArgumentShape::Text, "Hello Scratch Arduino"),
                arg("EOL", menu(&["warp", "noWarp"]), "warp"),
            ],
            Operation::DataMap => vec![
                arg("DATA", number(None, None), 50),
                arg("ARG0", number(None, None), 1),
                arg("ARG1", number(None, None), 100),
                arg("ARG2", number(None, None), 1),
                arg("ARG3", number(None, None), 1000),
            ],
            Operation::DataConstrain => vec![
                arg("DATA", number(None, None), 50),
                arg("ARG0", number(None, None), 1),
                arg("ARG1", number(None, None), 100),
            ],
            Operation::DataConvert => vec![
                arg("DATA", ArgumentShape::Text, 123),
                arg("TYPE", menu(&["INTEGER", "DECIMAL", "STRING"]), "INTEGER"),
            ],
            Operation::DataConvertAsciiCharacter => {
                vec![arg("DATA", number(Some(0.0), Some(255.0)), 97)]
            }
            Operation::DataConvertAsciiNumber => vec![arg("DATA", ArgumentShape::Text, "a")],
            Operation::LcdSetContrast => vec![arg(
                "LEVEL",
                number(Some(0.0), Some(f64::from(LCD_MAX_CONTRAST))),
                40,
            )],
            Operation::LcdSetCursor => vec![
                coordinate("X", LCD_WIDTH, 0),
                coordinate("Y", LCD_HEIGHT, 0),
            ],
            Operation::LcdWriteText => vec![arg("TEXT", ArgumentShape::Text, "Hi")],
            Operation::LcdDrawPixel => vec![
                coordinate("X", LCD_WIDTH, 10),
                coordinate("Y", LCD_HEIGHT, 10),
                color(),
            ],
            Operation::LcdDrawPicture => vec![
                coordinate("X", LCD_WIDTH, 10),
                coordinate("Y", LCD_HEIGHT, 10),
                arg(
                    "PICTURE",
                    ArgumentShape::Menu {
                        items: Picture::ALL.iter().map(|p| p.name().to_string()).collect(),
                    },
                    "smileyFace",
                ),
                color(),
            ],
            Operation::GetDistance
            | Operation::ReadDistance
            | Operation::SerialAvailable
            | Operation::SerialReadData
            | Operation::LcdInitial
            | Operation::LcdDisplay
            | Operation::LcdClear => Vec::new(),
        }
    }
}

/// Blocks offered for `profile`, in menu order. Blocks that need hardware
/// the device lacks are left out.
pub fn block_catalog(profile: &DeviceProfile) -> Vec<BlockSpec> {
    let registry = profile.registry();
    let builder = ShapeBuilder {
        registry: &registry,
        notes: notes()
            .map(|(name, frequency_hz)| NoteItem { name, frequency_hz })
            .collect(),
    };
    Operation::ALL
        .into_iter()
        .filter(|op| op.required_feature().is_none_or(|f| profile.has_feature(f)))
        .map(|op| BlockSpec {
            opcode: op.opcode(),
            block_type: block_type(op),
            modes: op.modes().to_vec(),
            arguments: builder.arguments(op),
        })
        .collect()
}
