//! Board abstraction and pin capability tables (shared)
//!
//! Capability differences between devices are data, not types: a device
//! profile points at a board variant, and a board variant is a static table
//! of pins and the roles each pin can take. Adding a board means adding a
//! table entry.

use crate::command::Rejection;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// A physical pin on the board header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pin {
    Digital(u8),
    Analog(u8),
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pin::Digital(n) => write!(f, "D{}", n),
            Pin::Analog(n) => write!(f, "A{}", n),
        }
    }
}

impl Serialize for Pin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Accepts `D13`, `13` and `A0`, case-insensitive.
impl FromStr for Pin {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || Rejection::InvalidArgument {
            name: "PIN",
            value: s.to_string(),
        };
        let (analog, digits) = match trimmed.chars().next() {
            Some('A') | Some('a') => (true, &trimmed[1..]),
            Some('D') | Some('d') => (false, &trimmed[1..]),
            Some(_) => (false, trimmed),
            None => return Err(invalid()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let index: u8 = digits.parse().map_err(|_| invalid())?;
        Ok(if analog { Pin::Analog(index) } else { Pin::Digital(index) })
    }
}

/// What a pin can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinRole {
    Digital,
    Analog,
    Pwm,
    Interrupt,
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PinRole::Digital => "digital",
            PinRole::Analog => "analog",
            PinRole::Pwm => "pwm",
            PinRole::Interrupt => "interrupt",
        };
        f.write_str(name)
    }
}

/// Optional hardware attached to a device kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFeature {
    /// PCD8544 84x48 monochrome LCD (Nokia 5110 module).
    Display,
}

/// A microcontroller pin layout.
#[derive(Debug)]
pub struct BoardVariant {
    pub name: &'static str,
    pub pins: &'static [(Pin, &'static [PinRole])],
}

/// Serial frame the transport opens the link with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SerialFrame {
    pub baud: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
}

/// Everything known statically about one supported device.
#[derive(Debug, Serialize)]
pub struct DeviceProfile {
    pub id: &'static str,
    /// USB PnP filters the transport discovers the device by.
    pub usb_ids: &'static [&'static str],
    pub serial: SerialFrame,
    pub fqbn: &'static str,
    pub firmware: &'static str,
    #[serde(skip)]
    pub board: &'static BoardVariant,
    pub features: &'static [DeviceFeature],
}

impl DeviceProfile {
    pub fn has_feature(&self, feature: DeviceFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn registry(&self) -> CapabilityRegistry {
        CapabilityRegistry::from_variant(self.board)
    }
}

// ---------------------------------------------------------------------------
// Built-in tables
// ---------------------------------------------------------------------------

const DIGITAL: &[PinRole] = &[PinRole::Digital];
const DIGITAL_PWM: &[PinRole] = &[PinRole::Digital, PinRole::Pwm];
const DIGITAL_INTERRUPT: &[PinRole] = &[PinRole::Digital, PinRole::Interrupt];
const DIGITAL_PWM_INTERRUPT: &[PinRole] = &[PinRole::Digital, PinRole::Pwm, PinRole::Interrupt];
const ANALOG: &[PinRole] = &[PinRole::Digital, PinRole::Analog];

/// ATmega328 Nano header: D0-D13 plus A0-A5.
pub const NANO_ATMEGA328: BoardVariant = BoardVariant {
    name: "nano-atmega328",
    pins: &[
        (Pin::Digital(0), DIGITAL),
        (Pin::Digital(1), DIGITAL),
        (Pin::Digital(2), DIGITAL_INTERRUPT),
        (Pin::Digital(3), DIGITAL_PWM_INTERRUPT),
        (Pin::Digital(4), DIGITAL),
        (Pin::Digital(5), DIGITAL_PWM),
        (Pin::Digital(6), DIGITAL_PWM),
        (Pin::Digital(7), DIGITAL),
        (Pin::Digital(8), DIGITAL),
        (Pin::Digital(9), DIGITAL_PWM),
        (Pin::Digital(10), DIGITAL_PWM),
        (Pin::Digital(11), DIGITAL_PWM),
        (Pin::Digital(12), DIGITAL),
        (Pin::Digital(13), DIGITAL),
        (Pin::Analog(0), ANALOG),
        (Pin::Analog(1), ANALOG),
        (Pin::Analog(2), ANALOG),
        (Pin::Analog(3), ANALOG),
        (Pin::Analog(4), ANALOG),
        (Pin::Analog(5), ANALOG),
    ],
};

const FIRMATA_FRAME: SerialFrame = SerialFrame {
    baud: 57_600,
    data_bits: 8,
    stop_bits: 1,
};

pub const ARDUINO_NANO: DeviceProfile = DeviceProfile {
    id: "arduinoNano",
    // CH340
    usb_ids: &["USB\\VID_1A86&PID_7523"],
    serial: FIRMATA_FRAME,
    fqbn: "arduino:avr:nano:cpu=atmega328",
    firmware: "arduinoNano.standardFirmata.ino.hex",
    board: &NANO_ATMEGA328,
    features: &[],
};

pub const NOKIA_5110_KIT: DeviceProfile = DeviceProfile {
    id: "nokia5110",
    usb_ids: &[
        "USB\\VID_2341&PID_0043",
        "USB\\VID_2341&PID_0001",
        "USB\\VID_2A03&PID_0043",
        "USB\\VID_2341&PID_0243",
        // CH340 clones
        "USB\\VID_1A86&PID_7523",
    ],
    serial: FIRMATA_FRAME,
    fqbn: "arduino:avr:nano:cpu=atmega328",
    firmware: "arduinoNano.standardFirmata.ino.hex",
    board: &NANO_ATMEGA328,
    features: &[DeviceFeature::Display],
};

pub const DEVICE_PROFILES: &[&DeviceProfile] = &[&ARDUINO_NANO, &NOKIA_5110_KIT];

/// Look up a device profile by its id (`"arduinoNano"`, `"nokia5110"`).
pub fn profile_for(device_id: &str) -> Option<&'static DeviceProfile> {
    DEVICE_PROFILES.iter().copied().find(|p| p.id == device_id)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Pin to role lookup for the active board. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    board: &'static str,
    pins: HashMap<Pin, HashSet<PinRole>>,
}

impl CapabilityRegistry {
    pub fn from_variant(variant: &BoardVariant) -> Self {
        let pins = variant
            .pins
            .iter()
            .map(|(pin, roles)| (*pin, roles.iter().copied().collect()))
            .collect();
        Self {
            board: variant.name,
            pins,
        }
    }

    pub fn board(&self) -> &'static str {
        self.board
    }

    /// Fails with `IncompatiblePin` when the pin lacks the role or is not on this board.
    pub fn validate(&self, pin: Pin, role: PinRole) -> Result<(), Rejection> {
        match self.pins.get(&pin) {
            Some(roles) if roles.contains(&role) => Ok(()),
            _ => Err(Rejection::IncompatiblePin { pin, role }),
        }
    }

    pub fn roles(&self, pin: Pin) -> Option<&HashSet<PinRole>> {
        self.pins.get(&pin)
    }

    /// Pins supporting `role`, in header order.
    pub fn pins_with(&self, role: PinRole) -> Vec<Pin> {
        let mut pins: Vec<Pin> = self
            .pins
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(pin, _)| *pin)
            .collect();
        pins.sort();
        pins
    }
}
