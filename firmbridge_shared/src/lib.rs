// firmbridge_shared: shared tables, types and pure logic for hosts and tests

pub mod board_config;
pub mod command;
pub mod config;
pub mod hardware_traits;
pub mod numeric;
pub mod operation;
pub mod tone;

pub use board_config::{CapabilityRegistry, DeviceFeature, DeviceProfile, Pin, PinRole};
pub use command::{
    Command, CommandError, CommandResult, ConnectionMode, ConnectionState, Failure,
    InterruptMode, Level, Payload, PinMode, PixelColor, Picture, Rejection,
};
pub use hardware_traits::{PeripheralSession, SessionError};
pub use operation::Operation;
pub use tone::{ToneRequest, ToneStep};
