//! Block operation translation for Arduino Nano class devices.
//!
//! Block invocations come in as an opcode plus string arguments, get checked
//! against the connection mode and the board's pin table, pass through the
//! numeric and timing transforms they need, and leave as normalized
//! [`Command`](firmbridge_shared::Command)s on a
//! [`PeripheralSession`](firmbridge_shared::PeripheralSession).

pub mod catalog;
pub mod dispatcher;
pub mod mode_gate;
pub mod request;
pub mod simulator;
pub mod ultrasonic;

pub use dispatcher::Dispatcher;
pub use firmbridge_shared as shared;
pub use mode_gate::ModeGate;
pub use request::{BlockArgs, Request};
pub use simulator::{EchoBehavior, SimulatedSession};
pub use ultrasonic::UltrasonicSensor;
