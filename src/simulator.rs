//! In-process peripheral session.
//!
//! Keeps just enough device state to answer reads: pin levels, analog
//! readings, a programmable echo and a serial receive buffer. Every command
//! is recorded so tests and the CLI can inspect what would have gone out.

use async_trait::async_trait;
use firmbridge_shared::{
    Command, ConnectionState, Level, Payload, PeripheralSession, Pin, PinMode, SessionError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// How the simulated echo pin answers a pulse read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoBehavior {
    /// High pulse of this many microseconds.
    Pulse(u32),
    /// Device-side timeout; the firmware reports 0.
    NoPulse,
    /// The reply never arrives.
    Hang,
}

#[derive(Debug, Default)]
struct SimState {
    modes: HashMap<Pin, PinMode>,
    levels: HashMap<Pin, bool>,
    analog: HashMap<Pin, f64>,
    outputs: HashMap<Pin, u8>,
    echo: Option<EchoBehavior>,
    serial_rx: String,
    serial_tx: String,
    log: Vec<Command>,
    fail_next: Option<String>,
    hang_next: bool,
}

#[derive(Debug)]
pub struct SimulatedSession {
    connected: AtomicBool,
    state: Mutex<SimState>,
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSession {
    /// A connected device with every pin low and no echo.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub async fn set_digital(&self, pin: Pin, high: bool) {
        self.state.lock().await.levels.insert(pin, high);
    }

    pub async fn set_analog(&self, pin: Pin, value: f64) {
        self.state.lock().await.analog.insert(pin, value);
    }

    pub async fn set_echo(&self, behavior: EchoBehavior) {
        self.state.lock().await.echo = Some(behavior);
    }

    pub async fn queue_serial_input(&self, data: &str) {
        self.state.lock().await.serial_rx.push_str(data);
    }

    /// Fail the next command with a device error.
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().await.fail_next = Some(message.into());
    }

    /// Leave the next command unanswered forever.
    pub async fn hang_next(&self) {
        self.state.lock().await.hang_next = true;
    }

    pub async fn commands(&self) -> Vec<Command> {
        self.state.lock().await.log.clone()
    }

    /// Recorded commands in line form.
    pub async fn lines(&self) -> Vec<String> {
        self.state.lock().await.log.iter().map(Command::to_line).collect()
    }

    pub async fn clear_log(&self) {
        self.state.lock().await.log.clear();
    }

    pub async fn pin_mode(&self, pin: Pin) -> Option<PinMode> {
        self.state.lock().await.modes.get(&pin).copied()
    }

    /// Last PWM duty or servo angle written to `pin`.
    pub async fn output(&self, pin: Pin) -> Option<u8> {
        self.state.lock().await.outputs.get(&pin).copied()
    }

    pub async fn serial_output(&self) -> String {
        self.state.lock().await.serial_tx.clone()
    }
}

#[async_trait]
impl PeripheralSession for SimulatedSession {
    async fn send(&self, command: Command) -> Result<Payload, SessionError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SessionError::NotConnected);
        }
        let stalled = {
            let mut state = self.state.lock().await;
            state.log.push(command.clone());
            if let Some(message) = state.fail_next.take() {
                return Err(SessionError::Device(message));
            }
            std::mem::take(&mut state.hang_next)
        };
        if stalled {
            tracing::debug!("Simulated device stalled on {}", command);
            return std::future::pending().await;
        }
        let echo = {
            let mut state = self.state.lock().await;
            match &command {
                Command::SetPinMode { pin, mode } => {
                    state.modes.insert(*pin, *mode);
                }
                Command::DigitalWrite { pin, level } => {
                    state.levels.insert(*pin, *level == Level::High);
                }
                Command::PwmWrite { pin, duty: value } | Command::ServoWrite { pin, angle: value } => {
                    state.outputs.insert(*pin, *value);
                }
                Command::DigitalRead { pin } => {
                    let high = state.levels.get(pin).copied().unwrap_or(false);
                    return Ok(Payload::Bool(high));
                }
                Command::AnalogRead { pin } => {
                    let value = state.analog.get(pin).copied().unwrap_or(0.0);
                    return Ok(Payload::Number(value));
                }
                Command::SerialPrint { text, newline } => {
                    state.serial_tx.push_str(text);
                    if *newline {
                        state.serial_tx.push('\n');
                    }
                }
                Command::SerialAvailable => {
                    return Ok(Payload::Number(state.serial_rx.len() as f64));
                }
                Command::SerialRead => {
                    return Ok(Payload::Text(std::mem::take(&mut state.serial_rx)));
                }
                _ => {}
            }
            match command {
                Command::PulseIn { .. } => Some(state.echo.unwrap_or(EchoBehavior::NoPulse)),
                _ => None,
            }
        };

        match echo {
            None => Ok(Payload::Unit),
            Some(EchoBehavior::Pulse(micros)) => Ok(Payload::Number(f64::from(micros))),
            Some(EchoBehavior::NoPulse) => Ok(Payload::Number(0.0)),
            Some(EchoBehavior::Hang) => {
                tracing::debug!("Simulated echo hanging");
                std::future::pending().await
            }
        }
    }

    fn connection_state(&self) -> ConnectionState {
        if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_digital_round_trip() {
        let sim = SimulatedSession::new();
        sim.send(Command::DigitalWrite {
            pin: Pin::Digital(13),
            level: Level::High,
        })
        .await
        .unwrap();
        let reply = sim.send(Command::DigitalRead { pin: Pin::Digital(13) }).await.unwrap();
        assert_eq!(reply, Payload::Bool(true));
        assert_eq!(
            sim.lines().await,
            vec!["digital_write D13 1".to_string(), "digital_read D13".to_string()]
        );
    }

    #[tokio::test]
    async fn test_serial_buffer_drains() {
        let sim = SimulatedSession::new();
        sim.queue_serial_input("abc").await;
        assert_eq!(sim.send(Command::SerialAvailable).await.unwrap(), Payload::Number(3.0));
        assert_eq!(
            sim.send(Command::SerialRead).await.unwrap(),
            Payload::Text("abc".to_string())
        );
        assert_eq!(sim.send(Command::SerialAvailable).await.unwrap(), Payload::Number(0.0));
    }

    #[tokio::test]
    async fn test_disconnected_and_injected_failures() {
        let sim = SimulatedSession::new();
        sim.fail_next("brownout").await;
        assert!(matches!(
            sim.send(Command::LcdClear).await,
            Err(SessionError::Device(m)) if m == "brownout"
        ));
        assert_eq!(sim.send(Command::LcdClear).await.unwrap(), Payload::Unit);
        sim.set_connected(false);
        assert_eq!(sim.connection_state(), ConnectionState::Disconnected);
        assert!(matches!(
            sim.send(Command::LcdClear).await,
            Err(SessionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_echo_defaults_to_no_pulse() {
        let sim = SimulatedSession::new();
        let read = Command::PulseIn {
            pin: Pin::Digital(7),
            level: Level::High,
            timeout_micros: 30_000,
        };
        assert_eq!(sim.send(read.clone()).await.unwrap(), Payload::Number(0.0));
        sim.set_echo(EchoBehavior::Pulse(1166)).await;
        assert_eq!(sim.send(read).await.unwrap(), Payload::Number(1166.0));
    }

    #[tokio::test]
    async fn test_hang_next_is_one_shot() {
        let sim = SimulatedSession::new();
        sim.hang_next().await;
        let stalled =
            tokio::time::timeout(Duration::from_millis(20), sim.send(Command::LcdClear)).await;
        assert!(stalled.is_err());
        assert_eq!(sim.send(Command::LcdClear).await.unwrap(), Payload::Unit);
        assert_eq!(sim.commands().await.len(), 2);
    }
}
