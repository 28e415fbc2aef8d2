// src/dispatcher.rs - Block operation dispatch onto the peripheral session

use crate::mode_gate::ModeGate;
use crate::request::{BlockArgs, Request};
use crate::ultrasonic::UltrasonicSensor;
use firmbridge_shared::config::{Config, ConfigError};
use firmbridge_shared::numeric;
use firmbridge_shared::tone::ToneRequest;
use firmbridge_shared::{
    CapabilityRegistry, Command, CommandError, CommandResult, ConnectionMode, ConnectionState,
    DeviceProfile, Failure, Operation, Payload, PeripheralSession, Pin, PinMode, PinRole,
    Rejection,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Role a request's pin must support on the active board.
fn required_role(operation: Operation) -> Option<PinRole> {
    match operation {
        Operation::SetPinMode
        | Operation::SetDigitalOutput
        | Operation::ReadDigitalPin
        | Operation::SetPinTrigger
        | Operation::SetPinEcho
        | Operation::SetPinBuzzer => Some(PinRole::Digital),
        Operation::SetPwmOutput | Operation::SetServoOutput => Some(PinRole::Pwm),
        Operation::ReadAnalogPin => Some(PinRole::Analog),
        Operation::AttachInterrupt | Operation::DetachInterrupt => Some(PinRole::Interrupt),
        _ => None,
    }
}

/// Operations answered without talking to the device.
fn is_local(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::ReadDistance
            | Operation::DataMap
            | Operation::DataConstrain
            | Operation::DataConvert
            | Operation::DataConvertAsciiCharacter
            | Operation::DataConvertAsciiNumber
    )
}

fn unexpected_reply(command: &'static str, payload: &Payload) -> CommandError {
    Failure::Session(format!("unexpected reply to {}: {:?}", command, payload)).into()
}

/// Entry point for block invocations against one device.
///
/// Every request goes through the same checks in order: link state, mode,
/// device features, argument shape and pin role. Only requests that pass all
/// of them produce commands on the session.
pub struct Dispatcher {
    session: Arc<dyn PeripheralSession>,
    profile: &'static DeviceProfile,
    registry: CapabilityRegistry,
    gate: ModeGate,
    ultrasonic: UltrasonicSensor,
    buzzer: RwLock<Option<Pin>>,
    // one outstanding exchange per session
    link: Mutex<()>,
    response_timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: &Config, session: Arc<dyn PeripheralSession>) -> Result<Self, ConfigError> {
        config.validate()?;
        let profile = config.device_profile()?;
        let dispatcher = Self::build(
            profile,
            session,
            config.device.initial_mode,
            config.link.response_timeout(),
            config.ultrasonic.timeout_micros,
        );
        tracing::info!(
            "Dispatcher ready for {} ({}) in {} mode",
            profile.id,
            dispatcher.registry.board(),
            config.device.initial_mode
        );
        Ok(dispatcher)
    }

    /// `profile` with every other setting at its configured default.
    pub fn with_profile(profile: &'static DeviceProfile, session: Arc<dyn PeripheralSession>) -> Self {
        let defaults = Config::default();
        Self::build(
            profile,
            session,
            defaults.device.initial_mode,
            defaults.link.response_timeout(),
            defaults.ultrasonic.timeout_micros,
        )
    }

    fn build(
        profile: &'static DeviceProfile,
        session: Arc<dyn PeripheralSession>,
        mode: ConnectionMode,
        response_timeout: Duration,
        echo_timeout_micros: u32,
    ) -> Self {
        Self {
            session,
            profile,
            registry: profile.registry(),
            gate: ModeGate::new(mode),
            ultrasonic: UltrasonicSensor::new(echo_timeout_micros),
            buzzer: RwLock::new(None),
            link: Mutex::new(()),
            response_timeout,
        }
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn mode_gate(&self) -> &ModeGate {
        &self.gate
    }

    pub fn ultrasonic(&self) -> &UltrasonicSensor {
        &self.ultrasonic
    }

    pub async fn buzzer_pin(&self) -> Option<Pin> {
        *self.buzzer.read().await
    }

    /// Called by the transport when the link is reconnected or reflashed.
    pub fn notify_mode_change(&self, mode: ConnectionMode) {
        self.gate.set_mode(mode);
    }

    /// Parse and run one block invocation.
    pub async fn dispatch_block(&self, opcode: &str, args: &BlockArgs) -> CommandResult {
        let result = self.run_block(opcode, args).await;
        report(opcode, &result);
        result
    }

    /// Run an already parsed request.
    pub async fn dispatch(&self, request: Request) -> CommandResult {
        let operation = request.operation();
        let result = match self.admit(operation).and_then(|()| self.check_pin(&request)) {
            Ok(()) => self.execute(request).await,
            Err(e) => Err(e),
        };
        report(operation.opcode(), &result);
        result
    }

    async fn run_block(&self, opcode: &str, args: &BlockArgs) -> CommandResult {
        let operation = Operation::from_opcode(opcode)
            .ok_or_else(|| Rejection::UnknownOperation(opcode.to_string()))?;
        self.admit(operation)?;
        let request = Request::parse(operation, args)?;
        self.check_pin(&request)?;
        self.execute(request).await
    }

    /// Link, mode and device checks that need nothing but the operation.
    pub fn admit(&self, operation: Operation) -> Result<(), CommandError> {
        if operation.needs_link() && self.session.connection_state() == ConnectionState::Disconnected
        {
            return Err(Failure::NotConnected.into());
        }
        self.gate.authorize(operation)?;
        if let Some(feature) = operation.required_feature() {
            if !self.profile.has_feature(feature) {
                return Err(Rejection::UnsupportedOperation {
                    operation,
                    device: self.profile.id,
                }
                .into());
            }
        }
        Ok(())
    }

    fn check_pin(&self, request: &Request) -> Result<(), CommandError> {
        if let (Some(pin), Some(role)) = (request.pin(), required_role(request.operation())) {
            self.registry.validate(pin, role)?;
        }
        Ok(())
    }

    async fn execute(&self, request: Request) -> CommandResult {
        let _link = if is_local(request.operation()) {
            None
        } else {
            Some(self.link.lock().await)
        };

        match request {
            Request::SetPinMode { pin, mode } => self.send_unit(Command::SetPinMode { pin, mode }).await,
            Request::SetDigitalOutput { pin, level } => {
                self.send_unit(Command::DigitalWrite { pin, level }).await
            }
            Request::SetPwmOutput { pin, value } => {
                let duty = numeric::constrain(value.round(), 0.0, 255.0)? as u8;
                self.send_unit(Command::PwmWrite { pin, duty }).await
            }
            Request::ReadDigitalPin { pin } => {
                let reply = self.send(Command::DigitalRead { pin }).await?;
                reply
                    .as_bool()
                    .map(Payload::Bool)
                    .ok_or_else(|| unexpected_reply("digital_read", &reply))
            }
            Request::ReadAnalogPin { pin } => {
                let reply = self.send(Command::AnalogRead { pin }).await?;
                reply
                    .as_number()
                    .map(Payload::Number)
                    .ok_or_else(|| unexpected_reply("analog_read", &reply))
            }
            Request::SetServoOutput { pin, angle } => {
                let angle = numeric::constrain(angle.round(), 0.0, 180.0)? as u8;
                self.send_unit(Command::ServoWrite { pin, angle }).await
            }
            Request::SetPinTrigger { pin } => {
                self.send(Command::SetPinMode { pin, mode: PinMode::Output }).await?;
                self.ultrasonic.set_trigger(pin).await;
                Ok(Payload::Unit)
            }
            Request::SetPinEcho { pin } => {
                self.send(Command::SetPinMode { pin, mode: PinMode::Input }).await?;
                self.ultrasonic.set_echo(pin).await;
                Ok(Payload::Unit)
            }
            Request::GetDistance => {
                self.ultrasonic
                    .measure(self.session.as_ref(), self.response_timeout)
                    .await?;
                Ok(Payload::Unit)
            }
            Request::ReadDistance => Ok(Payload::Number(self.ultrasonic.read_distance())),
            Request::SetPinBuzzer { pin } => {
                self.send(Command::SetPinMode { pin, mode: PinMode::Output }).await?;
                *self.buzzer.write().await = Some(pin);
                tracing::debug!("Buzzer pin set to {}", pin);
                Ok(Payload::Unit)
            }
            Request::SetTone {
                frequency_hz,
                duration_ms,
                silence_ms,
            } => {
                let tone = ToneRequest::single(frequency_hz, duration_ms, silence_ms)?;
                self.play(&tone).await
            }
            Request::BendTones {
                initial_hz,
                final_hz,
                step_hz,
                duration_ms,
                silence_ms,
            } => {
                let tone = ToneRequest::new(initial_hz, final_hz, step_hz, duration_ms, silence_ms)?;
                self.play(&tone).await
            }
            Request::AttachInterrupt { pin, mode } => {
                self.send_unit(Command::AttachInterrupt { pin, mode }).await
            }
            Request::DetachInterrupt { pin } => self.send_unit(Command::DetachInterrupt { pin }).await,
            Request::SerialBegin { baud } => self.send_unit(Command::SerialBegin { baud }).await,
            Request::SerialPrint { text, newline } => {
                self.send_unit(Command::SerialPrint { text, newline }).await
            }
            Request::SerialAvailable => {
                let reply = self.send(Command::SerialAvailable).await?;
                reply
                    .as_number()
                    .map(Payload::Number)
                    .ok_or_else(|| unexpected_reply("serial_available", &reply))
            }
            Request::SerialReadData => match self.send(Command::SerialRead).await? {
                Payload::Text(text) => Ok(Payload::Text(text)),
                Payload::Unit => Ok(Payload::Text(String::new())),
                other => Err(unexpected_reply("serial_read", &other)),
            },
            Request::DataMap {
                value,
                in_min,
                in_max,
                out_min,
                out_max,
            } => Ok(Payload::Number(numeric::map_range(
                value, in_min, in_max, out_min, out_max,
            )?)),
            Request::DataConstrain { value, low, high } => {
                Ok(Payload::Number(numeric::constrain(value, low, high)?))
            }
            Request::DataConvert { value, target } => Ok(numeric::convert(&value, target)?.into()),
            Request::DataConvertAsciiCharacter { code } => {
                let c = numeric::code_to_char(code.trunc() as i64)?;
                Ok(Payload::Text(c.to_string()))
            }
            Request::DataConvertAsciiNumber { text } => {
                Ok(Payload::Number(f64::from(numeric::char_to_code(&text)?)))
            }
            Request::LcdInitial => self.send_unit(Command::LcdInit).await,
            Request::LcdDisplay => self.send_unit(Command::LcdDisplay).await,
            Request::LcdClear => self.send_unit(Command::LcdClear).await,
            Request::LcdSetContrast { level } => self.send_unit(Command::LcdContrast { level }).await,
            Request::LcdSetCursor { x, y } => self.send_unit(Command::LcdCursor { x, y }).await,
            Request::LcdWriteText { text } => self.send_unit(Command::LcdText { text }).await,
            Request::LcdDrawPixel { x, y, color } => {
                self.send_unit(Command::LcdPixel { x, y, color }).await
            }
            Request::LcdDrawPicture {
                x,
                y,
                picture,
                color,
            } => {
                self.send_unit(Command::LcdPicture {
                    x,
                    y,
                    picture,
                    color,
                })
                .await
            }
        }
    }

    /// Emit one `tone` per step and a closing `no_tone` with the silence.
    /// Pacing is left to the device; nothing here sleeps.
    async fn play(&self, tone: &ToneRequest) -> CommandResult {
        let pin = self
            .buzzer_pin()
            .await
            .ok_or(Rejection::PinNotAssigned("buzzer"))?;
        let mut count = 0usize;
        for step in tone.steps() {
            tracing::trace!("Tone step {} Hz for {} ms", step.frequency_hz, step.duration_ms);
            self.send(Command::Tone {
                pin,
                frequency_hz: step.frequency_hz,
                duration_ms: step.duration_ms,
            })
            .await?;
            count += 1;
        }
        self.send(Command::NoTone {
            pin,
            silence_ms: tone.trailing_silence_ms(),
        })
        .await?;
        tracing::debug!(
            "Played {} tone steps {} -> {} Hz",
            count,
            tone.initial_hz(),
            tone.final_hz()
        );
        Ok(Payload::Unit)
    }

    async fn send_unit(&self, command: Command) -> CommandResult {
        self.send(command).await.map(|_| Payload::Unit)
    }

    async fn send(&self, command: Command) -> CommandResult {
        tracing::debug!("MCU <- {}", command);
        let tag = command.tag();
        match tokio::time::timeout(self.response_timeout, self.session.send(command)).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(e)) => Err(Failure::from(e).into()),
            Err(_) => Err(Failure::ResponseTimeout {
                command: tag,
                timeout_ms: self.response_timeout.as_millis() as u64,
            }
            .into()),
        }
    }
}

fn report(opcode: &str, result: &CommandResult) {
    match result {
        Ok(payload) => tracing::debug!("{} -> {:?}", opcode, payload),
        Err(CommandError::Rejected(reason)) => tracing::warn!("{} rejected: {}", opcode, reason),
        Err(CommandError::Failed(cause)) => tracing::warn!("{} failed: {}", opcode, cause),
    }
}
