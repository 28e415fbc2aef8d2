//! HC-SR04 style trigger/echo distance measurement.
//!
//! Registration records which pins act as trigger and echo. A measurement
//! sends one trigger pulse and one pulse-width read on the echo pin under a
//! single time bound. Only a successful measurement updates the cached
//! distance, so a timeout leaves the previous reading in place.

use firmbridge_shared::{
    Command, CommandError, Failure, Level, Payload, PeripheralSession, Pin, Rejection,
};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Low time before the trigger pulse.
pub const SETTLE_MICROS: u32 = 2;
/// Trigger pulse width expected by the sensor.
pub const TRIGGER_PULSE_MICROS: u32 = 10;
/// Speed of sound at ~20 C.
pub const SPEED_OF_SOUND_CM_PER_MICRO: f64 = 0.0343;

/// Echo width is the round trip, so halve it.
pub fn micros_to_cm(echo_micros: f64) -> f64 {
    echo_micros / 2.0 * SPEED_OF_SOUND_CM_PER_MICRO
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinPair {
    pub trigger: Option<Pin>,
    pub echo: Option<Pin>,
}

#[derive(Debug)]
pub struct UltrasonicSensor {
    pins: RwLock<PinPair>,
    timeout_micros: u32,
    last_distance: watch::Sender<Option<f64>>,
}

impl UltrasonicSensor {
    pub fn new(timeout_micros: u32) -> Self {
        let (last_distance, _) = watch::channel(None);
        Self {
            pins: RwLock::new(PinPair::default()),
            timeout_micros,
            last_distance,
        }
    }

    pub fn timeout_micros(&self) -> u32 {
        self.timeout_micros
    }

    /// Last write wins.
    pub async fn set_trigger(&self, pin: Pin) {
        self.pins.write().await.trigger = Some(pin);
        tracing::debug!("Ultrasonic trigger pin set to {}", pin);
    }

    pub async fn set_echo(&self, pin: Pin) {
        self.pins.write().await.echo = Some(pin);
        tracing::debug!("Ultrasonic echo pin set to {}", pin);
    }

    pub async fn pins(&self) -> PinPair {
        *self.pins.read().await
    }

    /// Last successful measurement in centimeters, or 0 if there never was one.
    pub fn read_distance(&self) -> f64 {
        self.last_distance().unwrap_or(0.0)
    }

    pub fn last_distance(&self) -> Option<f64> {
        *self.last_distance.borrow()
    }

    /// Follow cached distance updates without polling.
    pub fn subscribe(&self) -> watch::Receiver<Option<f64>> {
        self.last_distance.subscribe()
    }

    /// Run one trigger/echo cycle.
    ///
    /// The whole exchange, trigger included, is bounded by the echo timeout
    /// plus `grace` for the round trip, so a session that never answers
    /// still ends in `EchoTimeout`. Callers must not run two measurements at
    /// once on the same sensor.
    pub async fn measure(
        &self,
        session: &dyn PeripheralSession,
        grace: Duration,
    ) -> Result<f64, CommandError> {
        let PinPair { trigger, echo } = self.pins().await;
        let trigger = trigger.ok_or(Rejection::PinNotAssigned("trigger"))?;
        let echo = echo.ok_or(Rejection::PinNotAssigned("echo"))?;
        let timeout = Failure::EchoTimeout {
            timeout_micros: self.timeout_micros,
        };

        let bound = Duration::from_micros(u64::from(self.timeout_micros)) + grace;
        let reply = match tokio::time::timeout(bound, self.exchange(session, trigger, echo)).await
        {
            Ok(reply) => reply?,
            Err(_) => {
                tracing::warn!("No echo reply within {:?}", bound);
                return Err(timeout.into());
            }
        };

        let micros = match reply {
            Payload::Number(n) if n.is_finite() => n,
            other => {
                return Err(Failure::Session(format!("unexpected echo reply {:?}", other)).into());
            }
        };
        if micros <= 0.0 || micros > f64::from(self.timeout_micros) {
            tracing::warn!("Echo timeout on {} ({}us)", echo, micros);
            return Err(timeout.into());
        }

        let distance = micros_to_cm(micros);
        self.last_distance.send_replace(Some(distance));
        tracing::debug!("Distance {:.2} cm ({}us echo)", distance, micros);
        Ok(distance)
    }

    async fn exchange(
        &self,
        session: &dyn PeripheralSession,
        trigger: Pin,
        echo: Pin,
    ) -> Result<Payload, Failure> {
        let pulse = Command::PulseOut {
            pin: trigger,
            settle_micros: SETTLE_MICROS,
            high_micros: TRIGGER_PULSE_MICROS,
        };
        tracing::debug!("MCU <- {}", pulse);
        session.send(pulse).await?;

        let read = Command::PulseIn {
            pin: echo,
            level: Level::High,
            timeout_micros: self.timeout_micros,
        };
        tracing::debug!("MCU <- {}", read);
        Ok(session.send(read).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use firmbridge_shared::{ConnectionState, SessionError};
    use std::sync::Mutex;

    /// Answers pulse reads from a script, one entry per read.
    struct Scripted {
        replies: Mutex<Vec<Result<Payload, SessionError>>>,
        sent: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Payload, SessionError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PeripheralSession for Scripted {
        async fn send(&self, command: Command) -> Result<Payload, SessionError> {
            self.sent.lock().unwrap().push(command.to_line());
            match command {
                Command::PulseIn { .. } => self.replies.lock().unwrap().remove(0),
                _ => Ok(Payload::Unit),
            }
        }

        fn connection_state(&self) -> ConnectionState {
            ConnectionState::Connected
        }
    }

    /// Never acknowledges the trigger pulse.
    struct StalledTrigger;

    #[async_trait]
    impl PeripheralSession for StalledTrigger {
        async fn send(&self, command: Command) -> Result<Payload, SessionError> {
            match command {
                Command::PulseOut { .. } => std::future::pending().await,
                _ => Ok(Payload::Number(1000.0)),
            }
        }

        fn connection_state(&self) -> ConnectionState {
            ConnectionState::Connected
        }
    }

    async fn wired(timeout_micros: u32) -> UltrasonicSensor {
        let sensor = UltrasonicSensor::new(timeout_micros);
        sensor.set_trigger(Pin::Digital(8)).await;
        sensor.set_echo(Pin::Digital(7)).await;
        sensor
    }

    #[test]
    fn test_conversion() {
        assert!((micros_to_cm(1000.0) - 17.15).abs() < 1e-9);
        assert_eq!(micros_to_cm(0.0), 0.0);
    }

    #[tokio::test]
    async fn test_measure_sends_trigger_then_echo_read() {
        let sensor = wired(30_000).await;
        let session = Scripted::new(vec![Ok(Payload::Number(2000.0))]);
        let cm = sensor.measure(&session, Duration::from_millis(50)).await.unwrap();
        assert!((cm - 34.3).abs() < 1e-9);
        assert_eq!(sensor.last_distance(), Some(cm));
        assert_eq!(
            *session.sent.lock().unwrap(),
            vec!["pulse_out D8 2 10".to_string(), "pulse_in D7 1 30000".to_string()]
        );
    }

    #[tokio::test]
    async fn test_zero_and_overlong_echo_are_timeouts() {
        let sensor = wired(30_000).await;
        let session = Scripted::new(vec![
            Ok(Payload::Number(0.0)),
            Ok(Payload::Number(30_001.0)),
        ]);
        for _ in 0..2 {
            let err = sensor.measure(&session, Duration::from_millis(50)).await.unwrap_err();
            assert_eq!(
                err,
                CommandError::Failed(Failure::EchoTimeout {
                    timeout_micros: 30_000
                })
            );
        }
        assert_eq!(sensor.last_distance(), None);
        assert_eq!(sensor.read_distance(), 0.0);
    }

    #[tokio::test]
    async fn test_stalled_trigger_is_bounded() {
        let sensor = wired(5_000).await;
        let err = tokio::time::timeout(
            Duration::from_secs(2),
            sensor.measure(&StalledTrigger, Duration::from_millis(20)),
        )
        .await
        .expect("measurement must end on its own")
        .unwrap_err();
        assert_eq!(
            err,
            CommandError::Failed(Failure::EchoTimeout {
                timeout_micros: 5_000
            })
        );
        assert_eq!(sensor.last_distance(), None);
    }

    #[tokio::test]
    async fn test_unregistered_pins_are_rejected() {
        let sensor = UltrasonicSensor::new(30_000);
        sensor.set_echo(Pin::Digital(7)).await;
        let session = Scripted::new(vec![]);
        let err = sensor.measure(&session, Duration::ZERO).await.unwrap_err();
        assert_eq!(err, CommandError::Rejected(Rejection::PinNotAssigned("trigger")));
        assert!(session.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let sensor = wired(30_000).await;
        sensor.set_trigger(Pin::Digital(4)).await;
        assert_eq!(
            sensor.pins().await,
            PinPair {
                trigger: Some(Pin::Digital(4)),
                echo: Some(Pin::Digital(7))
            }
        );
    }
}
