// Trait-based boundary to the peripheral session (shared)

use crate::command::{Command, ConnectionState, Failure, Payload};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Not connected to device")]
    NotConnected,
    #[error("Device error: {0}")]
    Device(String),
}

impl From<SessionError> for Failure {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotConnected => Failure::NotConnected,
            other => Failure::Session(other.to_string()),
        }
    }
}

/// A live link to one device, owned by the transport layer. Commands arrive
/// already validated; the session only transmits them and reports back.
#[async_trait]
pub trait PeripheralSession: Send + Sync {
    async fn send(&self, command: Command) -> Result<Payload, SessionError>;
    fn connection_state(&self) -> ConnectionState;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_map_to_failures() {
        assert_eq!(Failure::from(SessionError::NotConnected), Failure::NotConnected);
        assert_eq!(
            Failure::from(SessionError::Device("brownout".to_string())),
            Failure::Session("Device error: brownout".to_string())
        );
    }
}
