// Connection mode tracking and per-operation admission

use firmbridge_shared::{ConnectionMode, Operation, Rejection};
use tokio::sync::watch;

/// Holds the active connection mode. Reads are lock-free snapshots; the only
/// writer is the transport's mode-change notification.
#[derive(Debug)]
pub struct ModeGate {
    mode: watch::Sender<ConnectionMode>,
}

impl ModeGate {
    pub fn new(initial: ConnectionMode) -> Self {
        let (mode, _) = watch::channel(initial);
        Self { mode }
    }

    pub fn mode(&self) -> ConnectionMode {
        *self.mode.borrow()
    }

    /// Returns true when the mode actually changed.
    pub fn set_mode(&self, mode: ConnectionMode) -> bool {
        let changed = self.mode.send_if_modified(|current| {
            if *current == mode {
                false
            } else {
                *current = mode;
                true
            }
        });
        if changed {
            tracing::info!("Connection mode changed to {}", mode);
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionMode> {
        self.mode.subscribe()
    }

    pub fn authorize(&self, operation: Operation) -> Result<(), Rejection> {
        let mode = self.mode();
        if operation.is_legal_in(mode) {
            Ok(())
        } else {
            Err(Rejection::WrongMode { operation, mode })
        }
    }
}

impl Default for ModeGate {
    fn default() -> Self {
        Self::new(ConnectionMode::default())
    }
}
