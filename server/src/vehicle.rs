//! Lock-guarded handle to the shared vehicle
//!
//! The vehicle is created once at startup and shared by every session task
//! and the telemetry broadcaster. Each operation runs inside a single
//! critical section, so no caller ever sees a partially applied command.

use std::sync::Arc;
use tokio::sync::Mutex;
use vehicle_shared::{codec::Message, CommandError, MessageType, VehicleCommand, VehicleState};

/// Cloneable handle to the one vehicle
#[derive(Clone, Default)]
pub struct VehicleHandle {
    state: Arc<Mutex<VehicleState>>,
}

impl VehicleHandle {
    /// Create a handle around a vehicle in its initial state
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(VehicleState::new())),
        }
    }

    /// Execute a control command atomically
    pub async fn execute(&self, command: VehicleCommand) -> Result<(), CommandError> {
        self.state.lock().await.apply(command)
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> VehicleState {
        self.state.lock().await.clone()
    }

    /// Consistent multi-field snapshot as a `TELE` message
    pub async fn snapshot_telemetry(&self) -> Message {
        let payload = self.state.lock().await.telemetry_payload();
        Message::new(MessageType::Tele.as_str(), payload)
    }
}
