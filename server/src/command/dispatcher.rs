//! Command dispatcher for authenticated sessions

use crate::session::{Session, SessionRegistry};
use crate::vehicle::VehicleHandle;
use std::sync::Arc;
use tracing::debug;
use vehicle_shared::{codec::Message, reason, MessageType, VehicleCommand};

/// What the session should do after a dispatched message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Send the reply and keep serving
    Reply(Message),
    /// Send the reply and close the session
    Disconnect(Message),
}

impl Dispatch {
    pub fn message(&self) -> &Message {
        match self {
            Dispatch::Reply(msg) | Dispatch::Disconnect(msg) => msg,
        }
    }
}

/// Routes session messages to the vehicle and the registry
#[derive(Clone)]
pub struct CommandDispatcher {
    vehicle: VehicleHandle,
    registry: Arc<SessionRegistry>,
}

impl CommandDispatcher {
    pub fn new(vehicle: VehicleHandle, registry: Arc<SessionRegistry>) -> Self {
        Self { vehicle, registry }
    }

    /// Handle one message from an authenticated session
    pub async fn dispatch(&self, session: &Session, msg: &Message) -> Dispatch {
        let Some(kind) = msg.kind() else {
            return Dispatch::Reply(reply(MessageType::Cerr, reason::INVALID_MESSAGE));
        };

        if let Some(command) = kind.vehicle_command() {
            return Dispatch::Reply(self.execute(session, command).await);
        }

        match kind {
            MessageType::List => {
                if !session.role.is_admin() {
                    return Dispatch::Reply(reply(MessageType::Cmer, reason::NO_PERMISSION));
                }
                let listing = self.registry.render_listing().await;
                Dispatch::Reply(reply(MessageType::List, &listing))
            }
            MessageType::Disc => Dispatch::Disconnect(reply(MessageType::Dack, reason::GOODBYE)),
            _ => Dispatch::Reply(reply(MessageType::Cerr, reason::INVALID_MESSAGE)),
        }
    }

    async fn execute(&self, session: &Session, command: VehicleCommand) -> Message {
        if !session.role.is_admin() {
            return reply(MessageType::Cmer, reason::NO_PERMISSION);
        }

        match self.vehicle.execute(command).await {
            Ok(()) => {
                debug!("{} executed {:?}", session.id, command);
                reply(MessageType::Cmok, reason::EXECUTED)
            }
            Err(e) => {
                debug!("{} refused {:?}: {}", session.id, command, e);
                reply(MessageType::Cmer, &e.to_string())
            }
        }
    }
}

fn reply(kind: MessageType, payload: &str) -> Message {
    Message::new(kind.as_str(), payload)
}
