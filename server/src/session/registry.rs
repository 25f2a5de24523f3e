//! Session registry for tracking all authenticated connections

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use vehicle_shared::Role;

/// Identity of one accepted control connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session registry full ({0} sessions)")]
    CapacityReached(usize),

    #[error("No session for {0}")]
    NotFound(ConnectionId),
}

/// Server-side record of one authenticated peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// `<role prefix><slot>`; unique among active sessions only
    pub id: String,
    pub connection: ConnectionId,
    pub role: Role,
    pub addr: SocketAddr,
    /// Negotiated telemetry port, 0 when unset
    pub udp_port: u16,
    pub connected_at: Instant,
    pub last_activity: Instant,
}

impl Session {
    /// Where telemetry for this session is delivered
    pub fn telemetry_target(&self, fallback_port: u16) -> SocketAddr {
        let port = if self.udp_port > 0 {
            self.udp_port
        } else {
            fallback_port
        };
        SocketAddr::new(self.addr.ip(), port)
    }

    fn listing_entry(&self) -> String {
        format!(
            "{}:{}:{}:UDP={}",
            self.addr.ip(),
            self.addr.port(),
            self.role,
            self.udp_port
        )
    }
}

/// Fixed-capacity arena of active sessions
///
/// One lock covers every operation, so readers never observe a session
/// mid-update.
pub struct SessionRegistry {
    slots: RwLock<Vec<Option<Session>>>,
}

impl SessionRegistry {
    /// Create a registry that holds at most `capacity` sessions
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: RwLock::new(vec![None; capacity]),
        }
    }

    /// Register a session in the first free slot
    pub async fn register(
        &self,
        connection: ConnectionId,
        addr: SocketAddr,
        role: Role,
    ) -> Result<Session, RegistryError> {
        let mut slots = self.slots.write().await;
        let capacity = slots.len();
        let (index, slot) = slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(RegistryError::CapacityReached(capacity))?;

        let now = Instant::now();
        let session = Session {
            id: format!("{}{:04}", role.id_prefix(), index + 1),
            connection,
            role,
            addr,
            udp_port: 0,
            connected_at: now,
            last_activity: now,
        };
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Record the session's telemetry port; no-op once the session is gone
    pub async fn set_udp_port(&self, connection: ConnectionId, port: u16) {
        let mut slots = self.slots.write().await;
        if let Some(session) = find_mut(&mut slots, connection) {
            session.udp_port = port;
        }
    }

    /// Refresh the session's last-activity timestamp
    pub async fn touch(&self, connection: ConnectionId) {
        let mut slots = self.slots.write().await;
        if let Some(session) = find_mut(&mut slots, connection) {
            session.last_activity = Instant::now();
        }
    }

    /// Remove the session if present
    pub async fn unregister(&self, connection: ConnectionId) -> Option<Session> {
        let mut slots = self.slots.write().await;
        slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(s) if s.connection == connection))
            .and_then(Option::take)
    }

    pub async fn lookup(&self, connection: ConnectionId) -> Result<Session, RegistryError> {
        let slots = self.slots.read().await;
        slots
            .iter()
            .flatten()
            .find(|s| s.connection == connection)
            .cloned()
            .ok_or(RegistryError::NotFound(connection))
    }

    /// Point-in-time copy of all active sessions in slot order
    pub async fn snapshot_all(&self) -> Vec<Session> {
        let slots = self.slots.read().await;
        slots.iter().flatten().cloned().collect()
    }

    /// `<count>|<ip>:<port>:<role>:UDP=<udp>|...` in slot order
    pub async fn render_listing(&self) -> String {
        let slots = self.slots.read().await;
        let active: Vec<&Session> = slots.iter().flatten().collect();

        let mut listing = active.len().to_string();
        for session in active {
            listing.push('|');
            listing.push_str(&session.listing_entry());
        }
        listing
    }

    /// Sessions with no inbound traffic for longer than `max_idle`
    pub async fn idle_sessions(&self, max_idle: Duration) -> Vec<Session> {
        let slots = self.slots.read().await;
        slots
            .iter()
            .flatten()
            .filter(|s| s.last_activity.elapsed() > max_idle)
            .cloned()
            .collect()
    }

    /// Get the number of active sessions
    pub async fn count(&self) -> usize {
        self.slots.read().await.iter().flatten().count()
    }

    pub async fn capacity(&self) -> usize {
        self.slots.read().await.len()
    }
}

fn find_mut(slots: &mut [Option<Session>], connection: ConnectionId) -> Option<&mut Session> {
    slots
        .iter_mut()
        .flatten()
        .find(|s| s.connection == connection)
}
