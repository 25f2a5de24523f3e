//! Vehicle Telemetry Shared Protocol Types
//!
//! This crate provides the line protocol codec, the message catalogue and the
//! vehicle model shared by the control server and its clients.

pub mod codec;
pub mod vehicle;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use codec::{decode, encode, CodecError, LineDecoder, Message};
pub use vehicle::{CommandError, Heading, TelemetryReport, VehicleCommand, VehicleState};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Default operating parameters for the system
pub mod defaults {
    /// Secret an ADMIN handshake must present
    pub const ADMIN_SECRET: &str = "admin123";

    /// Maximum number of concurrent sessions
    pub const MAX_SESSIONS: usize = 50;

    /// Seconds between telemetry broadcasts
    pub const TELEMETRY_INTERVAL_SECS: u64 = 10;

    /// Datagram port used when a session did not negotiate one
    pub const FALLBACK_UDP_PORT: u16 = 6000;

    /// Control channel listen address
    pub const LISTEN_ADDR: &str = "0.0.0.0:5555";

    /// Longest line accepted on the control channel, terminator excluded
    pub const MAX_LINE_LEN: usize = 1024;

    /// Battery percentage below which speed-up is refused
    pub const LOW_BATTERY_PERCENT: u8 = 20;
}

/// Reason codes carried in `CERR` / `CMER` payloads
pub mod reason {
    pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const MAX_CLIENTS_REACHED: &str = "MAX_CLIENTS_REACHED";
    pub const NO_PERMISSION: &str = "NO_PERMISSION";
    pub const EXECUTED: &str = "EXECUTED";
    pub const GOODBYE: &str = "GOODBYE";
}

/// Message type tokens of the control and telemetry protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Handshake request
    Conn,
    /// Handshake accepted
    Cack,
    /// Handshake or message rejected
    Cerr,
    SpeedUp,
    SpeedDown,
    TurnLeft,
    TurnRight,
    /// Command executed
    Cmok,
    /// Command failed or not permitted
    Cmer,
    /// Session listing request and response
    List,
    /// Graceful disconnect
    Disc,
    /// Disconnect acknowledged
    Dack,
    /// Periodic telemetry datagram
    Tele,
}

impl MessageType {
    /// Wire token for this message type
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Conn => "CONN",
            MessageType::Cack => "CACK",
            MessageType::Cerr => "CERR",
            MessageType::SpeedUp => "SPUP",
            MessageType::SpeedDown => "SPDN",
            MessageType::TurnLeft => "TNLF",
            MessageType::TurnRight => "TNRT",
            MessageType::Cmok => "CMOK",
            MessageType::Cmer => "CMER",
            MessageType::List => "LIST",
            MessageType::Disc => "DISC",
            MessageType::Dack => "DACK",
            MessageType::Tele => "TELE",
        }
    }

    /// Look up a wire token; unknown tokens yield `None`
    pub fn parse(token: &str) -> Option<Self> {
        let kind = match token {
            "CONN" => MessageType::Conn,
            "CACK" => MessageType::Cack,
            "CERR" => MessageType::Cerr,
            "SPUP" => MessageType::SpeedUp,
            "SPDN" => MessageType::SpeedDown,
            "TNLF" => MessageType::TurnLeft,
            "TNRT" => MessageType::TurnRight,
            "CMOK" => MessageType::Cmok,
            "CMER" => MessageType::Cmer,
            "LIST" => MessageType::List,
            "DISC" => MessageType::Disc,
            "DACK" => MessageType::Dack,
            "TELE" => MessageType::Tele,
            _ => return None,
        };
        Some(kind)
    }

    /// The vehicle command this message requests, if any
    pub fn vehicle_command(self) -> Option<VehicleCommand> {
        match self {
            MessageType::SpeedUp => Some(VehicleCommand::SpeedUp),
            MessageType::SpeedDown => Some(VehicleCommand::SpeedDown),
            MessageType::TurnLeft => Some(VehicleCommand::TurnLeft),
            MessageType::TurnRight => Some(VehicleCommand::TurnRight),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization level of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Receives telemetry only
    Observer,
    /// Receives telemetry and may drive the vehicle
    Admin,
}

impl Role {
    /// Name used in handshakes and listings
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Observer => "OBSERVER",
            Role::Admin => "ADMIN",
        }
    }

    /// Single-letter prefix of session identifiers
    pub fn id_prefix(self) -> char {
        match self {
            Role::Observer => 'O',
            Role::Admin => 'A',
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `CONN` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Observer { udp_port: u16 },
    Admin { password: String, udp_port: u16 },
}

impl Handshake {
    /// Parse `OBSERVER[:port]` or `ADMIN:password[:port]`
    ///
    /// A port that is not a positive integer in range is treated as unset
    /// (0). Any other shape yields `None`.
    pub fn parse(payload: &str) -> Option<Self> {
        let mut fields = payload.split(':');
        let role = fields.next()?;
        let rest: Vec<&str> = fields.collect();

        match (role, rest.as_slice()) {
            ("OBSERVER", []) => Some(Handshake::Observer { udp_port: 0 }),
            ("OBSERVER", [port]) => Some(Handshake::Observer {
                udp_port: parse_port(port),
            }),
            ("ADMIN", [password]) => Some(Handshake::Admin {
                password: password.to_string(),
                udp_port: 0,
            }),
            ("ADMIN", [password, port]) => Some(Handshake::Admin {
                password: password.to_string(),
                udp_port: parse_port(port),
            }),
            _ => None,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Handshake::Observer { .. } => Role::Observer,
            Handshake::Admin { .. } => Role::Admin,
        }
    }

    pub fn udp_port(&self) -> u16 {
        match self {
            Handshake::Observer { udp_port } | Handshake::Admin { udp_port, .. } => *udp_port,
        }
    }

    /// Render as a `CONN` payload
    pub fn to_payload(&self) -> String {
        let mut out = match self {
            Handshake::Observer { .. } => "OBSERVER".to_string(),
            Handshake::Admin { password, .. } => format!("ADMIN:{}", password),
        };
        if self.udp_port() > 0 {
            out.push(':');
            out.push_str(&self.udp_port().to_string());
        }
        out
    }
}

fn parse_port(field: &str) -> u16 {
    field.trim().parse::<u16>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_tokens() {
        for kind in [
            MessageType::Conn,
            MessageType::SpeedUp,
            MessageType::TurnRight,
            MessageType::List,
            MessageType::Tele,
        ] {
            assert_eq!(MessageType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageType::parse("NOPE"), None);
        assert_eq!(MessageType::parse("conn"), None);
    }

    #[test]
    fn test_vehicle_command_mapping() {
        assert_eq!(
            MessageType::TurnLeft.vehicle_command(),
            Some(VehicleCommand::TurnLeft)
        );
        assert_eq!(MessageType::List.vehicle_command(), None);
    }

    #[test]
    fn test_handshake_observer() {
        assert_eq!(
            Handshake::parse("OBSERVER"),
            Some(Handshake::Observer { udp_port: 0 })
        );
        assert_eq!(
            Handshake::parse("OBSERVER:5005"),
            Some(Handshake::Observer { udp_port: 5005 })
        );
    }

    #[test]
    fn test_handshake_admin() {
        let hs = Handshake::parse("ADMIN:admin123:5005").expect("valid admin handshake");
        assert_eq!(hs.role(), Role::Admin);
        assert_eq!(hs.udp_port(), 5005);
        assert_eq!(
            Handshake::parse("ADMIN:secret"),
            Some(Handshake::Admin {
                password: "secret".into(),
                udp_port: 0
            })
        );
    }

    #[test]
    fn test_handshake_bad_port_is_unset() {
        assert_eq!(
            Handshake::parse("OBSERVER:abc"),
            Some(Handshake::Observer { udp_port: 0 })
        );
        assert_eq!(Handshake::parse("ADMIN:pw:99999").map(|h| h.udp_port()), Some(0));
    }

    #[test]
    fn test_handshake_unrecognized_shapes() {
        assert_eq!(Handshake::parse(""), None);
        assert_eq!(Handshake::parse("ADMIN"), None);
        assert_eq!(Handshake::parse("GUEST"), None);
        assert_eq!(Handshake::parse("OBSERVER:1:2"), None);
        assert_eq!(Handshake::parse("ADMIN:pw:1:2"), None);
    }

    #[test]
    fn test_handshake_payload_roundtrip() {
        let hs = Handshake::Admin {
            password: "admin123".into(),
            udp_port: 5005,
        };
        assert_eq!(hs.to_payload(), "ADMIN:admin123:5005");
        assert_eq!(Handshake::Observer { udp_port: 0 }.to_payload(), "OBSERVER");
    }

    #[test]
    fn test_role_prefixes() {
        assert_eq!(Role::Admin.id_prefix(), 'A');
        assert_eq!(Role::Observer.id_prefix(), 'O');
        assert!(Role::Admin.is_admin());
        assert!(!Role::Observer.is_admin());
    }
}
