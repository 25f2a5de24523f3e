//! UDP telemetry receiver

use anyhow::Result;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};
use vehicle_shared::{codec, MessageType, TelemetryReport};

/// Bind the local telemetry socket
pub async fn bind(port: u16) -> Result<UdpSocket> {
    Ok(UdpSocket::bind(("0.0.0.0", port)).await?)
}

/// Decode a datagram into a telemetry report, `None` if it is not one
pub fn parse_datagram(datagram: &[u8]) -> Option<TelemetryReport> {
    let msg = codec::decode(datagram);
    if msg.kind() != Some(MessageType::Tele) {
        return None;
    }
    TelemetryReport::parse(&msg.payload)
}

/// Log every telemetry report received until the socket fails
pub async fn run(socket: UdpSocket) {
    let mut buf = vec![0u8; 2048];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, from)) => match parse_datagram(&buf[..n]) {
                Some(report) => info!("[TELEMETRY] {}", report),
                None => debug!("Ignoring datagram from {}", from),
            },
            Err(e) => {
                warn!("Telemetry socket closed: {}", e);
                break;
            }
        }
    }
}
