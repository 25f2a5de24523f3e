//! Best-effort telemetry broadcaster

use crate::events::EventSink;
use crate::session::SessionRegistry;
use crate::shutdown::Shutdown;
use crate::vehicle::VehicleHandle;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Outcome of one broadcast tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sent: usize,
    pub failed: usize,
}

/// Sends the vehicle telemetry to every session on a fixed period
pub struct TelemetryBroadcaster {
    vehicle: VehicleHandle,
    registry: Arc<SessionRegistry>,
    socket: UdpSocket,
    sink: Arc<dyn EventSink>,
    period: Duration,
    fallback_port: u16,
}

impl TelemetryBroadcaster {
    pub fn new(
        vehicle: VehicleHandle,
        registry: Arc<SessionRegistry>,
        socket: UdpSocket,
        sink: Arc<dyn EventSink>,
        period: Duration,
        fallback_port: u16,
    ) -> Self {
        Self {
            vehicle,
            registry,
            socket,
            sink,
            period,
            fallback_port,
        }
    }

    /// Start the broadcast loop; returns when shutdown fires
    pub async fn run(self, mut shutdown: Shutdown) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Telemetry broadcaster running every {:?}", self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    debug!("Telemetry tick: sent={} failed={}", report.sent, report.failed);
                }
                _ = shutdown.recv() => break,
            }
        }

        info!("Telemetry broadcaster stopped");
    }

    /// Broadcast one snapshot to every registered session
    pub async fn tick(&self) -> TickReport {
        let encoded = self.vehicle.snapshot_telemetry().await.encode();
        let sessions = self.registry.snapshot_all().await;

        let mut report = TickReport::default();
        for session in sessions {
            let target = session.telemetry_target(self.fallback_port);
            match self.socket.send_to(&encoded, target).await {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Telemetry to {} ({}) failed: {}", session.id, target, e);
                    self.sink
                        .record(&session.id, target, &format!("UDP_SEND_ERR: {}", e));
                }
            }
        }
        report
    }
}
