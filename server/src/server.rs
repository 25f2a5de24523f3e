//! Control listener
//!
//! Accepts TCP connections, spawns one [`SessionHandler`] per connection and
//! runs the telemetry broadcaster alongside. On shutdown every handler is
//! signalled and awaited so each session unwinds through `Closed`.

use crate::config::ServerConfig;
use crate::events::EventSink;
use crate::session::{ConnectionId, SessionContext, SessionHandler, SessionRegistry};
use crate::shutdown;
use crate::telemetry::TelemetryBroadcaster;
use crate::vehicle::VehicleHandle;
use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinSet;
use tokio::time::Duration;
use tracing::{debug, error, info};

/// A bound, not yet running, control server
pub struct Server {
    listener: TcpListener,
    ctx: SessionContext,
    broadcaster: TelemetryBroadcaster,
}

impl Server {
    /// Bind the control listener and the telemetry socket
    pub async fn bind(config: &ServerConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind control listener on {}", config.listen_addr))?;

        let udp_bind = if listener.local_addr()?.is_ipv6() {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = UdpSocket::bind(udp_bind)
            .await
            .context("Failed to bind telemetry socket")?;

        let vehicle = VehicleHandle::new();
        let registry = Arc::new(SessionRegistry::new(config.max_sessions));
        let ctx = SessionContext::new(
            vehicle.clone(),
            registry.clone(),
            sink.clone(),
            config.admin_secret.as_str(),
        );
        let broadcaster = TelemetryBroadcaster::new(
            vehicle,
            registry,
            socket,
            sink,
            config.telemetry_interval(),
            config.fallback_udp_port,
        );

        Ok(Self {
            listener,
            ctx,
            broadcaster,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.ctx.registry.clone()
    }

    /// Accept connections until `signal` completes, then drain every session
    pub async fn run(self, signal: impl Future<Output = ()>) -> Result<()> {
        let Server {
            listener,
            ctx,
            broadcaster,
        } = self;

        let (trigger, shutdown) = shutdown::channel();
        let broadcaster_task = tokio::spawn(broadcaster.run(shutdown.clone()));
        let mut sessions = JoinSet::new();
        let mut next_connection = 0u64;

        info!(
            "Control server listening on {} (capacity {})",
            listener.local_addr()?,
            ctx.registry.capacity().await
        );
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        next_connection += 1;
                        let connection = ConnectionId(next_connection);
                        debug!("Accepted {} from {}", connection, addr);

                        let handler = SessionHandler::new(
                            stream,
                            connection,
                            addr,
                            ctx.clone(),
                            shutdown.clone(),
                        );
                        sessions.spawn(handler.run());
                    }
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        error!("Session task failed: {}", e);
                    }
                }
                _ = &mut signal => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        drop(listener);
        let _ = trigger.send(true);

        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                error!("Session task failed: {}", e);
            }
        }
        broadcaster_task.await?;

        info!("Control server stopped");
        Ok(())
    }
}
