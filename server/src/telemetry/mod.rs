//! Periodic telemetry fan-out over UDP
//!
//! This module handles:
//! - Snapshotting the vehicle once per tick
//! - Delivering the same `TELE` datagram to every registered session
//! - Isolating per-destination delivery failures

mod broadcaster;

pub use broadcaster::{TelemetryBroadcaster, TickReport};
