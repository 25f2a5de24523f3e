//! Vehicle control server
//!
//! One shared simulated vehicle, driven by authenticated ADMIN sessions over a
//! TCP line protocol and observed by every session through periodic UDP
//! telemetry.

pub mod command;
pub mod config;
pub mod events;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod telemetry;
pub mod vehicle;

pub use config::ServerConfig;
pub use server::Server;
