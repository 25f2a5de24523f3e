//! Session management for connected control clients
//!
//! This module handles:
//! - The bounded registry of authenticated sessions
//! - The per-connection handshake, authorization and command loop
//! - Deregistration when a connection closes

mod handler;
mod registry;

pub use handler::{Phase, SessionContext, SessionHandler};
pub use registry::{ConnectionId, RegistryError, Session, SessionRegistry};
