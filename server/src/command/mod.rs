//! Command dispatch for authenticated sessions
//!
//! This module handles:
//! - Role checks for privileged commands
//! - Executing vehicle commands against the shared vehicle
//! - Session listings and graceful disconnects

mod dispatcher;

pub use dispatcher::{CommandDispatcher, Dispatch};
