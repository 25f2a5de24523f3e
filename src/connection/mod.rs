//! Control channel connection to the vehicle server

mod control;

pub use control::ControlConnection;
