//! Wire types, message catalogue and navigation planner for the robot protocol.
//!
//! This crate is pure: no sockets, no async runtime. The driver crate (`robot_server`)
//! frames bytes off the wire and calls into here for validation, parsing and planning.

pub mod auth;
pub mod core;
pub mod framing;
pub mod message;
pub mod planner;
pub mod server_message;
