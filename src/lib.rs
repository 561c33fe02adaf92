//! Driver crate: frames bytes off a live socket, drives the session FSM (`robot_proto`'s
//! catalogue and planner), and wires accept loop, observers, and CLI together.
//!
//! `robot_proto` stays pure (no sockets, no async runtime); everything here touches a socket
//! or the outside world.

pub mod cli;
pub mod codec;
pub mod observer;
pub mod server;
pub mod session;

pub use robot_proto;
