//! Observability hooks (C6): anything watching a session — a GUI, a logger, a test harness —
//! implements [`RobotObserver`] and is notified synchronously as the session advances.

use robot_proto::core::Position;
use robot_proto::planner::MapState;

use crate::session::Phase;

/// One notification a session emits over its lifetime.
///
/// `StateUpdate` always arrives last for a given message: any `MapUpdate` or
/// `MessageProcessed` the same transition produces is sent first, mirroring a state machine
/// whose own "entered new state" hook fires only after its transition's other callbacks have
/// all run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotEvent {
    /// A full snapshot of the session's read buffer, emitted after each read off the wire.
    MessageStackUpdate { buffer: Vec<u8> },
    /// A response went out on the wire. `input` is the client message that triggered it, or
    /// `None` when the response is not a reply to any one message (there is none today, but
    /// the field mirrors the observer contract). `buffer` is the read buffer as it stood once
    /// the response was sent.
    MessageProcessed {
        input: Option<Vec<u8>>,
        response: Vec<u8>,
        buffer: Vec<u8>,
    },
    /// The session's phase changed, or an observer just subscribed and is being caught up.
    StateUpdate {
        phase: Phase,
        is_final: bool,
        error: Option<String>,
    },
    /// The navigation planner produced a new map snapshot.
    MapUpdate { map: MapState },
}

/// Receives [`RobotEvent`]s for a single session.
pub trait RobotObserver: Send {
    fn notify(&mut self, event: &RobotEvent);
}

/// Receives notice of each accepted connection, before its session starts running.
///
/// Kept separate from [`RobotObserver`] because a server-level observer (e.g. a GUI tracking
/// every robot on screen) needs to know a session exists before it can subscribe to it, while
/// a per-session observer never needs to hear about other sessions.
pub trait ServerObserver: Send {
    fn on_new_connection(&mut self, peer: std::net::SocketAddr);
}

/// An observer that forwards every event as a [`log`] record at `debug` level, rather than a
/// bespoke tracing sink.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    peer: Option<std::net::SocketAddr>,
}

impl LoggingObserver {
    pub fn new(peer: std::net::SocketAddr) -> Self {
        Self { peer: Some(peer) }
    }
}

impl RobotObserver for LoggingObserver {
    fn notify(&mut self, event: &RobotEvent) {
        match event {
            RobotEvent::MessageStackUpdate { buffer } => {
                log::trace!("{:?}: buffer now {} byte(s)", self.peer, buffer.len())
            }
            RobotEvent::MessageProcessed { response, .. } => {
                log::debug!("{:?}: <<< {:?}", self.peer, String::from_utf8_lossy(response))
            }
            RobotEvent::StateUpdate { phase, error, .. } => {
                log::info!("{:?}: entered {} ({:?})", self.peer, phase.name(), error)
            }
            RobotEvent::MapUpdate { map } => log::debug!("{:?}: map updated to {:?}", self.peer, map),
        }
    }
}
