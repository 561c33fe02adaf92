//! Session state machine (C4): the per-connection protocol engine. Owns the socket, drives
//! authentication, consults the navigation planner, and handles recharging.

use std::time::Duration;

use bytes::BytesMut;
use robot_proto::auth::{client_hash, server_hash, username_hash};
use robot_proto::message::{
    self, CLIENT_CONFIRMATION, CLIENT_FULL_POWER, CLIENT_KEY_ID, CLIENT_MESSAGE, CLIENT_OK,
    CLIENT_RECHARGING, CLIENT_USERNAME, ClientMessageSpec,
};
use robot_proto::planner::NavigationPlanner;
use robot_proto::server_message::{ProtocolError, ServerMessage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::RobotCodec;
use crate::observer::{RobotEvent, RobotObserver};

const TIMEOUT: Duration = Duration::from_secs(1);
const TIMEOUT_RECHARGING: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 1024;

/// One of the nine FSM states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitUsername,
    WaitKeyId,
    WaitConfirmation,
    WaitInitialClientOk,
    WaitClientOk,
    WaitMessage,
    Final,
    Error,
    Recharging,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::WaitUsername => "wait_username",
            Phase::WaitKeyId => "wait_key_id",
            Phase::WaitConfirmation => "wait_confirmation",
            Phase::WaitInitialClientOk => "wait_initial_client_ok",
            Phase::WaitClientOk => "wait_client_ok",
            Phase::WaitMessage => "wait_message",
            Phase::Final => "final",
            Phase::Error => "error",
            Phase::Recharging => "recharging",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Final | Phase::Error)
    }

    /// Message types accepted while in this phase, in the order the framer's overflow check
    /// considers them. `recharging` accepts only `FULL_POWER`; every non-terminal,
    /// non-recharging phase also accepts `RECHARGING` (it may interrupt from any state).
    pub fn supported_messages(self) -> &'static [&'static ClientMessageSpec] {
        match self {
            Phase::WaitUsername => &[&CLIENT_USERNAME, &CLIENT_RECHARGING],
            Phase::WaitKeyId => &[&CLIENT_KEY_ID, &CLIENT_RECHARGING],
            Phase::WaitConfirmation => &[&CLIENT_CONFIRMATION, &CLIENT_RECHARGING],
            Phase::WaitInitialClientOk | Phase::WaitClientOk => &[&CLIENT_OK, &CLIENT_RECHARGING],
            Phase::WaitMessage => &[&CLIENT_MESSAGE, &CLIENT_RECHARGING],
            Phase::Recharging => &[&CLIENT_FULL_POWER],
            Phase::Final | Phase::Error => &[],
        }
    }

    pub fn read_timeout(self) -> Duration {
        if self == Phase::Recharging {
            TIMEOUT_RECHARGING
        } else {
            TIMEOUT
        }
    }
}

/// The per-connection protocol engine.
pub struct Session {
    socket: TcpStream,
    peer: std::net::SocketAddr,
    codec: RobotCodec,
    inbox: BytesMut,
    phase: Phase,
    phase_before_recharge: Option<Phase>,
    username: Option<Vec<u8>>,
    key_id: Option<i32>,
    username_hash: Option<u32>,
    planner: NavigationPlanner,
    pending_input_message: Option<Vec<u8>>,
    /// Encoded responses queued by `send` during `process_message`, flushed to the socket
    /// once the FSM callback returns. Kept off the socket so the FSM side stays synchronous,
    /// operating on a buffer rather than a live stream.
    outbox: BytesMut,
    error_reason: Option<String>,
    observers: Vec<Box<dyn RobotObserver>>,
}

impl Session {
    pub fn new(socket: TcpStream, peer: std::net::SocketAddr) -> Self {
        let mut codec = RobotCodec::new();
        codec.set_supported(Phase::WaitUsername.supported_messages());
        Self {
            socket,
            peer,
            codec,
            inbox: BytesMut::new(),
            phase: Phase::WaitUsername,
            phase_before_recharge: None,
            username: None,
            key_id: None,
            username_hash: None,
            planner: NavigationPlanner::new(),
            pending_input_message: None,
            outbox: BytesMut::new(),
            error_reason: None,
            observers: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Subscribes `observer`, immediately catching it up with the current phase.
    pub fn add_observer(&mut self, mut observer: Box<dyn RobotObserver>) {
        observer.notify(&RobotEvent::StateUpdate {
            phase: self.phase,
            is_final: self.phase.is_terminal(),
            error: self.error_reason.clone(),
        });
        self.observers.push(observer);
    }

    fn notify(&mut self, event: RobotEvent) {
        for observer in &mut self.observers {
            observer.notify(&event);
        }
    }

    /// Runs the session to completion: reads, frames, and drives the FSM until a terminal
    /// phase is reached, a timeout fires, or the peer closes the connection.
    pub async fn run(mut self) {
        log::info!("(+) session starting for {}", self.peer);
        let mut read_buf = [0u8; READ_CHUNK];

        loop {
            if self.phase.is_terminal() {
                return;
            }

            let read = tokio::time::timeout(self.phase.read_timeout(), self.socket.read(&mut read_buf)).await;
            let n = match read {
                Ok(Ok(n)) => n,
                Ok(Err(err)) => {
                    log::warn!("{} read error: {err}", self.peer);
                    self.error_reason = Some("Closed by client".to_string());
                    self.enter_phase(Phase::Error);
                    let _ = self.socket.shutdown().await;
                    return;
                }
                Err(_) => {
                    log::info!("{} timeout, disconnecting", self.peer);
                    self.error_reason = Some("Timeout".to_string());
                    self.enter_phase(Phase::Error);
                    let _ = self.socket.shutdown().await;
                    return;
                }
            };

            if n == 0 {
                log::info!("{} closed by client", self.peer);
                self.error_reason = Some("Closed by client".to_string());
                self.enter_phase(Phase::Error);
                let _ = self.socket.shutdown().await;
                return;
            }

            log::info!("{} >>> {:?}", self.peer, String::from_utf8_lossy(&read_buf[..n]));
            self.inbox.extend_from_slice(&read_buf[..n]);
            self.notify(RobotEvent::MessageStackUpdate {
                buffer: self.inbox.to_vec(),
            });

            loop {
                match self.codec.decode(&mut self.inbox) {
                    Ok(Some(message)) => {
                        log::info!("{} >=> {:?}", self.peer, String::from_utf8_lossy(&message));
                        self.pending_input_message = Some(message.clone());
                        self.process_message(&message);
                        log::info!("{} () phase now: {}", self.peer, self.phase.name());
                        if self.flush().await.is_err() || self.phase.is_terminal() {
                            let _ = self.socket.shutdown().await;
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(_overflow) => {
                        log::info!("{} used all length with message stack", self.peer);
                        self.send(ServerMessage::SyntaxError);
                        self.error_reason = Some("Exceeded length".to_string());
                        self.enter_phase(Phase::Error);
                        let _ = self.flush().await;
                        let _ = self.socket.shutdown().await;
                        return;
                    }
                }
            }
        }
    }

    /// Writes every response queued by `send` since the last flush, in order, and clears the
    /// queue.
    async fn flush(&mut self) -> std::io::Result<()> {
        if self.outbox.is_empty() {
            return Ok(());
        }
        let result = self.socket.write_all(&self.outbox).await;
        self.outbox.clear();
        result
    }

    /// Applies one complete client message to the FSM. The recharging interruption is tried
    /// first (it can fire from any state), then the phase-specific rules, then the catch-all
    /// syntax error.
    fn process_message(&mut self, message: &[u8]) {
        if self.phase != Phase::Recharging && CLIENT_RECHARGING.syntax_check(message) {
            self.phase_before_recharge = Some(self.phase);
            self.enter_phase(Phase::Recharging);
            return;
        }

        match self.phase {
            Phase::Recharging => {
                if CLIENT_FULL_POWER.syntax_check(message) {
                    let restore = self
                        .phase_before_recharge
                        .take()
                        .expect("recharging implies phase_before_recharge is set");
                    self.enter_phase(restore);
                } else {
                    self.fail(ProtocolError::LogicError);
                }
            }
            Phase::WaitUsername => {
                if CLIENT_USERNAME.syntax_check(message) {
                    self.username = Some(message.to_vec());
                    self.send(ServerMessage::KeyRequest);
                    self.enter_phase(Phase::WaitKeyId);
                } else {
                    self.fail(ProtocolError::SyntaxError);
                }
            }
            Phase::WaitKeyId => {
                if CLIENT_KEY_ID.logic_check(message) {
                    let key_id = message::parse_key_id(message);
                    self.key_id = Some(key_id);
                    let username = self.username.clone().expect("set entering wait_key_id");
                    let hash = username_hash(&username);
                    self.username_hash = Some(hash);
                    self.send(ServerMessage::Confirmation(server_hash(hash, key_id)));
                    self.enter_phase(Phase::WaitConfirmation);
                } else if CLIENT_KEY_ID.syntax_check(message) {
                    self.fail(ProtocolError::KeyOutOfRange);
                } else {
                    self.fail(ProtocolError::SyntaxError);
                }
            }
            Phase::WaitConfirmation => {
                if CLIENT_CONFIRMATION.syntax_check(message) {
                    let key_id = self.key_id.expect("set entering wait_confirmation");
                    let hash = self.username_hash.expect("set entering wait_confirmation");
                    let given = message::parse_confirmation(message);
                    if given == client_hash(hash, key_id) {
                        self.send(ServerMessage::Ok);
                        self.send(ServerMessage::Move);
                        self.enter_phase(Phase::WaitInitialClientOk);
                    } else {
                        self.fail(ProtocolError::LoginFailed);
                    }
                } else {
                    self.fail(ProtocolError::SyntaxError);
                }
            }
            Phase::WaitInitialClientOk | Phase::WaitClientOk => {
                if CLIENT_OK.unique_check(message) {
                    let position = message::parse_ok(message);
                    self.planner.update_position(position);
                    self.notify_map_update();
                    self.send(ServerMessage::GetMessage);
                    self.enter_phase(Phase::WaitMessage);
                } else if CLIENT_OK.syntax_check(message) {
                    let position = message::parse_ok(message);
                    let action = self.planner.update_position(position);
                    self.notify_map_update();
                    self.send(ServerMessage::from_action(action));
                    self.enter_phase(Phase::WaitClientOk);
                } else {
                    self.fail(ProtocolError::SyntaxError);
                }
            }
            Phase::WaitMessage => {
                if CLIENT_MESSAGE.syntax_check(message) {
                    self.send(ServerMessage::Logout);
                    self.enter_phase(Phase::Final);
                } else {
                    self.fail(ProtocolError::SyntaxError);
                }
            }
            Phase::Final | Phase::Error => unreachable!("run() returns once a terminal phase is entered"),
        }
    }

    fn fail(&mut self, error: ProtocolError) {
        self.error_reason = Some(error.to_string());
        self.send(error.wire_message());
        self.enter_phase(Phase::Error);
    }

    /// Queues `message` for the socket and notifies observers. The actual write happens in
    /// `flush`, once `process_message` returns, keeping the FSM callbacks themselves
    /// synchronous.
    fn send(&mut self, message: ServerMessage) {
        let _ = Encoder::<&ServerMessage>::encode(&mut self.codec, &message, &mut self.outbox);
        log::info!("{} <<< {:?}", self.peer, message);
        self.notify(RobotEvent::MessageProcessed {
            input: self.pending_input_message.take(),
            response: message.as_bytes(),
            buffer: self.inbox.to_vec(),
        });
    }

    fn notify_map_update(&mut self) {
        let map = self.planner.map_state();
        self.notify(RobotEvent::MapUpdate { map });
    }

    /// Changes phase, updates the codec's accepted-message set, and notifies observers last —
    /// see the module-level note on event ordering.
    fn enter_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.codec.set_supported(phase.supported_messages());
        self.notify(RobotEvent::StateUpdate {
            phase,
            is_final: phase.is_terminal(),
            error: self.error_reason.clone(),
        });
    }
}
