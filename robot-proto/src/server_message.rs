//! Server-side wire literals and the wire-visible protocol error kinds.

use crate::core::Action;

/// A response body the server may send, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    KeyRequest,
    Ok,
    LoginFailed,
    SyntaxError,
    LogicError,
    KeyOutOfRange,
    Move,
    TurnLeft,
    TurnRight,
    GetMessage,
    Logout,
    /// The decimal server hash sent in response to a key selection.
    Confirmation(u32),
}

impl ServerMessage {
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            ServerMessage::KeyRequest => b"107 KEY REQUEST".to_vec(),
            ServerMessage::Ok => b"200 OK".to_vec(),
            ServerMessage::LoginFailed => b"300 LOGIN FAILED".to_vec(),
            ServerMessage::SyntaxError => b"301 SYNTAX ERROR".to_vec(),
            ServerMessage::LogicError => b"302 LOGIC ERROR".to_vec(),
            ServerMessage::KeyOutOfRange => b"303 KEY OUT OF RANGE".to_vec(),
            ServerMessage::Move => b"102 MOVE".to_vec(),
            ServerMessage::TurnLeft => b"103 TURN LEFT".to_vec(),
            ServerMessage::TurnRight => b"104 TURN RIGHT".to_vec(),
            ServerMessage::GetMessage => b"105 GET MESSAGE".to_vec(),
            ServerMessage::Logout => b"106 LOGOUT".to_vec(),
            ServerMessage::Confirmation(hash) => hash.to_string().into_bytes(),
        }
    }

    pub fn from_action(action: Action) -> ServerMessage {
        match action {
            Action::Move => ServerMessage::Move,
            Action::TurnLeft => ServerMessage::TurnLeft,
            Action::TurnRight => ServerMessage::TurnRight,
        }
    }
}

/// The four protocol violations that both close the session and produce a wire error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Syntax error")]
    SyntaxError,
    #[error("Login failed")]
    LoginFailed,
    #[error("Key out of range")]
    KeyOutOfRange,
    #[error("Logic error")]
    LogicError,
}

impl ProtocolError {
    pub fn wire_message(self) -> ServerMessage {
        match self {
            ProtocolError::SyntaxError => ServerMessage::SyntaxError,
            ProtocolError::LoginFailed => ServerMessage::LoginFailed,
            ProtocolError::KeyOutOfRange => ServerMessage::KeyOutOfRange,
            ProtocolError::LogicError => ServerMessage::LogicError,
        }
    }
}
