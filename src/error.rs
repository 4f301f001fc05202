//! Error types shared by the engine, the protocol and the network layer.

use std::io;

use thiserror::Error;

use crate::board::{Color, Square};
use crate::communication_protocol::MAX_FRAME_LEN;

/// A move request the game refuses. The UI boundary drops these silently.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("the game is over")]
    GameOver,

    #[error("no piece on {0:?}")]
    NoPiece(Square),

    #[error("it is {0}'s turn")]
    WrongTurn(Color),

    #[error("this side plays {0}")]
    NotYourPiece(Color),

    #[error("{start:?} -> {end:?} is not a legal move")]
    Illegal { start: Square, end: Square },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("chat message is empty")]
    Empty,

    #[error("chat message has {len} characters, the limit is {max}")]
    TooLong { len: usize, max: usize },
}

#[derive(Error, Debug)]
pub enum NetworkError {
    /// Bind, accept or connect failed; the caller goes back to the menu.
    #[error("cannot reach {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),

    #[error("peer disconnected")]
    Disconnected,
}

impl NetworkError {
    /// Read timeouts only exist so the receive loop can poll its stop flag.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Io(e) => matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted),
            _ => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown time mode `{0}` (expected blitz, rapid or standard)")]
    UnknownTimeMode(String),

    #[error("invalid port `{0}`")]
    InvalidPort(String),
}

/// Failure of a request made through the `Session` handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("session has stopped")]
    Closed,
}
