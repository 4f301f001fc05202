//! Wire records exchanged by the two peers and their framing.
//!
//! Every frame is a 4-byte big-endian payload length followed by a JSON
//! payload. `FrameDecoder` buffers partial reads and only yields complete
//! frames, in the order they were sent.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Color, PerColor, Square};
use crate::clock::{ClockState, TimeMode};
use crate::error::NetworkError;
use crate::game::{CastlingRights, GameStatus};

pub const MAX_FRAME_LEN: usize = 1 << 20;
const HEADER_LEN: usize = 4;

/// Everything a peer needs to replace its own game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub board: Board,
    pub turn: Color,
    pub king_positions: PerColor<Square>,
    pub castling_rights: CastlingRights,
    pub en_passant_target: Option<Square>,
    pub in_check: PerColor<bool>,
    pub status: GameStatus,
    pub clock: Option<ClockState>,
    pub time_mode: TimeMode,
    pub game_started: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WireMessage {
    Move { start: Square, end: Square },
    Snapshot(Box<Snapshot>),
    Chat { message: String },
    /// Asks the peer for a fresh `Snapshot`.
    SyncRequest,
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Move { .. } => "Move",
            WireMessage::Snapshot(_) => "Snapshot",
            WireMessage::Chat { .. } => "Chat",
            WireMessage::SyncRequest => "SyncRequest",
        }
    }
}

pub fn encode_frame(msg: &WireMessage) -> Result<Vec<u8>, NetworkError> {
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(NetworkError::FrameTooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Reassembly buffer for the receive side of a connection.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder { buffer: Vec::new() }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete frame, if any. A payload that fails to decode is
    /// consumed and reported as `Malformed` so the stream stays aligned; an
    /// oversized length header is reported as `FrameTooLarge` and leaves the
    /// stream unusable.
    pub fn next_message(&mut self) -> Option<Result<WireMessage, NetworkError>> {
        if self.buffer.len() < HEADER_LEN {
            return None;
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&self.buffer[..HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_LEN {
            return Some(Err(NetworkError::FrameTooLarge(len)));
        }
        if self.buffer.len() < HEADER_LEN + len {
            return None;
        }
        let frame: Vec<u8> = self.buffer.drain(..HEADER_LEN + len).skip(HEADER_LEN).collect();
        Some(serde_json::from_slice(&frame).map_err(NetworkError::from))
    }
}
