use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::board::{in_bounds, new_board, Board, Color, PerColor, Piece, PieceType, Square};
use crate::board::Color::{Black, White};
use crate::clock::{Clock, TimeMode};
use crate::communication_protocol::Snapshot;
use crate::error::MoveError;
use crate::legality::{is_legal_move, king_home, legal_moves, terminal_status};
use crate::moves::is_in_check;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastleSide {
    King,
    Queen,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastleRights {
    pub kingside: bool,
    pub queenside: bool,
}

impl CastleRights {
    pub const ALL: CastleRights = CastleRights { kingside: true, queenside: true };
    pub const NONE: CastleRights = CastleRights { kingside: false, queenside: false };

    pub fn get(&self, side: CastleSide) -> bool {
        match side {
            CastleSide::King => self.kingside,
            CastleSide::Queen => self.queenside,
        }
    }

    pub fn clear(&mut self, side: CastleSide) {
        match side {
            CastleSide::King => self.kingside = false,
            CastleSide::Queen => self.queenside = false,
        }
    }
}

pub type CastlingRights = PerColor<CastleRights>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Playing,
    Checkmate(Color),
    Stalemate,
    TimedOut(Color),
}

impl GameStatus {
    pub fn is_over(&self) -> bool {
        *self != GameStatus::Playing
    }

    pub fn winner(&self) -> Option<Color> {
        match self {
            GameStatus::Checkmate(c) | GameStatus::TimedOut(c) => Some(*c),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub start: Square,
    pub end: Square,
    pub moved: Piece,
    pub captured: Option<Piece>,
}

/// Full state of one game. All writes go through `apply_move`, the clock
/// hooks and `restore`.
#[derive(Debug, Clone)]
pub struct Game {
    pub board: Board,
    pub turn: Color,
    pub castling_rights: CastlingRights,
    pub en_passant_target: Option<Square>,
    pub king_positions: PerColor<Square>,
    pub in_check: PerColor<bool>,
    pub status: GameStatus,
    pub history: Vec<HistoryEntry>,
    pub clock: Option<Clock>,
    pub time_mode: TimeMode,
    pub started: bool,
}

impl Default for Game {
    fn default() -> Self {
        Game::new()
    }
}

fn corner_side(square: Square, color: Color) -> Option<CastleSide> {
    if square.0 != color.back_rank() {
        return None;
    }
    match square.1 {
        0 => Some(CastleSide::Queen),
        7 => Some(CastleSide::King),
        _ => None,
    }
}

impl Game {
    pub fn new() -> Game {
        Game {
            board: new_board(),
            turn: White,
            castling_rights: PerColor::new(CastleRights::ALL, CastleRights::ALL),
            en_passant_target: None,
            king_positions: PerColor::new(king_home(White), king_home(Black)),
            in_check: PerColor::new(false, false),
            status: GameStatus::Playing,
            history: Vec::new(),
            clock: None,
            time_mode: TimeMode::default(),
            started: false,
        }
    }

    pub fn with_time_mode(mode: TimeMode) -> Game {
        let mut game = Game::new();
        game.setup_clock(mode);
        game
    }

    /// Builds a game around an arbitrary board. Castling rights are granted
    /// wherever king and rook stand on their home squares.
    pub fn from_position(board: Board, turn: Color) -> Game {
        let mut game = Game::new();
        game.board = board;
        game.turn = turn;
        for color in [White, Black] {
            let home = king_home(color);
            game.king_positions[color] = board.find_king(color).unwrap_or(home);
            let king_home_ok = game.king_positions[color] == home;
            let rook_at = |col: usize| board.get((color.back_rank(), col))
                .is_some_and(|p| p.kind == PieceType::Rook && p.color == color);
            game.castling_rights[color] = CastleRights {
                kingside: king_home_ok && rook_at(7),
                queenside: king_home_ok && rook_at(0),
            };
        }
        game.refresh_check_flags();
        game.status = terminal_status(&game);
        game
    }

    pub fn setup_clock(&mut self, mode: TimeMode) {
        self.time_mode = mode;
        self.clock = Some(Clock::for_mode(mode));
        self.started = false;
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now())
    }

    /// Starts the clock of the side to move, or hands a paused clock back to
    /// it. Does nothing without a clock or once the game is over.
    pub fn start_at(&mut self, now: Instant) {
        if self.status.is_over() {
            return;
        }
        if let Some(clock) = self.clock.as_mut() {
            if !self.started {
                clock.start_at(self.turn, now);
                self.started = true;
                log::info!("Game started, {}, {} to move", self.time_mode, self.turn);
            } else if !clock.state.running {
                clock.resume_at(self.turn, now);
                log::info!("Clock resumed for {}", self.turn);
            }
        }
    }

    pub fn pause(&mut self) {
        self.pause_at(Instant::now())
    }

    pub fn pause_at(&mut self, now: Instant) {
        if let Some(clock) = self.clock.as_mut() {
            if clock.state.running {
                clock.pause_at(now);
                log::info!("Clock paused");
            }
        }
        self.apply_timeout();
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) {
        if let Some(clock) = self.clock.as_mut() {
            clock.tick_at(now);
        }
        self.apply_timeout();
    }

    fn flagged_side(&self) -> Option<Color> {
        self.clock.as_ref()
            .filter(|c| c.state.game_over)
            .and_then(|c| c.state.timeout_color)
    }

    fn apply_timeout(&mut self) {
        if let Some(loser) = self.flagged_side() {
            if self.status == GameStatus::Playing {
                self.status = GameStatus::TimedOut(loser.opposite());
            }
        }
    }

    pub fn legal_moves(&self, square: Square) -> HashSet<Square> {
        legal_moves(self, square)
    }

    /// Validates the request against the legal moves, then applies it.
    pub fn try_move(&mut self, start: Square, end: Square) -> Result<HistoryEntry, MoveError> {
        if !in_bounds(start) || !in_bounds(end) {
            return Err(MoveError::Illegal { start, end });
        }
        self.check_mover(start)?;
        if !is_legal_move(self, start, end) {
            return Err(MoveError::Illegal { start, end });
        }
        self.apply_move(start, end)
    }

    fn check_mover(&self, start: Square) -> Result<Piece, MoveError> {
        if self.status.is_over() {
            return Err(MoveError::GameOver);
        }
        match self.board.get(start) {
            None => Err(MoveError::NoPiece(start)),
            Some(p) if p.color != self.turn => Err(MoveError::WrongTurn(self.turn)),
            Some(p) => Ok(p),
        }
    }

    pub fn apply_move(&mut self, start: Square, end: Square) -> Result<HistoryEntry, MoveError> {
        self.apply_move_at(start, end, Instant::now())
    }

    /// Plays `start -> end` without checking legality. Callers at the
    /// move-intent boundary must use `try_move` or `is_legal_move` first.
    pub fn apply_move_at(&mut self, start: Square, end: Square, now: Instant) -> Result<HistoryEntry, MoveError> {
        if !in_bounds(end) {
            return Err(MoveError::Illegal { start, end });
        }
        let piece = self.check_mover(start)?;
        let color = piece.color;
        let mut captured = self.board.get(end);

        if piece.kind == PieceType::King && start.1.abs_diff(end.1) == 2 {
            let side = if end.1 > start.1 { CastleSide::King } else { CastleSide::Queen };
            let rook = self.board.take((start.0, side.rook_file()));
            self.board.set((start.0, side.king_pass_file()), rook.map(|r| Piece { has_moved: true, ..r }));
        }

        if piece.kind == PieceType::Pawn
            && Some(end) == self.en_passant_target
            && captured.is_none()
            && start.1 != end.1 {
            captured = self.board.take((start.0, end.1));
        }

        self.en_passant_target = if piece.kind == PieceType::Pawn && start.0.abs_diff(end.0) == 2 {
            Some(((start.0 + end.0) / 2, start.1))
        } else {
            None
        };

        self.board.set(start, None);
        let promoted = piece.kind == PieceType::Pawn && end.0 == color.promotion_rank();
        let kind = if promoted { PieceType::Queen } else { piece.kind };
        self.board.set(end, Some(Piece { color, kind, has_moved: true }));

        if piece.kind == PieceType::King {
            self.king_positions[color] = end;
            self.castling_rights[color] = CastleRights::NONE;
        }
        if piece.kind == PieceType::Rook {
            if let Some(side) = corner_side(start, color) {
                self.castling_rights[color].clear(side);
            }
        }
        if let Some(victim) = captured {
            if victim.kind == PieceType::Rook {
                if let Some(side) = corner_side(end, victim.color) {
                    self.castling_rights[victim.color].clear(side);
                }
            }
        }

        let entry = HistoryEntry { start, end, moved: piece, captured };
        self.history.push(entry);
        self.turn = color.opposite();

        if self.started {
            if let Some(clock) = self.clock.as_mut() {
                clock.switch_at(now);
            }
        }

        self.refresh_check_flags();
        // A flag that fell before the move landed beats mate and stalemate.
        self.status = match self.flagged_side() {
            Some(loser) => GameStatus::TimedOut(loser.opposite()),
            None => terminal_status(self),
        };
        if self.status.is_over() {
            if let Some(clock) = self.clock.as_mut() {
                clock.stop_at(now);
            }
        }
        log::debug!("{} {:?} {:?} -> {:?}, status {:?}", color, piece.kind, start, end, self.status);
        Ok(entry)
    }

    fn refresh_check_flags(&mut self) {
        for color in [White, Black] {
            self.in_check[color] = is_in_check(&self.board, color, self.king_positions[color]);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            board: self.board,
            turn: self.turn,
            king_positions: self.king_positions,
            castling_rights: self.castling_rights,
            en_passant_target: self.en_passant_target,
            in_check: self.in_check,
            status: self.status,
            clock: self.clock.as_ref().map(|c| c.state.clone()),
            time_mode: self.time_mode,
            game_started: self.started,
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.restore_at(snapshot, Instant::now())
    }

    /// Replaces every tracked field with the received values. History is
    /// local and left untouched.
    pub fn restore_at(&mut self, snapshot: Snapshot, now: Instant) {
        self.board = snapshot.board;
        self.turn = snapshot.turn;
        self.king_positions = snapshot.king_positions;
        self.castling_rights = snapshot.castling_rights;
        self.en_passant_target = snapshot.en_passant_target;
        self.in_check = snapshot.in_check;
        self.status = snapshot.status;
        self.clock = snapshot.clock.map(|state| Clock::from_state(state, now));
        self.time_mode = snapshot.time_mode;
        self.started = snapshot.game_started;
    }
}
