use std::collections::HashSet;

use crate::board::{Board, Color, PieceType, Square};
use crate::game::{CastleSide, Game, GameStatus};
use crate::moves::{is_in_check, pseudo_moves};

const KING_FILE: usize = 4;

impl CastleSide {
    pub fn rook_file(&self) -> usize {
        match self {
            CastleSide::King => 7,
            CastleSide::Queen => 0,
        }
    }

    /// File the king lands on.
    pub fn king_target_file(&self) -> usize {
        match self {
            CastleSide::King => 6,
            CastleSide::Queen => 2,
        }
    }

    /// File the king crosses, which is also where the rook ends up.
    pub fn king_pass_file(&self) -> usize {
        match self {
            CastleSide::King => 5,
            CastleSide::Queen => 3,
        }
    }

    /// Files that must be empty between king and rook.
    fn between_files(&self) -> &'static [usize] {
        match self {
            CastleSide::King => &[5, 6],
            CastleSide::Queen => &[1, 2, 3],
        }
    }
}

pub fn king_home(color: Color) -> Square {
    (color.back_rank(), KING_FILE)
}

fn king_square_after(game: &Game, color: Color, to: Square, kind: PieceType) -> Square {
    if kind == PieceType::King { to } else { game.king_positions[color] }
}

pub fn can_castle(game: &Game, color: Color, side: CastleSide) -> bool {
    let rank = color.back_rank();
    let home = king_home(color);
    let rook_home = (rank, side.rook_file());
    let board = &game.board;

    if !game.castling_rights[color].get(side) || game.king_positions[color] != home {
        return false;
    }
    if !board.get(home).is_some_and(|p| p.kind == PieceType::King && p.color == color) {
        return false;
    }
    if !board.get(rook_home).is_some_and(|p| p.kind == PieceType::Rook && p.color == color) {
        return false;
    }
    if side.between_files().iter().any(|&col| board.get((rank, col)).is_some()) {
        return false;
    }
    if is_in_check(board, color, home) {
        return false;
    }

    let mut scratch = *board;
    [side.king_pass_file(), side.king_target_file()].iter().all(|&col| {
        let square = (rank, col);
        !scratch.with_move_applied(home, square, None, |b| is_in_check(b, color, square))
    })
}

fn leaves_king_safe(scratch: &mut Board, game: &Game, from: Square, to: Square) -> bool {
    let piece = match scratch.get(from) {
        Some(p) => p,
        None => return false,
    };
    let king = king_square_after(game, piece.color, to, piece.kind);
    !scratch.with_move_applied(from, to, game.en_passant_target, |b| is_in_check(b, piece.color, king))
}

/// Pseudo-moves plus castling destinations, minus everything that would
/// leave the mover's king attacked.
pub fn legal_moves(game: &Game, from: Square) -> HashSet<Square> {
    let piece = match game.board.get(from) {
        None => return HashSet::new(),
        Some(p) => p,
    };
    let mut candidates = pseudo_moves(&game.board, from, game.en_passant_target);
    if piece.kind == PieceType::King {
        for side in [CastleSide::King, CastleSide::Queen] {
            if can_castle(game, piece.color, side) {
                candidates.insert((from.0, side.king_target_file()));
            }
        }
    }

    let mut scratch = game.board;
    candidates.into_iter()
        .filter(|&to| leaves_king_safe(&mut scratch, game, from, to))
        .collect()
}

/// True when `start` holds a piece of the side to move and `end` is one of
/// its legal destinations.
pub fn is_legal_move(game: &Game, start: Square, end: Square) -> bool {
    game.board.get(start).is_some_and(|p| p.color == game.turn)
        && legal_moves(game, start).contains(&end)
}

pub fn has_legal_move(game: &Game, color: Color) -> bool {
    game.board.pieces_of(color).any(|(sq, _)| !legal_moves(game, sq).is_empty())
}

/// Checkmate or stalemate for the side to move, `Playing` otherwise.
pub fn terminal_status(game: &Game) -> GameStatus {
    let color = game.turn;
    if has_legal_move(game, color) {
        GameStatus::Playing
    }
    else if game.in_check[color] {
        GameStatus::Checkmate(color.opposite())
    }
    else {
        GameStatus::Stalemate
    }
}
