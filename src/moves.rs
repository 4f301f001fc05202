use std::collections::HashSet;

use crate::board::{Board, Color, PieceType, Square, HEIGHT, WIDTH};

const STRAIGHT: [[i8; 2]; 4] = [[1, 0], [-1, 0], [0, 1], [0, -1]];
const DIAGONAL: [[i8; 2]; 4] = [[1, 1], [-1, 1], [-1, -1], [1, -1]];
const KNIGHT_JUMPS: [[i8; 2]; 8] = [[2, 1], [1, 2], [-1, 2], [-2, 1], [-2, -1], [-1, -2], [1, -2], [2, -1]];
const KING_STEPS: [[i8; 2]; 8] = [[1, 0], [-1, 0], [0, 1], [0, -1], [1, 1], [-1, 1], [-1, -1], [1, -1]];

fn on_board(row: i8, col: i8) -> Option<Square> {
    (row >= 0 && row < HEIGHT as i8 && col >= 0 && col < WIDTH as i8).then_some((row as usize, col as usize))
}

fn offset((row, col): Square, vec: &[i8; 2]) -> Option<Square> {
    on_board(row as i8 + vec[0], col as i8 + vec[1])
}

fn move_by_vector(board: &Board, vec: &[i8; 2], from: Square, current_color: Color) -> Vec<Square> {
    let mut result: Vec<Square> = Vec::new();
    let mut next = offset(from, vec);
    while let Some(sq) = next {
        match board.get(sq) {
            None => result.push(sq),
            Some(other) => {
                if other.color != current_color {
                    result.push(sq);
                }
                break
            }
        }
        next = offset(sq, vec);
    }
    result
}

fn slide(board: &Board, vectors: &[[i8; 2]], from: Square, color: Color) -> HashSet<Square> {
    vectors.iter()
        .flat_map(|vec| move_by_vector(board, vec, from, color))
        .collect()
}

fn jump(board: &Board, vectors: &[[i8; 2]], from: Square, color: Color) -> HashSet<Square> {
    vectors.iter()
        .filter_map(|vec| offset(from, vec))
        .filter(|&sq| board.get(sq).map_or(true, |p| p.color != color))
        .collect()
}

fn pawn_moves(board: &Board, from: Square, color: Color, has_moved: bool, en_passant: Option<Square>) -> HashSet<Square> {
    let dir = color.pawn_direction();
    let mut result = HashSet::new();

    if let Some(one) = offset(from, &[dir, 0]) {
        if board.get(one).is_none() {
            result.insert(one);
            if from.0 == color.pawn_start_rank() && !has_moved {
                if let Some(two) = offset(from, &[2 * dir, 0]) {
                    if board.get(two).is_none() {
                        result.insert(two);
                    }
                }
            }
        }
    }

    for side in [-1, 1] {
        let target = match offset(from, &[dir, side]) {
            Some(sq) => sq,
            None => continue,
        };
        let capture = match board.get(target) {
            Some(p) => p.color != color,
            // the en-passant victim sits beside us, on the target's file
            None => Some(target) == en_passant
                && board.get((from.0, target.1))
                    .is_some_and(|p| p.kind == PieceType::Pawn && p.color != color),
        };
        if capture {
            result.insert(target);
        }
    }
    result
}

/// Geometrically valid destinations for the piece on `from`, ignoring
/// self-check and castling. Empty for an empty square.
pub fn pseudo_moves(board: &Board, from: Square, en_passant: Option<Square>) -> HashSet<Square> {
    match board.get(from) {
        None => HashSet::new(),
        Some(p) => match p.kind {
            PieceType::King => jump(board, &KING_STEPS, from, p.color),
            PieceType::Queen => {
                let mut moves = slide(board, &STRAIGHT, from, p.color);
                moves.extend(slide(board, &DIAGONAL, from, p.color));
                moves
            }
            PieceType::Rook => slide(board, &STRAIGHT, from, p.color),
            PieceType::Bishop => slide(board, &DIAGONAL, from, p.color),
            PieceType::Knight => jump(board, &KNIGHT_JUMPS, from, p.color),
            PieceType::Pawn => pawn_moves(board, from, p.color, p.has_moved, en_passant),
        }
    }
}

pub fn all_possible_moves(board: &Board, color: Color, en_passant: Option<Square>) -> Vec<(Square, Square)> {
    board.pieces_of(color)
        .flat_map(|(from, _)| pseudo_moves(board, from, en_passant).into_iter().map(move |to| (from, to)))
        .collect()
}

/// Raw attack test: no legality filtering, so this never recurses.
pub fn is_in_check(board: &Board, color: Color, king: Square) -> bool {
    all_possible_moves(board, color.opposite(), None)
        .iter()
        .any(|&(_, to)| to == king)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use crate::board::{new_board, Board, Color, Piece, PieceType};
    use crate::board::Color::{Black, White};
    use crate::moves::{all_possible_moves, is_in_check, pseudo_moves};

    fn board_one_piece(row: usize, col: usize, color: Color, kind: PieceType) -> Board {
        let mut board = Board::empty();
        board.squares[row][col] = Some(Piece::new(color, kind));
        board
    }

    #[test]
    fn test_empty_square() {
        let board = board_one_piece(0, 0, White, PieceType::King);
        assert_eq!(pseudo_moves(&board, (1, 1), None), HashSet::new());
    }

    #[test]
    fn test_center_counts() {
        assert_eq!(pseudo_moves(&board_one_piece(3, 3, White, PieceType::Rook), (3, 3), None).len(), 14);
        assert_eq!(pseudo_moves(&board_one_piece(3, 3, White, PieceType::Bishop), (3, 3), None).len(), 13);
        assert_eq!(pseudo_moves(&board_one_piece(3, 3, White, PieceType::Queen), (3, 3), None).len(), 27);
        assert_eq!(pseudo_moves(&board_one_piece(3, 3, White, PieceType::Knight), (3, 3), None).len(), 8);
        assert_eq!(pseudo_moves(&board_one_piece(3, 3, White, PieceType::King), (3, 3), None).len(), 8);
    }

    #[test]
    fn test_king_moves() {
        let board = board_one_piece(0, 0, White, PieceType::King);
        assert_eq!(pseudo_moves(&board, (0, 0), None), HashSet::from([(0, 1), (1, 0), (1, 1)]));

        let board = board_one_piece(7, 7, White, PieceType::King);
        assert_eq!(pseudo_moves(&board, (7, 7), None), HashSet::from([(6, 6), (6, 7), (7, 6)]));
    }

    #[test]
    fn test_rook_moves() {
        let board = board_one_piece(0, 0, White, PieceType::Rook);
        assert_eq!(pseudo_moves(&board, (0, 0), None), HashSet::from([
            (1, 0), (2, 0), (3, 0), (4, 0), (5, 0), (6, 0), (7, 0),
            (0, 1), (0, 2), (0, 3), (0, 4), (0, 5), (0, 6), (0, 7)
        ]));

        let board = new_board();
        assert_eq!(pseudo_moves(&board, (7, 0), None), HashSet::new());

        let mut board = new_board();
        board.squares[6][7] = None;
        assert_eq!(pseudo_moves(&board, (7, 7), None), HashSet::from([(6, 7), (5, 7), (4, 7), (3, 7), (2, 7), (1, 7)]));
    }

    #[test]
    fn test_bishop_moves() {
        let board = board_one_piece(2, 6, White, PieceType::Bishop);
        assert_eq!(pseudo_moves(&board, (2, 6), None), HashSet::from([
            (1, 7),
            (3, 7),
            (1, 5), (0, 4),
            (3, 5), (4, 4), (5, 3), (6, 2), (7, 1)
        ]));

        let board = new_board();
        assert_eq!(pseudo_moves(&board, (7, 2), None), HashSet::new());
    }

    #[test]
    fn test_queen_blocked_and_capturing() {
        let mut board = new_board();
        board.squares[6][2] = None;
        board.squares[6][3] = None;
        board.squares[6][4] = None;
        board.squares[3][7] = Some(Piece::new(White, PieceType::Pawn));
        board.squares[4][0] = Some(Piece::new(Black, PieceType::Pawn));
        assert_eq!(pseudo_moves(&board, (7, 3), None), HashSet::from([
            (6, 3), (5, 3), (4, 3), (3, 3), (2, 3), (1, 3),
            (6, 4), (5, 5), (4, 6),
            (6, 2), (5, 1), (4, 0)
        ]));
    }

    #[test]
    fn test_knight_moves() {
        let board = new_board();
        assert_eq!(pseudo_moves(&board, (7, 1), None), HashSet::from([(5, 0), (5, 2)]));

        let mut board = board_one_piece(0, 0, White, PieceType::Knight);
        board.squares[2][1] = Some(Piece::new(Black, PieceType::Queen));
        board.squares[1][2] = Some(Piece::new(White, PieceType::Pawn));
        assert_eq!(pseudo_moves(&board, (0, 0), None), HashSet::from([(2, 1)]));
    }

    #[test]
    fn test_pawn_moves() {
        let board = new_board();
        assert_eq!(pseudo_moves(&board, (6, 0), None), HashSet::from([(5, 0), (4, 0)]));
        assert_eq!(pseudo_moves(&board, (1, 6), None), HashSet::from([(2, 6), (3, 6)]));

        let board = board_one_piece(4, 1, White, PieceType::Pawn);
        assert_eq!(pseudo_moves(&board, (4, 1), None), HashSet::from([(3, 1)]));

        let mut board = board_one_piece(6, 1, White, PieceType::Pawn);
        board.squares[4][1] = Some(Piece::new(Black, PieceType::Knight));
        assert_eq!(pseudo_moves(&board, (6, 1), None), HashSet::from([(5, 1)]));
        board.squares[5][1] = Some(Piece::new(Black, PieceType::Knight));
        assert_eq!(pseudo_moves(&board, (6, 1), None), HashSet::new());

        let mut board = board_one_piece(6, 1, White, PieceType::Pawn);
        board.squares[6][1] = Some(Piece { color: White, kind: PieceType::Pawn, has_moved: true });
        assert_eq!(pseudo_moves(&board, (6, 1), None), HashSet::from([(5, 1)]));

        let mut board = board_one_piece(4, 3, Black, PieceType::Pawn);
        board.squares[5][2] = Some(Piece::new(White, PieceType::Pawn));
        board.squares[5][3] = Some(Piece::new(White, PieceType::Pawn));
        board.squares[5][4] = Some(Piece::new(Black, PieceType::Pawn));
        assert_eq!(pseudo_moves(&board, (4, 3), None), HashSet::from([(5, 2)]));
    }

    #[test]
    fn test_pawn_en_passant_target() {
        let mut board = board_one_piece(3, 4, White, PieceType::Pawn);
        board.squares[3][3] = Some(Piece::new(Black, PieceType::Pawn));
        assert_eq!(pseudo_moves(&board, (3, 4), None), HashSet::from([(2, 4)]));
        assert_eq!(pseudo_moves(&board, (3, 4), Some((2, 3))), HashSet::from([(2, 4), (2, 3)]));
        // a stale target with no pawn beside it is ignored
        assert_eq!(pseudo_moves(&board, (3, 4), Some((2, 5))), HashSet::from([(2, 4)]));
    }

    #[test]
    fn test_all_possible_moves_and_check() {
        let mut board = board_one_piece(4, 4, White, PieceType::King);
        board.squares[0][4] = Some(Piece::new(Black, PieceType::Rook));
        assert!(is_in_check(&board, White, (4, 4)));
        board.squares[2][4] = Some(Piece::new(White, PieceType::Bishop));
        assert!(!is_in_check(&board, White, (4, 4)));

        let moves = all_possible_moves(&new_board(), White, None);
        assert_eq!(moves.len(), 20);
    }

    #[test]
    fn test_pawn_attacks_only_diagonally() {
        let mut board = board_one_piece(4, 4, White, PieceType::King);
        board.squares[3][4] = Some(Piece::new(Black, PieceType::Pawn));
        assert!(!is_in_check(&board, White, (4, 4)));
        board.squares[3][4] = None;
        board.squares[3][3] = Some(Piece::new(Black, PieceType::Pawn));
        assert!(is_in_check(&board, White, (4, 4)));
    }
}
