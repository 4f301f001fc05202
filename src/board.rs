use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::Color::{Black, White};

pub const WIDTH: usize = 8;
pub const HEIGHT: usize = 8;

/// `(row, col)`, row 0 is Black's back rank.
pub type Square = (usize, usize);

pub fn in_bounds((row, col): Square) -> bool {
    row < HEIGHT && col < WIDTH
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceType {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White, Black
}

impl Color {
    pub fn opposite(&self) -> Color {
        if self == &White {
            Black
        } else {
            White
        }
    }

    pub fn back_rank(&self) -> usize {
        match self {
            White => HEIGHT - 1,
            Black => 0,
        }
    }

    pub fn pawn_start_rank(&self) -> usize {
        match self {
            White => HEIGHT - 2,
            Black => 1,
        }
    }

    pub fn promotion_rank(&self) -> usize {
        self.opposite().back_rank()
    }

    pub fn pawn_direction(&self) -> i8 {
        match self {
            White => -1,
            Black => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            White => write!(f, "White"),
            Black => write!(f, "Black"),
        }
    }
}

/// A pair of values, one per side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerColor<T> {
    pub white: T,
    pub black: T,
}

impl<T> PerColor<T> {
    pub fn new(white: T, black: T) -> Self {
        PerColor { white, black }
    }
}

impl<T> Index<Color> for PerColor<T> {
    type Output = T;

    fn index(&self, color: Color) -> &T {
        match color {
            White => &self.white,
            Black => &self.black,
        }
    }
}

impl<T> IndexMut<Color> for PerColor<T> {
    fn index_mut(&mut self, color: Color) -> &mut T {
        match color {
            White => &mut self.white,
            Black => &mut self.black,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceType,
    #[serde(default)]
    pub has_moved: bool,
}

impl Piece {
    pub fn new(color: Color, kind: PieceType) -> Self {
        Piece { color, kind, has_moved: false }
    }

    pub fn icon(&self) -> char {
        let icon = match self.kind {
            PieceType::King => 'k',
            PieceType::Queen => 'q',
            PieceType::Rook => 'r',
            PieceType::Bishop => 'b',
            PieceType::Knight => 'n',
            PieceType::Pawn => 'p',
        };
        if self.color == White { icon.to_ascii_uppercase() } else { icon }
    }

    fn from_icon(icon: char) -> Option<Piece> {
        let color = if icon.is_ascii_uppercase() { White } else { Black };
        let kind = match icon.to_ascii_lowercase() {
            'k' => PieceType::King,
            'q' => PieceType::Queen,
            'r' => PieceType::Rook,
            'b' => PieceType::Bishop,
            'n' => PieceType::Knight,
            'p' => PieceType::Pawn,
            _ => return None,
        };
        Some(Piece::new(color, kind))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub squares: [[Option<Piece>; WIDTH]; HEIGHT],
}

impl Board {
    pub fn empty() -> Board {
        Board { squares: [[None; WIDTH]; HEIGHT] }
    }

    /// `None` for empty squares and for squares off the board.
    pub fn get(&self, (row, col): Square) -> Option<Piece> {
        self.squares.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn set(&mut self, (row, col): Square, piece: Option<Piece>) {
        self.squares[row][col] = piece;
    }

    pub fn take(&mut self, (row, col): Square) -> Option<Piece> {
        self.squares[row][col].take()
    }

    pub fn occupied(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        (0..HEIGHT)
            .flat_map(|r| (0..WIDTH).map(move |c| (r, c)))
            .filter_map(|sq| self.get(sq).map(|p| (sq, p)))
    }

    pub fn pieces_of(&self, color: Color) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.occupied().filter(move |(_, p)| p.color == color)
    }

    pub fn find_king(&self, color: Color) -> Option<Square> {
        self.pieces_of(color)
            .find(|(_, p)| p.kind == PieceType::King)
            .map(|(sq, _)| sq)
    }

    /// Plays `from -> to` (plus the en-passant victim, if any), hands the
    /// resulting board to `inspect`, then puts every touched square back.
    /// Castling rook relocation is not simulated.
    pub fn with_move_applied<R>(
        &mut self,
        from: Square,
        to: Square,
        en_passant: Option<Square>,
        inspect: impl FnOnce(&Board) -> R,
    ) -> R {
        let moving = self.get(from);
        let captured = self.get(to);
        let victim_square = match moving {
            Some(p) if p.kind == PieceType::Pawn
                && Some(to) == en_passant
                && captured.is_none()
                && from.1 != to.1 => Some((from.0, to.1)),
            _ => None,
        };
        let victim = victim_square.and_then(|sq| self.take(sq));

        self.set(to, moving);
        self.set(from, None);
        let result = inspect(self);

        self.set(from, moving);
        self.set(to, captured);
        if let Some(sq) = victim_square {
            self.set(sq, victim);
        }
        result
    }
}

pub fn to_string(board: &Board) -> String {
    let mut result: String = String::new();
    for row in 0..HEIGHT {
        for col in 0..WIDTH {
            let icon = match &board.squares[row][col] {
                None => '.',
                Some(p) => p.icon(),
            };
            result.push(icon);
        }
        result.push('\n');
    }
    let r = &result[0..result.len() - 1];
    r.to_string()
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_string(self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("board text must be {HEIGHT} rows of {WIDTH} squares: {0}")]
pub struct BoardParseError(pub String);

/// Parses the `to_string` layout: 8 rows, `.` for empty, upper case White.
impl FromStr for Board {
    type Err = BoardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows: Vec<&str> = s.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if rows.len() != HEIGHT {
            return Err(BoardParseError(format!("found {} rows", rows.len())));
        }
        let mut board = Board::empty();
        for (row, line) in rows.iter().enumerate() {
            let icons: Vec<char> = line.chars().collect();
            if icons.len() != WIDTH {
                return Err(BoardParseError(format!("row {} has {} squares", row, icons.len())));
            }
            for (col, &icon) in icons.iter().enumerate() {
                if icon == '.' {
                    continue;
                }
                match Piece::from_icon(icon) {
                    Some(piece) => board.set((row, col), Some(piece)),
                    None => return Err(BoardParseError(format!("unknown piece '{}'", icon))),
                }
            }
        }
        Ok(board)
    }
}

fn new_pieces(color: Color) -> [Option<Piece>; WIDTH] {
    [
        Some(Piece::new(color, PieceType::Rook)),
        Some(Piece::new(color, PieceType::Knight)),
        Some(Piece::new(color, PieceType::Bishop)),
        Some(Piece::new(color, PieceType::Queen)),
        Some(Piece::new(color, PieceType::King)),
        Some(Piece::new(color, PieceType::Bishop)),
        Some(Piece::new(color, PieceType::Knight)),
        Some(Piece::new(color, PieceType::Rook))
    ]
}

fn new_pawns(color: Color) -> [Option<Piece>; WIDTH] {
    [Some(Piece::new(color, PieceType::Pawn)); WIDTH]
}

fn new_empty() -> [Option<Piece>; WIDTH] {
    [None; WIDTH]
}

pub fn new_board() -> Board {
    Board {
        squares: [
            new_pieces(Black),
            new_pawns(Black),
            new_empty(),
            new_empty(),
            new_empty(),
            new_empty(),
            new_pawns(White),
            new_pieces(White),
        ],
    }
}
