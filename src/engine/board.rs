use uuid::Uuid;

use crate::clock::Timestamp;
use crate::models::piece::{Piece, PieceId, PieceKind, Side, Square};

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

/// The canonical square-to-piece mapping. At most one piece per square;
/// only the state machine mutates it, via the operations below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
}

impl Board {
    pub fn empty() -> Board {
        Board {
            squares: [[None; 8]; 8],
        }
    }

    /// Standard chess starting position, every piece at `hp` hit points.
    /// Initial pieces get stable ids so a replayed match and a live client
    /// agree on identity without an id handshake; only spawned pieces get
    /// random ids, and those travel in the log.
    pub fn standard(hp: u8) -> Board {
        let mut board = Board::empty();
        let mut next_id = 0u128;
        let mut place = |board: &mut Board, kind, side, square| {
            let mut piece = Piece::new(kind, side, square, hp);
            piece.id = PieceId(Uuid::from_u128(next_id));
            next_id += 1;
            board.place(piece);
        };
        for (file, kind) in BACK_RANK.iter().copied().enumerate() {
            let file = file as u8;
            place(&mut board, kind, Side::White, Square::new(file, 0));
            place(&mut board, kind, Side::Black, Square::new(file, 7));
            place(&mut board, PieceKind::Pawn, Side::White, Square::new(file, 1));
            place(&mut board, PieceKind::Pawn, Side::Black, Square::new(file, 6));
        }
        board
    }

    pub fn piece_at(&self, sq: Square) -> Option<&Piece> {
        self.squares[sq.file as usize][sq.rank as usize].as_ref()
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces().find(|p| p.id == id)
    }

    pub fn pieces(&self) -> impl Iterator<Item = &Piece> {
        self.squares.iter().flatten().filter_map(|slot| slot.as_ref())
    }

    pub fn side_pieces(&self, side: Side) -> impl Iterator<Item = &Piece> {
        self.pieces().filter(move |p| p.side == side)
    }

    pub fn king(&self, side: Side) -> Option<&Piece> {
        self.side_pieces(side).find(|p| p.kind == PieceKind::King)
    }

    pub fn empty_squares(&self) -> Vec<Square> {
        Square::all().filter(|sq| self.piece_at(*sq).is_none()).collect()
    }

    /// Put a piece on its square. The slot must be empty.
    pub fn place(&mut self, piece: Piece) {
        let slot = &mut self.squares[piece.square.file as usize][piece.square.rank as usize];
        debug_assert!(slot.is_none(), "two pieces on {}", piece.square);
        *slot = Some(piece);
    }

    pub fn remove_at(&mut self, sq: Square) -> Option<Piece> {
        self.squares[sq.file as usize][sq.rank as usize].take()
    }

    /// Relocate a piece to an empty destination, stamping its move time.
    /// Capture removal happens before this, in the resolver.
    pub fn advance(&mut self, from: Square, to: Square, now: Timestamp) -> Option<Piece> {
        let mut piece = self.remove_at(from)?;
        piece.square = to;
        piece.last_move_at = Some(now);
        piece.has_moved = true;
        self.place(piece);
        self.piece_at(to).copied()
    }

    /// Decrement the HP of the piece on `sq`, removing it at zero.
    /// Returns the remaining HP.
    pub fn strike_at(&mut self, sq: Square) -> Option<u8> {
        let slot = &mut self.squares[sq.file as usize][sq.rank as usize];
        let piece = slot.as_mut()?;
        piece.hp = piece.hp.saturating_sub(1);
        let left = piece.hp;
        if left == 0 {
            *slot = None;
        }
        Some(left)
    }

    pub fn promote_at(&mut self, sq: Square, kind: PieceKind) {
        if let Some(piece) = self.squares[sq.file as usize][sq.rank as usize].as_mut() {
            piece.kind = kind;
        }
    }

    /// Stamp a piece's move time without relocating it (an HP strike
    /// consumes the striker's action even though it stays put).
    pub fn touch(&mut self, sq: Square, now: Timestamp) {
        if let Some(piece) = self.squares[sq.file as usize][sq.rank as usize].as_mut() {
            piece.last_move_at = Some(now);
            piece.has_moved = true;
        }
    }

    /// Neither side can deliver mate: bare kings, king + single minor
    /// against a bare king, or same-colored single bishops.
    pub fn has_insufficient_material(&self) -> bool {
        let mut white = MaterialCount::default();
        let mut black = MaterialCount::default();
        for piece in self.pieces() {
            let count = match piece.side {
                Side::White => &mut white,
                Side::Black => &mut black,
            };
            match piece.kind {
                PieceKind::King => {}
                PieceKind::Knight => count.minors += 1,
                PieceKind::Bishop => {
                    count.minors += 1;
                    count.bishops += 1;
                    if (piece.square.file + piece.square.rank) % 2 == 0 {
                        count.dark_bishop = true;
                    } else {
                        count.light_bishop = true;
                    }
                }
                _ => count.majors_or_pawns += 1,
            }
        }

        if white.majors_or_pawns > 0 || black.majors_or_pawns > 0 {
            return false;
        }
        match (white.minors, black.minors) {
            (0, 0) | (0, 1) | (1, 0) => true,
            (1, 1) if white.bishops == 1 && black.bishops == 1 => {
                // Opposite kings with bishops bound to the same color.
                white.dark_bishop == black.dark_bishop
                    && white.light_bishop == black.light_bishop
            }
            _ => false,
        }
    }
}

#[derive(Default)]
struct MaterialCount {
    minors: u32,
    bishops: u32,
    majors_or_pawns: u32,
    dark_bishop: bool,
    light_bishop: bool,
}
