use crate::engine::board::Board;
use crate::engine::error::MoveError;
use crate::models::piece::{Piece, PieceId, PieceKind, Side, Square};

const CARDINAL: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

/// A validated move, annotated with everything the resolver needs to apply
/// it without re-deriving the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegalMove {
    pub piece_id: PieceId,
    pub from: Square,
    pub to: Square,
    /// Enemy piece on the destination at validation time.
    pub capture: Option<PieceId>,
    /// Pawns auto-promote to a queen on the last rank.
    pub promotion: Option<PieceKind>,
    /// Rook relocation when the move is castling.
    pub castle_rook: Option<(Square, Square)>,
}

/// Standard chess legality plus the variant switches. The hit-points flag
/// turns off check evaluation entirely; it is a flag on this validator,
/// not a separate rule set.
#[derive(Debug, Clone, Copy)]
pub struct MoveValidator {
    hp_mode: bool,
}

impl MoveValidator {
    pub fn new(hp_mode: bool) -> MoveValidator {
        MoveValidator { hp_mode }
    }

    pub fn hp_mode(&self) -> bool {
        self.hp_mode
    }

    /// Check a single intent against the current board. Rejections follow
    /// the taxonomy: a vanished or relocated source piece is stale, wrong
    /// ownership is `NotOwner`, impossible geometry is `IllegalPattern`,
    /// an obstructed path or friendly destination is `Blocked`.
    pub fn validate(
        &self,
        board: &Board,
        side: Side,
        piece_id: PieceId,
        from: Square,
        to: Square,
    ) -> Result<LegalMove, MoveError> {
        let piece = board.piece(piece_id).ok_or(MoveError::Stale)?;
        if piece.square != from {
            return Err(MoveError::Stale);
        }
        if piece.side != side {
            return Err(MoveError::NotOwner);
        }
        if from == to {
            return Err(MoveError::IllegalPattern);
        }

        if piece.kind == PieceKind::King && from.file == 4 && !piece.has_moved {
            if let Some(castle) = self.try_castle(board, piece, to)? {
                return Ok(castle);
            }
        }

        let dest = board.piece_at(to);
        if let Some(occupant) = dest {
            if occupant.side == side {
                return Err(MoveError::Blocked);
            }
        }

        self.check_pattern(board, piece, to, dest.is_some())?;

        let legal = LegalMove {
            piece_id,
            from,
            to,
            capture: dest.map(|p| p.id),
            promotion: promotion_for(piece, to),
            castle_rook: None,
        };

        if !self.hp_mode && self.leaves_own_king_in_check(board, &legal, side) {
            return Err(MoveError::IllegalPattern);
        }
        Ok(legal)
    }

    /// Every legal move of one piece. Used by the planner and by checkmate
    /// detection; not on the intent hot path.
    pub fn legal_moves_for(&self, board: &Board, piece: &Piece) -> Vec<LegalMove> {
        Square::all()
            .filter_map(|to| {
                self.validate(board, piece.side, piece.id, piece.square, to)
                    .ok()
            })
            .collect()
    }

    /// Movement geometry and blocking for one piece kind. `capturing` is
    /// whether the destination holds an enemy piece.
    fn check_pattern(
        &self,
        board: &Board,
        piece: &Piece,
        to: Square,
        capturing: bool,
    ) -> Result<(), MoveError> {
        let from = piece.square;
        let df = to.file as i8 - from.file as i8;
        let dr = to.rank as i8 - from.rank as i8;

        match piece.kind {
            PieceKind::Knight => {
                if KNIGHT_JUMPS.contains(&(df, dr)) {
                    Ok(())
                } else {
                    Err(MoveError::IllegalPattern)
                }
            }
            PieceKind::King => {
                if df.abs() <= 1 && dr.abs() <= 1 {
                    Ok(())
                } else {
                    Err(MoveError::IllegalPattern)
                }
            }
            PieceKind::Rook => self.slide(board, from, to, &CARDINAL),
            PieceKind::Bishop => self.slide(board, from, to, &DIAGONAL),
            PieceKind::Queen => {
                if df == 0 || dr == 0 {
                    self.slide(board, from, to, &CARDINAL)
                } else {
                    self.slide(board, from, to, &DIAGONAL)
                }
            }
            PieceKind::Pawn => {
                let dir = pawn_dir(piece.side);
                if df == 0 && dr == dir {
                    // Straight pushes never capture.
                    if capturing {
                        Err(MoveError::Blocked)
                    } else {
                        Ok(())
                    }
                } else if df == 0 && dr == 2 * dir && from.rank == pawn_home_rank(piece.side) {
                    let step = from
                        .offset(0, dir)
                        .ok_or(MoveError::IllegalPattern)?;
                    if board.piece_at(step).is_some() || capturing {
                        Err(MoveError::Blocked)
                    } else {
                        Ok(())
                    }
                } else if df.abs() == 1 && dr == dir {
                    // Diagonal steps exist only as captures; there is no
                    // en passant without a previous turn to refer to.
                    if capturing {
                        Ok(())
                    } else {
                        Err(MoveError::IllegalPattern)
                    }
                } else {
                    Err(MoveError::IllegalPattern)
                }
            }
        }
    }

    fn slide(
        &self,
        board: &Board,
        from: Square,
        to: Square,
        dirs: &[(i8, i8)],
    ) -> Result<(), MoveError> {
        let df = (to.file as i8 - from.file as i8).signum();
        let dr = (to.rank as i8 - from.rank as i8).signum();
        if !dirs.contains(&(df, dr)) || !aligned(from, to) {
            return Err(MoveError::IllegalPattern);
        }
        let mut sq = from;
        loop {
            sq = match sq.offset(df, dr) {
                Some(next) => next,
                None => return Err(MoveError::IllegalPattern),
            };
            if sq == to {
                return Ok(());
            }
            if board.piece_at(sq).is_some() {
                return Err(MoveError::Blocked);
            }
        }
    }

    /// Castling: king slides two files toward an unmoved rook over empty
    /// squares. With check evaluation on, the king may not start in,
    /// cross, or land on an attacked square.
    fn try_castle(
        &self,
        board: &Board,
        king: &Piece,
        to: Square,
    ) -> Result<Option<LegalMove>, MoveError> {
        let rank = king.square.rank;
        if to.rank != rank || (to.file != 6 && to.file != 2) {
            return Ok(None);
        }
        let (rook_file, between, crossed, rook_to_file): (u8, &[u8], [u8; 2], u8) =
            if to.file == 6 {
                (7, &[5, 6], [5, 6], 5)
            } else {
                (0, &[1, 2, 3], [3, 2], 3)
            };

        let rook_from = Square::new(rook_file, rank);
        match board.piece_at(rook_from) {
            Some(rook)
                if rook.kind == PieceKind::Rook
                    && rook.side == king.side
                    && !rook.has_moved => {}
            _ => return Err(MoveError::IllegalPattern),
        }
        for file in between {
            if board.piece_at(Square::new(*file, rank)).is_some() {
                return Err(MoveError::Blocked);
            }
        }
        if !self.hp_mode {
            let enemy = king.side.opponent();
            if is_square_attacked(board, king.square, enemy) {
                return Err(MoveError::IllegalPattern);
            }
            for file in crossed {
                if is_square_attacked(board, Square::new(file, rank), enemy) {
                    return Err(MoveError::IllegalPattern);
                }
            }
        }

        Ok(Some(LegalMove {
            piece_id: king.id,
            from: king.square,
            to,
            capture: None,
            promotion: None,
            castle_rook: Some((rook_from, Square::new(rook_to_file, rank))),
        }))
    }

    fn leaves_own_king_in_check(&self, board: &Board, mv: &LegalMove, side: Side) -> bool {
        let mut scratch = board.clone();
        if mv.capture.is_some() {
            scratch.remove_at(mv.to);
        }
        scratch.advance(mv.from, mv.to, crate::clock::Timestamp::ZERO);
        if let Some((rook_from, rook_to)) = mv.castle_rook {
            scratch.advance(rook_from, rook_to, crate::clock::Timestamp::ZERO);
        }
        in_check(&scratch, side)
    }
}

/// True if any piece of `by` attacks `sq` under pure movement geometry.
pub fn is_square_attacked(board: &Board, sq: Square, by: Side) -> bool {
    board.side_pieces(by).any(|p| attacks(board, p, sq))
}

pub fn in_check(board: &Board, side: Side) -> bool {
    match board.king(side) {
        Some(king) => is_square_attacked(board, king.square, side.opponent()),
        None => false,
    }
}

fn attacks(board: &Board, piece: &Piece, sq: Square) -> bool {
    let from = piece.square;
    if from == sq {
        return false;
    }
    let df = sq.file as i8 - from.file as i8;
    let dr = sq.rank as i8 - from.rank as i8;
    match piece.kind {
        PieceKind::Knight => KNIGHT_JUMPS.contains(&(df, dr)),
        PieceKind::King => df.abs() <= 1 && dr.abs() <= 1,
        PieceKind::Pawn => dr == pawn_dir(piece.side) && df.abs() == 1,
        PieceKind::Rook => (df == 0 || dr == 0) && clear_ray(board, from, sq),
        PieceKind::Bishop => df.abs() == dr.abs() && clear_ray(board, from, sq),
        PieceKind::Queen => aligned(from, sq) && clear_ray(board, from, sq),
    }
}

fn aligned(from: Square, to: Square) -> bool {
    let df = to.file as i8 - from.file as i8;
    let dr = to.rank as i8 - from.rank as i8;
    df == 0 || dr == 0 || df.abs() == dr.abs()
}

fn clear_ray(board: &Board, from: Square, to: Square) -> bool {
    let df = (to.file as i8 - from.file as i8).signum();
    let dr = (to.rank as i8 - from.rank as i8).signum();
    let mut sq = from;
    loop {
        sq = match sq.offset(df, dr) {
            Some(next) => next,
            None => return false,
        };
        if sq == to {
            return true;
        }
        if board.piece_at(sq).is_some() {
            return false;
        }
    }
}

fn pawn_dir(side: Side) -> i8 {
    match side {
        Side::White => 1,
        Side::Black => -1,
    }
}

fn pawn_home_rank(side: Side) -> u8 {
    match side {
        Side::White => 1,
        Side::Black => 6,
    }
}

fn promotion_for(piece: &Piece, to: Square) -> Option<PieceKind> {
    let last_rank = match piece.side {
        Side::White => 7,
        Side::Black => 0,
    };
    if piece.kind == PieceKind::Pawn && to.rank == last_rank {
        Some(PieceKind::Queen)
    } else {
        None
    }
}
