use std::fmt::{self, Display};

use crate::{
    board::Board,
    piece::{Piece, PieceType},
    util::Loc,
};

/// A single move: mover, origin, destination, whatever was captured, and
/// whether the move promotes. Undo information rides along so the board can
/// restore itself without a side table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Move {
    from: Loc,
    to: Loc,
    piece: Piece,
    captured: Option<Piece>,
    promotion: bool,
}

impl Move {
    pub const fn new(piece: Piece, from: Loc, to: Loc, captured: Option<Piece>) -> Self {
        Self {
            from,
            to,
            piece,
            captured,
            promotion: false,
        }
    }

    pub const fn new_promotion(piece: Piece, from: Loc, to: Loc, captured: Option<Piece>) -> Self {
        Self {
            from,
            to,
            piece,
            captured,
            promotion: true,
        }
    }

    pub const fn from(self) -> Loc {
        self.from
    }

    pub const fn to(self) -> Loc {
        self.to
    }

    /// The piece being moved (as it stood on the origin square).
    pub const fn piece(self) -> Piece {
        self.piece
    }

    pub const fn captured(self) -> Option<Piece> {
        self.captured
    }

    pub const fn is_capture(self) -> bool {
        self.captured.is_some()
    }

    pub const fn is_promotion(self) -> bool {
        self.promotion
    }

    /// Whether the mover, standing on the destination square, would attack an
    /// enemy king. Discovered checks are not counted; callers treat this as
    /// an approximation.
    pub fn delivers_check(self, board: &Board) -> bool {
        board.move_gives_check(self)
    }

    /// Net material swing of the capture sequence this move starts, assuming
    /// least-valuable-attacker play from both teams. Pins are ignored.
    pub fn approx_see(self, board: &Board) -> i32 {
        board.static_exchange_eval(self)
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.piece.char(), self.from, self.to)?;
        if self.promotion {
            write!(f, "=Q")?;
        }
        if let Some(captured) = self.captured {
            write!(f, "x{}", captured.char())?;
        }
        Ok(())
    }
}
