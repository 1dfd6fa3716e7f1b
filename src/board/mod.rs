pub mod movegen;
pub mod zobrist;

use arrayvec::ArrayVec;

use crate::{
    chessmove::Move,
    piece::{Colour, Piece, PieceType, Team},
    util::{Loc, BOARD_SIZE},
};

/// Outcome of the game as far as the board can tell from its move history.
/// King capture ends the game immediately in this variant; stalemate is
/// detected by the searcher, not the board.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameResult {
    InProgress,
    WinRedYellow,
    WinBlueGreen,
    Stalemate,
}

/// A piece together with the square it stands on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PlacedPiece {
    pub loc: Loc,
    pub piece: Piece,
}

pub type AttackerList = ArrayVec<PlacedPiece, 32>;

#[derive(Clone, Copy, Debug)]
enum Undo {
    Normal(Move),
    Null,
}

/// The 14x14 four-player board: a mailbox grid, king bookkeeping, the side to
/// move, and an incrementally maintained Zobrist hash. Move generation is
/// pseudo-legal only; self-check filtering and king-capture detection are the
/// searcher's business.
#[derive(Clone)]
pub struct Board {
    grid: [Option<Piece>; crate::util::GRID_SQUARES],
    turn: Colour,
    king_locs: [Option<Loc>; Colour::COUNT],
    hash: u64,
    history: Vec<Undo>,
}

impl Board {
    /// An empty board with Red to move. Use [`Board::set_piece`] and
    /// [`Board::set_turn`] to build positions.
    pub fn empty() -> Self {
        Self {
            grid: [None; crate::util::GRID_SQUARES],
            turn: Colour::Red,
            king_locs: [None; Colour::COUNT],
            hash: zobrist::turn_key(Colour::Red),
            history: Vec::with_capacity(64),
        }
    }

    /// The standard four-player starting position: eight pawns and a full
    /// back rank on each arm of the cross.
    pub fn startpos() -> Self {
        use PieceType::{Bishop, King, Knight, Pawn, Queen, Rook};
        let mut board = Self::empty();
        let back: [PieceType; 8] = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];
        for (i, &pt) in back.iter().enumerate() {
            let i = i as i8;
            board.set_piece(Loc::new(13, 3 + i), Piece::new(Colour::Red, pt));
            board.set_piece(Loc::new(12, 3 + i), Piece::new(Colour::Red, Pawn));
            board.set_piece(Loc::new(0, 10 - i), Piece::new(Colour::Yellow, pt));
            board.set_piece(Loc::new(1, 10 - i), Piece::new(Colour::Yellow, Pawn));
            board.set_piece(Loc::new(10 - i, 0), Piece::new(Colour::Blue, pt));
            board.set_piece(Loc::new(10 - i, 1), Piece::new(Colour::Blue, Pawn));
            board.set_piece(Loc::new(3 + i, 13), Piece::new(Colour::Green, pt));
            board.set_piece(Loc::new(3 + i, 12), Piece::new(Colour::Green, Pawn));
        }
        board
    }

    pub fn turn(&self) -> Colour {
        self.turn
    }

    /// Force the side to move. Rotates the turn component of the hash.
    pub fn set_turn(&mut self, colour: Colour) {
        self.hash ^= zobrist::turn_key(self.turn);
        self.turn = colour;
        self.hash ^= zobrist::turn_key(self.turn);
    }

    pub fn team_to_play(&self) -> Team {
        self.turn.team()
    }

    pub fn hash_key(&self) -> u64 {
        self.hash
    }

    pub fn piece_at(&self, loc: Loc) -> Option<Piece> {
        debug_assert!(loc.is_legal());
        self.grid[loc.index()]
    }

    pub fn king_location(&self, colour: Colour) -> Option<Loc> {
        self.king_locs[colour.index()]
    }

    pub fn is_legal_loc(loc: Loc) -> bool {
        loc.is_legal()
    }

    /// Place a piece on a square, replacing any occupant. Builder-style; not
    /// used on the search path.
    pub fn set_piece(&mut self, loc: Loc, piece: Piece) {
        assert!(loc.is_legal(), "piece placed on a corner void: {loc}");
        self.remove_piece(loc);
        self.grid[loc.index()] = Some(piece);
        self.hash ^= zobrist::piece_key(piece, loc);
        if piece.piece_type() == PieceType::King {
            self.king_locs[piece.colour().index()] = Some(loc);
        }
    }

    pub fn remove_piece(&mut self, loc: Loc) {
        if let Some(old) = self.grid[loc.index()].take() {
            self.hash ^= zobrist::piece_key(old, loc);
            if old.piece_type() == PieceType::King {
                self.king_locs[old.colour().index()] = None;
            }
        }
    }

    /// Apply a pseudo-legal move. The move must have been generated for (or
    /// validated against) this exact position.
    pub fn make_move(&mut self, m: Move) {
        debug_assert_eq!(self.piece_at(m.from()), Some(m.piece()));
        debug_assert_eq!(self.piece_at(m.to()), m.captured());
        let mover = m.piece();
        self.hash ^= zobrist::piece_key(mover, m.from());
        self.grid[m.from().index()] = None;
        if let Some(captured) = m.captured() {
            self.hash ^= zobrist::piece_key(captured, m.to());
            if captured.piece_type() == PieceType::King {
                self.king_locs[captured.colour().index()] = None;
            }
        }
        let placed = if m.is_promotion() {
            Piece::new(mover.colour(), PieceType::Queen)
        } else {
            mover
        };
        self.grid[m.to().index()] = Some(placed);
        self.hash ^= zobrist::piece_key(placed, m.to());
        if mover.piece_type() == PieceType::King {
            self.king_locs[mover.colour().index()] = Some(m.to());
        }
        self.hash ^= zobrist::turn_key(self.turn);
        self.turn = self.turn.next();
        self.hash ^= zobrist::turn_key(self.turn);
        self.history.push(Undo::Normal(m));
    }

    /// Revert the most recent [`Board::make_move`].
    pub fn undo_move(&mut self) {
        let Some(Undo::Normal(m)) = self.history.pop() else {
            panic!("undo_move without a matching make_move");
        };
        self.hash ^= zobrist::turn_key(self.turn);
        self.turn = self.turn.next().next().next();
        self.hash ^= zobrist::turn_key(self.turn);
        let placed = self.grid[m.to().index()].take().expect("moved piece vanished");
        self.hash ^= zobrist::piece_key(placed, m.to());
        if let Some(captured) = m.captured() {
            self.grid[m.to().index()] = Some(captured);
            self.hash ^= zobrist::piece_key(captured, m.to());
            if captured.piece_type() == PieceType::King {
                self.king_locs[captured.colour().index()] = Some(m.to());
            }
        }
        let mover = m.piece();
        self.grid[m.from().index()] = Some(mover);
        self.hash ^= zobrist::piece_key(mover, m.from());
        if mover.piece_type() == PieceType::King {
            self.king_locs[mover.colour().index()] = Some(m.from());
        }
    }

    /// Pass the turn without moving. Used by null-move pruning.
    pub fn make_null_move(&mut self) {
        self.hash ^= zobrist::turn_key(self.turn);
        self.turn = self.turn.next();
        self.hash ^= zobrist::turn_key(self.turn);
        self.history.push(Undo::Null);
    }

    pub fn undo_null_move(&mut self) {
        let Some(Undo::Null) = self.history.pop() else {
            panic!("undo_null_move without a matching make_null_move");
        };
        self.hash ^= zobrist::turn_key(self.turn);
        self.turn = self.turn.next().next().next();
        self.hash ^= zobrist::turn_key(self.turn);
    }

    /// The move that produced the current position, if the last action was a
    /// real move.
    pub fn last_move(&self) -> Option<Move> {
        match self.history.last() {
            Some(Undo::Normal(m)) => Some(*m),
            _ => None,
        }
    }

    /// Did the previous move capture a king? If so the capturing team has
    /// won.
    pub fn game_result(&self) -> GameResult {
        if let Some(m) = self.last_move() {
            if let Some(captured) = m.captured() {
                if captured.piece_type() == PieceType::King {
                    return match captured.team() {
                        Team::BlueGreen => GameResult::WinRedYellow,
                        Team::RedYellow => GameResult::WinBlueGreen,
                    };
                }
            }
        }
        GameResult::InProgress
    }

    /// Every piece of the given colour with its square.
    pub fn pieces_of(&self, colour: Colour) -> impl Iterator<Item = PlacedPiece> + '_ {
        Loc::all_legal().filter_map(move |loc| {
            self.grid[loc.index()]
                .filter(|p| p.colour() == colour)
                .map(|piece| PlacedPiece { loc, piece })
        })
    }

    /// Material balance from the Red/Yellow point of view.
    pub fn material(&self) -> i32 {
        let mut total = 0;
        for loc in Loc::all_legal() {
            if let Some(p) = self.grid[loc.index()] {
                match p.team() {
                    Team::RedYellow => total += p.value(),
                    Team::BlueGreen => total -= p.value(),
                }
            }
        }
        total
    }

    /// Total material held by one colour.
    pub fn material_for(&self, colour: Colour) -> i32 {
        self.pieces_of(colour).map(|pp| pp.piece.value()).sum()
    }

    /// Is this colour's king attacked by the opposing team? A captured king
    /// is not "in check"; the searcher handles king-capture states before
    /// asking.
    pub fn is_king_in_check(&self, colour: Colour) -> bool {
        let Some(king_loc) = self.king_locs[colour.index()] else {
            return false;
        };
        let mut attackers = AttackerList::new();
        self.attackers_to(king_loc, &mut attackers);
        let enemy = colour.team().other();
        attackers.iter().any(|pp| pp.piece.team() == enemy)
    }

    /// Collect every piece, of either team, attacking `loc`.
    pub fn attackers_to(&self, loc: Loc, out: &mut AttackerList) {
        movegen::attackers_to_in(&self.grid, loc, out);
    }

    #[cfg(test)]
    pub(crate) fn grid_snapshot(&self) -> [Option<Piece>; crate::util::GRID_SQUARES] {
        self.grid
    }

    pub(crate) fn grid(&self) -> &[Option<Piece>; crate::util::GRID_SQUARES] {
        &self.grid
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let loc = Loc::new(row, col);
                if !loc.is_legal() {
                    write!(f, "  ")?;
                } else {
                    match self.grid[loc.index()] {
                        Some(p) => write!(f, "{} ", p.char())?,
                        None => write!(f, ". ")?,
                    }
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "{} to move", self.turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_has_full_armies() {
        let board = Board::startpos();
        for c in Colour::all() {
            assert_eq!(board.pieces_of(c).count(), 16);
            assert!(board.king_location(c).is_some());
        }
        assert_eq!(board.material(), 0);
    }

    #[test]
    fn make_undo_restores_hash_and_grid() {
        let mut board = Board::startpos();
        let before_hash = board.hash_key();
        let before_grid = board.grid_snapshot();
        let pawn = board.piece_at(Loc::new(12, 5)).unwrap();
        let m = Move::new(pawn, Loc::new(12, 5), Loc::new(11, 5), None);
        board.make_move(m);
        assert_ne!(board.hash_key(), before_hash);
        assert_eq!(board.turn(), Colour::Blue);
        board.undo_move();
        assert_eq!(board.hash_key(), before_hash);
        assert_eq!(board.grid_snapshot(), before_grid);
        assert_eq!(board.turn(), Colour::Red);
    }

    #[test]
    fn null_move_only_rotates_the_turn() {
        let mut board = Board::startpos();
        let before_hash = board.hash_key();
        board.make_null_move();
        assert_eq!(board.turn(), Colour::Blue);
        assert_ne!(board.hash_key(), before_hash);
        board.undo_null_move();
        assert_eq!(board.turn(), Colour::Red);
        assert_eq!(board.hash_key(), before_hash);
    }

    #[test]
    fn random_playout_unwinds_to_the_exact_start_state() {
        use crate::{board::movegen::MoveList, rng::XorShiftState};

        let mut board = Board::startpos();
        let start_hash = board.hash_key();
        let start_grid = board.grid_snapshot();
        let start_kings: Vec<_> = Colour::all().map(|c| board.king_location(c)).collect();
        let mut rng = XorShiftState::new();
        let mut made = 0usize;

        'playout: for _ in 0..60 {
            let mover = board.turn();
            let mut list = MoveList::new();
            board.generate_moves(&mut list);
            if list.is_empty() {
                break;
            }
            // random order, first legal move that is not a king capture
            let offset = (rng.next_u64() % list.len() as u64) as usize;
            for i in 0..list.len() {
                let m = list[(i + offset) % list.len()].mov;
                if m.captured().is_some_and(|p| p.piece_type() == PieceType::King) {
                    continue;
                }
                board.make_move(m);
                if board.is_king_in_check(mover) {
                    board.undo_move();
                    continue;
                }
                made += 1;
                continue 'playout;
            }
            break; // no legal move: leave the position as-is
        }

        assert!(made > 20, "playout fizzled after {made} moves");
        for _ in 0..made {
            board.undo_move();
        }
        assert_eq!(board.hash_key(), start_hash);
        assert_eq!(board.grid_snapshot(), start_grid);
        assert_eq!(board.turn(), Colour::Red);
        let end_kings: Vec<_> = Colour::all().map(|c| board.king_location(c)).collect();
        assert_eq!(start_kings, end_kings);
    }

    #[test]
    fn king_capture_ends_the_game() {
        let mut board = Board::empty();
        let red_rook = Piece::new(Colour::Red, PieceType::Rook);
        let blue_king = Piece::new(Colour::Blue, PieceType::King);
        board.set_piece(Loc::new(7, 3), red_rook);
        board.set_piece(Loc::new(7, 9), blue_king);
        let m = Move::new(red_rook, Loc::new(7, 3), Loc::new(7, 9), Some(blue_king));
        board.make_move(m);
        assert_eq!(board.game_result(), GameResult::WinRedYellow);
        board.undo_move();
        assert_eq!(board.game_result(), GameResult::InProgress);
        assert_eq!(board.king_location(Colour::Blue), Some(Loc::new(7, 9)));
    }
}
