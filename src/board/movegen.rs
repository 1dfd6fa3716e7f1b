use arrayvec::ArrayVec;

use crate::{
    chessmove::Move,
    piece::{Colour, Piece, PieceType, Team},
    util::{Loc, GRID_SQUARES},
};

use super::{AttackerList, Board, PlacedPiece};

/// Upper bound on pseudo-legal moves in one position. Exceeding it is a
/// generator bug and panics via `ArrayVec`.
pub const MAX_POSITION_MOVES: usize = 300;

#[derive(Clone, Copy, Debug)]
pub struct MoveListEntry {
    pub mov: Move,
    pub score: i32,
}

pub type MoveList = ArrayVec<MoveListEntry, MAX_POSITION_MOVES>;

pub const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

pub const KING_DELTAS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

pub const BISHOP_DIRS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
pub const ROOK_DIRS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// The direction this colour's pawns advance.
pub const fn pawn_forward(colour: Colour) -> (i8, i8) {
    match colour {
        Colour::Red => (-1, 0),
        Colour::Yellow => (1, 0),
        Colour::Blue => (0, 1),
        Colour::Green => (0, -1),
    }
}

/// The two diagonal-forward capture directions for this colour's pawns.
pub const fn pawn_captures(colour: Colour) -> [(i8, i8); 2] {
    match colour {
        Colour::Red => [(-1, -1), (-1, 1)],
        Colour::Yellow => [(1, -1), (1, 1)],
        Colour::Blue => [(-1, 1), (1, 1)],
        Colour::Green => [(-1, -1), (1, -1)],
    }
}

/// Squares advanced from the pawn's starting rank.
pub const fn pawn_advancement(colour: Colour, loc: Loc) -> i8 {
    match colour {
        Colour::Red => 12 - loc.row(),
        Colour::Yellow => loc.row() - 1,
        Colour::Blue => loc.col() - 1,
        Colour::Green => 12 - loc.col(),
    }
}

/// Pawns promote on reaching the far pawn rank.
pub const PROMOTION_ADVANCEMENT: i8 = 11;

type Grid = [Option<Piece>; GRID_SQUARES];

impl Board {
    /// Generate every pseudo-legal move for the side to move. Moves that
    /// leave the mover's own king in check ARE included; so are king
    /// captures. The searcher filters the former and scores the latter.
    pub fn generate_moves(&self, list: &mut MoveList) {
        let us = self.turn();
        for pp in self.pieces_of(us) {
            match pp.piece.piece_type() {
                PieceType::Pawn => self.generate_pawn_moves(pp, list),
                PieceType::Knight => self.generate_leaper_moves(pp, &KNIGHT_DELTAS, list),
                PieceType::King => self.generate_leaper_moves(pp, &KING_DELTAS, list),
                PieceType::Bishop => self.generate_slider_moves(pp, &BISHOP_DIRS, list),
                PieceType::Rook => self.generate_slider_moves(pp, &ROOK_DIRS, list),
                PieceType::Queen => {
                    self.generate_slider_moves(pp, &BISHOP_DIRS, list);
                    self.generate_slider_moves(pp, &ROOK_DIRS, list);
                }
            }
        }
    }

    fn push(list: &mut MoveList, mov: Move) {
        list.push(MoveListEntry { mov, score: 0 });
    }

    fn generate_pawn_moves(&self, pp: PlacedPiece, list: &mut MoveList) {
        let colour = pp.piece.colour();
        let (dr, dc) = pawn_forward(colour);
        let make = |to: Loc, captured: Option<Piece>| {
            if pawn_advancement(colour, to) >= PROMOTION_ADVANCEMENT {
                Move::new_promotion(pp.piece, pp.loc, to, captured)
            } else {
                Move::new(pp.piece, pp.loc, to, captured)
            }
        };
        if let Some(one) = pp.loc.offset(dr, dc) {
            if self.piece_at(one).is_none() {
                Self::push(list, make(one, None));
                if pawn_advancement(colour, pp.loc) == 0 {
                    if let Some(two) = one.offset(dr, dc) {
                        if self.piece_at(two).is_none() {
                            Self::push(list, make(two, None));
                        }
                    }
                }
            }
        }
        for (cr, cc) in pawn_captures(colour) {
            if let Some(to) = pp.loc.offset(cr, cc) {
                if let Some(target) = self.piece_at(to) {
                    if target.team() != pp.piece.team() {
                        Self::push(list, make(to, Some(target)));
                    }
                }
            }
        }
    }

    fn generate_leaper_moves(&self, pp: PlacedPiece, deltas: &[(i8, i8)], list: &mut MoveList) {
        for &(dr, dc) in deltas {
            if let Some(to) = pp.loc.offset(dr, dc) {
                match self.piece_at(to) {
                    None => Self::push(list, Move::new(pp.piece, pp.loc, to, None)),
                    Some(target) if target.team() != pp.piece.team() => {
                        Self::push(list, Move::new(pp.piece, pp.loc, to, Some(target)));
                    }
                    Some(_) => {}
                }
            }
        }
    }

    fn generate_slider_moves(&self, pp: PlacedPiece, dirs: &[(i8, i8)], list: &mut MoveList) {
        for &(dr, dc) in dirs {
            let mut to = pp.loc;
            while let Some(next) = to.offset(dr, dc) {
                to = next;
                match self.piece_at(to) {
                    None => Self::push(list, Move::new(pp.piece, pp.loc, to, None)),
                    Some(target) => {
                        if target.team() != pp.piece.team() {
                            Self::push(list, Move::new(pp.piece, pp.loc, to, Some(target)));
                        }
                        break;
                    }
                }
            }
        }
    }

    /// Could `m` have been generated in this exact position? Used to vet
    /// transposition-table hints and killers carried over from sibling
    /// positions.
    pub fn is_pseudo_legal(&self, m: Move) -> bool {
        if m.piece().colour() != self.turn() {
            return false;
        }
        if !m.from().is_legal() || !m.to().is_legal() {
            return false;
        }
        if self.piece_at(m.from()) != Some(m.piece()) {
            return false;
        }
        if self.piece_at(m.to()) != m.captured() {
            return false;
        }
        if let Some(captured) = m.captured() {
            if captured.team() == m.piece().team() {
                return false;
            }
        }
        let dr = m.to().row() - m.from().row();
        let dc = m.to().col() - m.from().col();
        match m.piece().piece_type() {
            PieceType::Pawn => {
                let colour = m.piece().colour();
                let promotes =
                    pawn_advancement(colour, m.to()) >= PROMOTION_ADVANCEMENT;
                if promotes != m.is_promotion() {
                    return false;
                }
                let (fr, fc) = pawn_forward(colour);
                if m.is_capture() {
                    pawn_captures(colour).contains(&(dr, dc))
                } else if (dr, dc) == (fr, fc) {
                    true
                } else if (dr, dc) == (2 * fr, 2 * fc) {
                    pawn_advancement(colour, m.from()) == 0
                        && m.from()
                            .offset(fr, fc)
                            .is_some_and(|mid| self.piece_at(mid).is_none())
                } else {
                    false
                }
            }
            PieceType::Knight => KNIGHT_DELTAS.contains(&(dr, dc)),
            PieceType::King => dr.abs() <= 1 && dc.abs() <= 1 && (dr, dc) != (0, 0),
            PieceType::Bishop => dr.abs() == dc.abs() && dr != 0 && self.ray_clear(m.from(), m.to()),
            PieceType::Rook => {
                (dr == 0) != (dc == 0) && self.ray_clear(m.from(), m.to())
            }
            PieceType::Queen => {
                (dr.abs() == dc.abs() && dr != 0 || (dr == 0) != (dc == 0))
                    && self.ray_clear(m.from(), m.to())
            }
        }
    }

    /// Rebuild a full move from bare from/to squares (as stored in the
    /// transposition table) against the current position. Returns `None` if
    /// no pseudo-legal move matches.
    pub fn move_from_parts(&self, from: Loc, to: Loc) -> Option<Move> {
        if !from.is_legal() || !to.is_legal() {
            return None;
        }
        let piece = self.piece_at(from)?;
        let captured = self.piece_at(to);
        let m = if piece.piece_type() == PieceType::Pawn
            && pawn_advancement(piece.colour(), to) >= PROMOTION_ADVANCEMENT
        {
            Move::new_promotion(piece, from, to, captured)
        } else {
            Move::new(piece, from, to, captured)
        };
        self.is_pseudo_legal(m).then_some(m)
    }

    fn ray_clear(&self, from: Loc, to: Loc) -> bool {
        let dr = (to.row() - from.row()).signum();
        let dc = (to.col() - from.col()).signum();
        let mut cur = from;
        loop {
            let Some(next) = cur.offset(dr, dc) else {
                // the ray left the board before reaching `to`, so a corner
                // void interrupts the line
                return false;
            };
            cur = next;
            if cur == to {
                return true;
            }
            if self.piece_at(cur).is_some() {
                return false;
            }
        }
    }

    /// Would this move, once made, leave the mover attacking an enemy king?
    /// Discovered checks are not counted.
    pub fn move_gives_check(&self, m: Move) -> bool {
        let mut grid = *self.grid();
        grid[m.from().index()] = None;
        let placed = if m.is_promotion() {
            Piece::new(m.piece().colour(), PieceType::Queen)
        } else {
            m.piece()
        };
        grid[m.to().index()] = Some(placed);
        let enemy = m.piece().team().other();
        for colour in enemy.colours() {
            // the king may be the capture target itself
            if m.captured().is_some_and(|captured| {
                captured.piece_type() == PieceType::King && captured.colour() == colour
            }) {
                continue;
            }
            if let Some(king_loc) = self.king_location(colour) {
                if piece_attacks_in(&grid, placed, m.to(), king_loc) {
                    return true;
                }
            }
        }
        false
    }

    /// Swap-off static exchange evaluation of a capture (or quiet move onto a
    /// contested square): the net material outcome of the ensuing capture
    /// sequence with both teams recapturing least-valuable-attacker first.
    pub fn static_exchange_eval(&self, m: Move) -> i32 {
        let mut grid = *self.grid();
        let to = m.to();
        grid[m.from().index()] = None;
        grid[to.index()] = Some(m.piece());

        let mut gain = [0i32; 32];
        let mut depth = 0usize;
        gain[0] = m.captured().map_or(0, Piece::value);
        let mut occupant_value = m.piece().value();
        let mut side = m.piece().team().other();

        loop {
            let Some(attacker) = least_valuable_attacker_in(&grid, to, side) else {
                break;
            };
            depth += 1;
            gain[depth] = occupant_value - gain[depth - 1];
            // neither side is forced to keep capturing at a loss
            if gain[depth].max(-gain[depth - 1]) < 0 {
                break;
            }
            occupant_value = attacker.piece.value();
            grid[attacker.loc.index()] = None;
            grid[to.index()] = Some(attacker.piece);
            side = side.other();
        }

        while depth > 0 {
            gain[depth - 1] = -((-gain[depth - 1]).max(gain[depth]));
            depth -= 1;
        }
        gain[0]
    }
}

/// Does `piece`, standing on `from` in `grid`, attack `target`?
fn piece_attacks_in(grid: &Grid, piece: Piece, from: Loc, target: Loc) -> bool {
    let dr = target.row() - from.row();
    let dc = target.col() - from.col();
    match piece.piece_type() {
        PieceType::Pawn => pawn_captures(piece.colour()).contains(&(dr, dc)),
        PieceType::Knight => KNIGHT_DELTAS.contains(&(dr, dc)),
        PieceType::King => dr.abs() <= 1 && dc.abs() <= 1 && (dr, dc) != (0, 0),
        PieceType::Bishop => dr.abs() == dc.abs() && dr != 0 && ray_clear_in(grid, from, target),
        PieceType::Rook => (dr == 0) != (dc == 0) && ray_clear_in(grid, from, target),
        PieceType::Queen => {
            (dr.abs() == dc.abs() && dr != 0 || (dr == 0) != (dc == 0))
                && ray_clear_in(grid, from, target)
        }
    }
}

fn ray_clear_in(grid: &Grid, from: Loc, to: Loc) -> bool {
    let dr = (to.row() - from.row()).signum();
    let dc = (to.col() - from.col()).signum();
    let mut cur = from;
    loop {
        let Some(next) = cur.offset(dr, dc) else {
            return false;
        };
        cur = next;
        if cur == to {
            return true;
        }
        if grid[cur.index()].is_some() {
            return false;
        }
    }
}

/// Every piece, of either team, attacking `loc` in `grid`. Knights are
/// looked up by jump squares; everything else comes off outward ray scans,
/// so sliders revealed later by removals are found on a rescan.
pub(crate) fn attackers_to_in(grid: &Grid, loc: Loc, out: &mut AttackerList) {
    out.clear();
    for (dr, dc) in KNIGHT_DELTAS {
        if let Some(from) = loc.offset(dr, dc) {
            if let Some(piece) = grid[from.index()] {
                if piece.piece_type() == PieceType::Knight {
                    out.push(PlacedPiece { loc: from, piece });
                }
            }
        }
    }
    for (dr, dc) in KING_DELTAS {
        let diagonal = dr != 0 && dc != 0;
        let mut dist = 0i8;
        let mut cur = loc;
        while let Some(next) = cur.offset(dr, dc) {
            cur = next;
            dist += 1;
            let Some(piece) = grid[cur.index()] else {
                continue;
            };
            let attacks = match piece.piece_type() {
                PieceType::King => dist == 1,
                PieceType::Pawn => {
                    // the pawn on `cur` hits `loc` if one of its capture
                    // steps is the reverse of this scan direction
                    dist == 1 && pawn_captures(piece.colour()).contains(&(-dr, -dc))
                }
                PieceType::Bishop => diagonal,
                PieceType::Rook => !diagonal,
                PieceType::Queen => true,
                PieceType::Knight => false,
            };
            if attacks {
                out.push(PlacedPiece { loc: cur, piece });
            }
            break;
        }
    }
}

fn least_valuable_attacker_in(grid: &Grid, loc: Loc, side: Team) -> Option<PlacedPiece> {
    let mut attackers = AttackerList::new();
    attackers_to_in(grid, loc, &mut attackers);
    attackers
        .into_iter()
        .filter(|pp| pp.piece.team() == side)
        .min_by_key(|pp| pp.piece.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(board: &mut Board, colour: Colour, pt: PieceType, row: i8, col: i8) {
        board.set_piece(Loc::new(row, col), Piece::new(colour, pt));
    }

    #[test]
    fn startpos_move_counts_are_plausible() {
        let board = Board::startpos();
        let mut list = MoveList::new();
        board.generate_moves(&mut list);
        // 8 single pushes + 8 double pushes + 2x2 knight moves
        assert_eq!(list.len(), 20);
    }

    #[test]
    fn sliders_stop_at_blockers_and_capture_enemies() {
        let mut board = Board::empty();
        put(&mut board, Colour::Red, PieceType::Rook, 7, 3);
        put(&mut board, Colour::Yellow, PieceType::Pawn, 7, 6);
        put(&mut board, Colour::Blue, PieceType::Pawn, 7, 10);
        board.set_turn(Colour::Red);
        let mut list = MoveList::new();
        board.generate_moves(&mut list);
        let rook_moves: Vec<_> = list
            .iter()
            .filter(|e| e.mov.piece().piece_type() == PieceType::Rook)
            .collect();
        // right: 2 squares then blocked by partner pawn; cannot capture it
        assert!(rook_moves
            .iter()
            .all(|e| e.mov.to() != Loc::new(7, 6)));
        // the partner pawn has its own moves; the blue pawn is not reachable
        assert!(rook_moves.iter().all(|e| e.mov.to() != Loc::new(7, 10)));
    }

    #[test]
    fn pawns_advance_capture_and_promote_per_colour() {
        let mut board = Board::empty();
        put(&mut board, Colour::Blue, PieceType::Pawn, 5, 11);
        put(&mut board, Colour::Red, PieceType::Knight, 4, 12);
        board.set_turn(Colour::Blue);
        let mut list = MoveList::new();
        board.generate_moves(&mut list);
        // push to col 12 promotes (advancement 11), capture to (4,12) promotes
        let promos: Vec<_> = list.iter().filter(|e| e.mov.is_promotion()).collect();
        assert_eq!(promos.len(), 2);
        assert!(promos.iter().any(|e| e.mov.is_capture()));
    }

    #[test]
    fn attackers_include_rays_knights_and_pawns() {
        let mut board = Board::empty();
        let target = Loc::new(7, 7);
        put(&mut board, Colour::Red, PieceType::Rook, 7, 3);
        put(&mut board, Colour::Blue, PieceType::Knight, 5, 6);
        put(&mut board, Colour::Green, PieceType::Pawn, 8, 8);
        put(&mut board, Colour::Yellow, PieceType::Bishop, 4, 4);
        let mut attackers = AttackerList::new();
        board.attackers_to(target, &mut attackers);
        let types: Vec<_> = attackers.iter().map(|pp| pp.piece.piece_type()).collect();
        assert!(types.contains(&PieceType::Rook));
        assert!(types.contains(&PieceType::Knight));
        assert!(types.contains(&PieceType::Bishop));
        // green pawns capture toward lower columns
        assert!(types.contains(&PieceType::Pawn));
        assert_eq!(attackers.len(), 4);
    }

    #[test]
    fn see_values_a_defended_pawn_capture_correctly() {
        let mut board = Board::empty();
        put(&mut board, Colour::Red, PieceType::Queen, 10, 7);
        put(&mut board, Colour::Blue, PieceType::Pawn, 7, 7);
        put(&mut board, Colour::Blue, PieceType::Rook, 3, 7);
        board.set_turn(Colour::Red);
        let queen = board.piece_at(Loc::new(10, 7)).unwrap();
        let pawn = board.piece_at(Loc::new(7, 7)).unwrap();
        let m = Move::new(queen, Loc::new(10, 7), Loc::new(7, 7), Some(pawn));
        // QxP, RxQ: pawn gained, queen lost
        assert_eq!(board.static_exchange_eval(m), 100 - 1000);
    }

    #[test]
    fn see_likes_an_undefended_capture() {
        let mut board = Board::empty();
        put(&mut board, Colour::Red, PieceType::Knight, 9, 6);
        put(&mut board, Colour::Green, PieceType::Rook, 7, 7);
        board.set_turn(Colour::Red);
        let knight = board.piece_at(Loc::new(9, 6)).unwrap();
        let rook = board.piece_at(Loc::new(7, 7)).unwrap();
        let m = Move::new(knight, Loc::new(9, 6), Loc::new(7, 7), Some(rook));
        assert_eq!(board.static_exchange_eval(m), 500);
    }

    #[test]
    fn check_detection_sees_team_attacks_only() {
        let mut board = Board::empty();
        put(&mut board, Colour::Blue, PieceType::King, 7, 7);
        put(&mut board, Colour::Red, PieceType::Rook, 7, 3);
        assert!(board.is_king_in_check(Colour::Blue));
        // a partner piece never checks
        let mut board2 = Board::empty();
        put(&mut board2, Colour::Blue, PieceType::King, 7, 7);
        put(&mut board2, Colour::Green, PieceType::Rook, 7, 3);
        assert!(!board2.is_king_in_check(Colour::Blue));
    }

    #[test]
    fn delivers_check_sees_direct_attacks_from_destination() {
        let mut board = Board::empty();
        put(&mut board, Colour::Red, PieceType::Rook, 10, 5);
        put(&mut board, Colour::Blue, PieceType::King, 7, 7);
        board.set_turn(Colour::Red);
        let rook = board.piece_at(Loc::new(10, 5)).unwrap();
        let checking = Move::new(rook, Loc::new(10, 5), Loc::new(10, 7), None);
        let quiet = Move::new(rook, Loc::new(10, 5), Loc::new(9, 5), None);
        assert!(checking.delivers_check(&board));
        assert!(!quiet.delivers_check(&board));
    }

    #[test]
    fn tt_move_reconstruction_round_trips() {
        let board = Board::startpos();
        let mut list = MoveList::new();
        board.generate_moves(&mut list);
        for entry in &list {
            let rebuilt = board.move_from_parts(entry.mov.from(), entry.mov.to());
            assert_eq!(rebuilt, Some(entry.mov));
        }
        assert!(board
            .move_from_parts(Loc::new(13, 3), Loc::new(5, 5))
            .is_none());
    }
}
