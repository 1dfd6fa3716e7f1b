//! The team-relative static evaluator. Scores are centipawns from the
//! Red/Yellow point of view internally, negated on return when the
//! minimizing team is to move.

use crate::{
    board::{movegen::MoveList, Board, GameResult},
    lookups::{
        KING_ATTACKER_VALUES, KING_ATTACK_WEIGHT, KNIGHT_TO_KING, PIECE_IMBALANCE_TABLE,
        PIECE_SQUARE_TABLE,
    },
    options::EngineOptions,
    piece::{Colour, PieceType, Team, PIECE_VALUES},
    searchinfo::SearchCounters,
    threadlocal::ThreadData,
    util::{Loc, BOARD_SIZE},
};

/// The value of a proven win. Any score of this magnitude is terminal.
pub const MATE: i32 = 100_000_000;

/// Sentinel for "no static eval recorded on this stack frame / TT entry".
pub use crate::transpositiontable::EVAL_NONE;

const THREAT_VALUE: i32 = 120;
const ROOK_CENTRAL_BONUS: i32 = 50;
const ROOK_OPEN_BONUS: i32 = 25;
const KNIGHT_NEAR_KING_BONUS: i32 = 100;
const MULTI_QUEEN_BONUS: i32 = 200;
const ACTIVATION_EACH: i32 = 35;
const ACTIVATION_PAIR: i32 = 20;
const KING_SAFETY_LAZY_MARGIN: i32 = 600;

const ASYM_PIECE_EVAL_FACTOR: f32 = 0.05;
const ASYM_ACTIVATION_FACTOR: f32 = 0.0;
const ASYM_QUEEN_BONUS: i32 = 0;
#[allow(clippy::cast_possible_truncation)]
const ASYM_SECOND_QUEEN_BONUS: i32 =
    (0.5 * ASYM_PIECE_EVAL_FACTOR * PIECE_VALUES[PieceType::Queen as usize] as f32) as i32;
/// Material one team starts the game with.
const START_EVALUATION: i32 = 16 * PIECE_VALUES[PieceType::Pawn as usize]
    + 4 * PIECE_VALUES[PieceType::Knight as usize]
    + 4 * PIECE_VALUES[PieceType::Bishop as usize]
    + 4 * PIECE_VALUES[PieceType::Rook as usize]
    + 2 * PIECE_VALUES[PieceType::Queen as usize]
    + 2 * PIECE_VALUES[PieceType::King as usize];

/// Static evaluation from the maximizing player's point of view.
/// `alpha`/`beta` feed the lazy cut that skips king safety when the score is
/// already far outside the window.
#[allow(clippy::too_many_lines)]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn evaluate(
    t: &ThreadData,
    conf: &EngineOptions,
    counters: &SearchCounters,
    maximizing: bool,
    alpha: i32,
    beta: i32,
) -> i32 {
    let board = &t.board;
    let signed = |eval: i32| if maximizing { eval } else { -eval };

    match board.game_result() {
        GameResult::WinRedYellow => return signed(MATE),
        GameResult::WinBlueGreen => return signed(-MATE),
        GameResult::Stalemate => return 0,
        GameResult::InProgress => {}
    }

    let mut eval = board.material();

    let threat_value = |t1: i32, t2: i32| THREAT_VALUE * (t1 + t2);
    eval += threat_value(
        t.n_threats[Colour::Red.index()],
        t.n_threats[Colour::Yellow.index()],
    );
    eval -= threat_value(
        t.n_threats[Colour::Blue.index()],
        t.n_threats[Colour::Green.index()],
    );

    let mut n_queen_ry = 0;
    let mut n_queen_bg = 0;
    if conf.enable_piece_square_table || conf.enable_knight_bonus {
        for colour in Colour::all() {
            let ry = colour.team() == Team::RedYellow;
            for pp in board.pieces_of(colour) {
                let piece_type = pp.piece.piece_type();
                let (row, col) = (pp.loc.row(), pp.loc.col());

                match piece_type {
                    PieceType::Queen => {
                        if ry {
                            n_queen_ry += 1;
                        } else {
                            n_queen_bg += 1;
                        }
                    }
                    PieceType::Pawn => {
                        let advancement =
                            i32::from(crate::board::movegen::pawn_advancement(colour, pp.loc));
                        let mut bonus = 2 * advancement * advancement;
                        bonus += (150 * (advancement - 5)).max(0);
                        if ry {
                            eval += bonus;
                        } else {
                            eval -= bonus;
                        }
                    }
                    PieceType::Rook => {
                        let bonus = rook_bonus(board, colour, pp.loc);
                        if ry {
                            eval += bonus;
                        } else {
                            eval -= bonus;
                        }
                    }
                    _ => {}
                }

                if conf.enable_piece_square_table {
                    let v = PIECE_SQUARE_TABLE[colour.index()][piece_type.index()][pp.loc.index()];
                    if ry {
                        eval += v;
                    } else {
                        eval -= v;
                    }
                }

                if conf.enable_knight_bonus && piece_type == PieceType::Knight {
                    let mut bonus = 0;
                    for enemy in colour.team().other().colours() {
                        if let Some(king_loc) = board.king_location(enemy) {
                            if KNIGHT_TO_KING[pp.loc.index()][king_loc.index()] {
                                bonus += KNIGHT_NEAR_KING_BONUS;
                            }
                        }
                    }
                    if ry {
                        eval += bonus;
                    } else {
                        eval -= bonus;
                    }
                }
            }
        }
    }

    let mut activation_ry = 0;
    let mut activation_bg = 0;
    if conf.enable_piece_activation {
        let team_activation = |n1: i32, n2: i32| ACTIVATION_EACH * (n1 + n2) + ACTIVATION_PAIR * n1 * n2;
        activation_ry = team_activation(
            t.n_activated[Colour::Red.index()],
            t.n_activated[Colour::Yellow.index()],
        );
        activation_bg = team_activation(
            t.n_activated[Colour::Blue.index()],
            t.n_activated[Colour::Green.index()],
        );
        eval += activation_ry - activation_bg;
    }

    // Asymmetric style bonus for the configured team only; with no team
    // configured the evaluation stays symmetric.
    let asym_eval = |n_moves: i32, n_queen: i32, activation: i32, eval1: i32, eval2: i32| {
        let mut asym = n_queen * ASYM_QUEEN_BONUS;
        if n_queen >= 2 {
            asym += ASYM_SECOND_QUEEN_BONUS;
        }
        asym += (ASYM_ACTIVATION_FACTOR * activation as f32) as i32;
        asym += (ASYM_PIECE_EVAL_FACTOR * (eval1 + eval2) as f32) as i32;
        asym += n_moves / 2;
        // zero the bonus at the starting position
        asym -= ASYM_QUEEN_BONUS * 2 + ASYM_SECOND_QUEEN_BONUS;
        asym -= (ASYM_PIECE_EVAL_FACTOR * START_EVALUATION as f32) as i32;
        asym
    };

    match conf.engine_team.resolve(t.root_team) {
        Some(Team::RedYellow) => {
            eval += asym_eval(
                t.total_moves[Colour::Red.index()] + t.total_moves[Colour::Yellow.index()],
                n_queen_ry,
                activation_ry,
                board.material_for(Colour::Red),
                board.material_for(Colour::Yellow),
            );
        }
        Some(Team::BlueGreen) => {
            eval -= asym_eval(
                t.total_moves[Colour::Blue.index()] + t.total_moves[Colour::Green.index()],
                n_queen_bg,
                activation_bg,
                board.material_for(Colour::Blue),
                board.material_for(Colour::Green),
            );
        }
        None => {}
    }

    if n_queen_ry >= 2 {
        eval += MULTI_QUEEN_BONUS;
    }
    if n_queen_bg >= 2 {
        eval -= MULTI_QUEEN_BONUS;
    }

    if conf.enable_mobility_evaluation {
        eval += 2
            * (t.total_moves[Colour::Red.index()] + t.total_moves[Colour::Yellow.index()]
                - t.total_moves[Colour::Blue.index()]
                - t.total_moves[Colour::Green.index()]);
    }

    if conf.enable_piece_imbalance {
        let diff_ry = (num_major_pieces(board, Colour::Red)
            - num_major_pieces(board, Colour::Yellow))
        .unsigned_abs() as usize;
        let diff_bg = (num_major_pieces(board, Colour::Blue)
            - num_major_pieces(board, Colour::Green))
        .unsigned_abs() as usize;
        eval += PIECE_IMBALANCE_TABLE[diff_ry.min(15)] - PIECE_IMBALANCE_TABLE[diff_bg.min(15)];
    }

    // everything but king safety is in; bail out if the score is already far
    // outside the window
    if conf.enable_lazy_eval {
        let re = signed(eval);
        if re + KING_SAFETY_LAZY_MARGIN <= alpha || re >= beta + KING_SAFETY_LAZY_MARGIN {
            SearchCounters::bump(&counters.lazy_evals);
            return re;
        }
    }

    if conf.enable_king_safety {
        for colour in Colour::all() {
            let mut king_safety = 0;
            if let Some(king_loc) = board.king_location(colour) {
                let opponent_has_queen = match colour.team() {
                    Team::RedYellow => n_queen_bg > 0,
                    Team::BlueGreen => n_queen_ry > 0,
                };
                let mut safety = 0;

                if conf.enable_pawn_shield && opponent_has_queen {
                    let shield = has_shield(board, colour, king_loc);
                    let on_back = on_back_rank(king_loc);
                    if !shield {
                        safety -= 75;
                    }
                    if !on_back {
                        safety -= 50;
                    }
                    if !shield && !on_back {
                        safety -= 50;
                    }
                }

                if conf.enable_attacking_king_zone {
                    let mut attacker_colours = [0i32; Colour::COUNT];
                    let team = colour.team();
                    for dr in -1..=1 {
                        for dc in -1..=1 {
                            let loc = Loc::new(king_loc.row() + dr, king_loc.col() + dc);
                            if !loc.is_legal() || on_back_rank(loc) {
                                continue;
                            }
                            let mut attackers = crate::board::AttackerList::new();
                            board.attackers_to(loc, &mut attackers);
                            if attackers.is_empty() {
                                continue;
                            }
                            let mut value_of_attacks = 0;
                            let mut num_attackers = 0usize;
                            let mut value_of_protection = 0;
                            let mut num_protectors = 0usize;
                            for pp in &attackers {
                                if pp.piece.piece_type() == PieceType::King {
                                    continue;
                                }
                                let val = KING_ATTACKER_VALUES[pp.piece.piece_type().index()];
                                if pp.piece.team() == team {
                                    num_protectors += 1;
                                    value_of_protection += val;
                                } else {
                                    num_attackers += 1;
                                    value_of_attacks += val;
                                    if val > 0 {
                                        attacker_colours[pp.piece.colour().index()] += 1;
                                    }
                                }
                            }
                            let mut attack_zone =
                                value_of_attacks * KING_ATTACK_WEIGHT[num_attackers.min(29)] / 100;
                            attack_zone -= value_of_protection
                                * KING_ATTACK_WEIGHT[num_protectors.min(29)]
                                / 200;
                            safety -= attack_zone.max(0);
                        }
                    }

                    let num_attacker_colours =
                        attacker_colours.iter().filter(|&&n| n > 0).count();
                    if num_attacker_colours > 1 {
                        safety -= 150;
                    }
                    if !opponent_has_queen {
                        safety /= 2;
                    }
                    safety = safety.min(0);
                    king_safety += safety;
                }
            }
            match colour.team() {
                Team::RedYellow => eval += king_safety,
                Team::BlueGreen => eval -= king_safety,
            }
        }
    }

    signed(eval)
}

fn num_major_pieces(board: &Board, colour: Colour) -> i32 {
    board
        .pieces_of(colour)
        .filter(|pp| {
            !matches!(
                pp.piece.piece_type(),
                PieceType::Pawn | PieceType::King
            )
        })
        .count() as i32
}

/// Central rooks are strong; otherwise a rook wants its file/rank toward the
/// enemy side free of pawns.
fn rook_bonus(board: &Board, colour: Colour, loc: Loc) -> i32 {
    let (row, col) = (loc.row(), loc.col());
    if (4..=10).contains(&col) && (4..=10).contains(&row) {
        return ROOK_CENTRAL_BONUS;
    }
    let (dr, dc) = match colour {
        Colour::Red => (-1, 0),
        Colour::Yellow => (1, 0),
        Colour::Blue => (0, 1),
        Colour::Green => (0, -1),
    };
    for i in 1..7 {
        let probe = Loc::new(row + i * dr, col + i * dc);
        if probe.is_legal() {
            if let Some(piece) = board.piece_at(probe) {
                if piece.piece_type() == PieceType::Pawn {
                    return 0;
                }
            }
        }
    }
    ROOK_OPEN_BONUS
}

pub fn on_back_rank(loc: Loc) -> bool {
    loc.row() == 0 || loc.row() == BOARD_SIZE - 1 || loc.col() == 0 || loc.col() == BOARD_SIZE - 1
}

/// Three short rays toward the enemy side, each covered by board edge or a
/// friendly piece within two steps.
pub fn has_shield(board: &Board, colour: Colour, king_loc: Loc) -> bool {
    let ray_blocked = |dr: i8, dc: i8| {
        for i in 1..=2 {
            let loc = Loc::new(king_loc.row() + dr * i, king_loc.col() + dc * i);
            if !loc.is_legal() {
                return true;
            }
            if let Some(piece) = board.piece_at(loc) {
                if piece.colour() == colour {
                    return true;
                }
            }
        }
        false
    };
    match colour {
        Colour::Red => ray_blocked(-1, -1) && ray_blocked(-1, 0) && ray_blocked(-1, 1),
        Colour::Blue => ray_blocked(-1, 1) && ray_blocked(0, 1) && ray_blocked(1, 1),
        Colour::Yellow => ray_blocked(1, -1) && ray_blocked(1, 0) && ray_blocked(1, 1),
        Colour::Green => ray_blocked(-1, -1) && ray_blocked(0, -1) && ray_blocked(1, -1),
    }
}

/// Refresh one colour's mobility tallies: pseudo-legal move total, activated
/// pieces, and profitable captures (threats). Called for the mover after
/// every make, and for all four colours at the root.
pub fn update_mobility(t: &mut ThreadData, conf: &EngineOptions, colour: Colour) {
    let current_turn = t.board.turn();
    t.board.set_turn(colour);
    let mut moves = MoveList::new();
    t.board.generate_moves(&mut moves);
    t.total_moves[colour.index()] = moves.len() as i32;

    if conf.enable_piece_activation {
        let piece_activated = |piece_type: Option<PieceType>, loc: Option<Loc>, n_moves: i32| {
            let (Some(piece_type), Some(loc)) = (piece_type, loc) else {
                return false;
            };
            if piece_type == PieceType::Knight {
                // a knight is active so long as it has left the back rank
                let back = match colour {
                    Colour::Red => loc.row() == 13,
                    Colour::Yellow => loc.row() == 0,
                    Colour::Blue => loc.col() == 0,
                    Colour::Green => loc.col() == 13,
                };
                return !back;
            }
            n_moves >= crate::lookups::PIECE_ACTIVATION_THRESHOLD[piece_type.index()]
        };

        // moves for one piece arrive consecutively from the generator, so
        // activation is counted by watching the origin square change
        let mut last_loc: Option<Loc> = None;
        let mut last_piece_type: Option<PieceType> = None;
        let mut n_pieces_activated = 0;
        let mut n_moves = 0;
        let mut n_threats = 0;
        for entry in &moves {
            let m = entry.mov;
            let piece_type = m.piece().piece_type();

            if m.is_capture() && m.approx_see(&t.board) >= 100 {
                n_threats += 1;
            }

            // back-rank destinations count for neither mobility nor
            // activation
            let to = m.to();
            let skip = match colour {
                Colour::Red => to.row() >= 12,
                Colour::Yellow => to.row() <= 1,
                Colour::Blue => to.col() <= 1,
                Colour::Green => to.col() >= 12,
            };
            if skip {
                continue;
            }

            if matches!(
                piece_type,
                PieceType::Queen | PieceType::Rook | PieceType::Bishop | PieceType::Knight
            ) {
                if last_loc != Some(m.from()) {
                    if piece_activated(last_piece_type, last_loc, n_moves) {
                        n_pieces_activated += 1;
                    }
                    last_loc = Some(m.from());
                    last_piece_type = Some(piece_type);
                    n_moves = 0;
                }
                n_moves += 1;
            }
        }
        if piece_activated(last_piece_type, last_loc, n_moves) {
            n_pieces_activated += 1;
        }
        t.n_activated[colour.index()] = n_pieces_activated;
        t.n_threats[colour.index()] = n_threats;
    }

    t.board.set_turn(current_turn);
}

/// Recompute mobility tallies for all four colours.
pub fn reset_mobility(t: &mut ThreadData, conf: &EngineOptions) {
    if conf.enable_mobility_evaluation || conf.enable_piece_activation {
        for colour in Colour::all() {
            update_mobility(t, conf, colour);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{piece::Piece, pv::PvInfo};

    fn thread_for(board: Board) -> ThreadData {
        ThreadData::new(board, PvInfo::default(), None)
    }

    #[test]
    fn startpos_is_balanced_without_asymmetry() {
        let conf = EngineOptions::default();
        let counters = SearchCounters::default();
        let mut t = thread_for(Board::startpos());
        reset_mobility(&mut t, &conf);
        let for_ry = evaluate(&t, &conf, &counters, true, -MATE, MATE);
        let for_bg = evaluate(&t, &conf, &counters, false, -MATE, MATE);
        assert_eq!(for_ry, -for_bg);
        // symmetric position, symmetric score
        assert_eq!(for_ry, 0);
    }

    #[test]
    fn game_over_positions_evaluate_as_mate() {
        let conf = EngineOptions::default();
        let counters = SearchCounters::default();
        let mut board = Board::empty();
        let rook = Piece::new(Colour::Red, PieceType::Rook);
        let king = Piece::new(Colour::Blue, PieceType::King);
        board.set_piece(Loc::new(7, 3), rook);
        board.set_piece(Loc::new(7, 9), king);
        board.make_move(crate::chessmove::Move::new(
            rook,
            Loc::new(7, 3),
            Loc::new(7, 9),
            Some(king),
        ));
        let t = thread_for(board);
        assert_eq!(evaluate(&t, &conf, &counters, true, -MATE, MATE), MATE);
        assert_eq!(evaluate(&t, &conf, &counters, false, -MATE, MATE), -MATE);
    }

    #[test]
    fn material_advantage_shows_up_for_the_right_team() {
        let conf = EngineOptions::default();
        let counters = SearchCounters::default();
        let mut board = Board::empty();
        board.set_piece(Loc::new(13, 7), Piece::new(Colour::Red, PieceType::King));
        board.set_piece(Loc::new(0, 6), Piece::new(Colour::Yellow, PieceType::King));
        board.set_piece(Loc::new(6, 0), Piece::new(Colour::Blue, PieceType::King));
        board.set_piece(Loc::new(7, 13), Piece::new(Colour::Green, PieceType::King));
        board.set_piece(Loc::new(7, 7), Piece::new(Colour::Red, PieceType::Queen));
        let mut t = thread_for(board);
        reset_mobility(&mut t, &conf);
        let score = evaluate(&t, &conf, &counters, true, -MATE, MATE);
        assert!(score > 500, "queen up should evaluate well, got {score}");
    }

    #[test]
    fn lazy_eval_skips_king_safety_far_outside_the_window() {
        let mut conf = EngineOptions::default();
        conf.enable_lazy_eval = true;
        let counters = SearchCounters::default();
        let mut board = Board::empty();
        board.set_piece(Loc::new(13, 7), Piece::new(Colour::Red, PieceType::King));
        board.set_piece(Loc::new(6, 0), Piece::new(Colour::Blue, PieceType::King));
        board.set_piece(Loc::new(7, 7), Piece::new(Colour::Red, PieceType::Queen));
        board.set_piece(Loc::new(8, 8), Piece::new(Colour::Red, PieceType::Rook));
        let mut t = thread_for(board);
        reset_mobility(&mut t, &conf);
        // window far below the actual score: the margin test fires
        let before = counters.snapshot().lazy_evals;
        let _ = evaluate(&t, &conf, &counters, true, -MATE, -MATE + 10);
        assert!(counters.snapshot().lazy_evals > before);
    }

    #[test]
    fn pawn_shield_detection_tracks_cover() {
        let mut board = Board::empty();
        let king_loc = Loc::new(13, 7);
        board.set_piece(king_loc, Piece::new(Colour::Red, PieceType::King));
        assert!(!has_shield(&board, Colour::Red, king_loc));
        for dc in -1..=1 {
            board.set_piece(
                Loc::new(12, 7 + dc),
                Piece::new(Colour::Red, PieceType::Pawn),
            );
        }
        assert!(has_shield(&board, Colour::Red, king_loc));
    }

    #[test]
    fn mobility_update_counts_threats() {
        let conf = EngineOptions::default();
        let mut board = Board::empty();
        board.set_piece(Loc::new(9, 6), Piece::new(Colour::Red, PieceType::Knight));
        board.set_piece(Loc::new(7, 7), Piece::new(Colour::Green, PieceType::Rook));
        let mut t = thread_for(board);
        update_mobility(&mut t, &conf, Colour::Red);
        assert_eq!(t.n_threats[Colour::Red.index()], 1);
        assert!(t.total_moves[Colour::Red.index()] > 0);
    }
}
