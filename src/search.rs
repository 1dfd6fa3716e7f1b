//! Negamax alpha-beta with quiescence, plus the iterative-deepening
//! aspiration driver that feeds it.

use arrayvec::ArrayVec;

use crate::{
    board::{movegen::MAX_POSITION_MOVES, GameResult},
    chessmove::Move,
    engine::Engine,
    evaluation::{evaluate, update_mobility},
    historytable::ContHistIndex,
    movepicker::{MovePicker, PickerFlags},
    piece::{PieceType, Team},
    pv::PvInfo,
    searchinfo::SearchCounters,
    stack::STACK_GUARD,
    threadlocal::ThreadData,
    transpositiontable::{Bound, TTHit, EVAL_NONE},
    util::MAX_PLY,
};

pub use crate::evaluation::MATE;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeType {
    NonPv,
    Pv,
    Root,
}

impl NodeType {
    const fn is_pv(self) -> bool {
        !matches!(self, Self::NonPv)
    }
}

/// History bonuses double with depth; the shift is capped well past the
/// point where every consumer clamps anyway.
fn stat_bonus(depth: i32, fail_high: bool) -> i32 {
    1 << (depth + i32::from(fail_high)).clamp(0, 20)
}

impl Engine {
    fn cancelled(&self, t: &ThreadData) -> bool {
        self.is_cancel_flag_set()
            || t.deadline
                .is_some_and(|deadline| std::time::Instant::now() >= deadline)
    }

    fn picker_flags(&self) -> PickerFlags {
        PickerFlags {
            order: self.options().enable_move_order,
            order_checks: self.options().enable_move_order_checks,
        }
    }

    fn validated_tt_move(&self, t: &ThreadData, entry: &TTHit) -> Option<Move> {
        entry
            .mov
            .and_then(|(from, to)| t.board.move_from_parts(from, to))
    }

    /// The negamax alpha-beta search. Returns `None` only on cancellation or
    /// deadline expiry; every other outcome is a score and (optionally) a
    /// best move.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    pub(crate) fn search(
        &self,
        t: &mut ThreadData,
        ss: usize,
        node_type: NodeType,
        ply: i32,
        depth: i32,
        mut alpha: i32,
        beta: i32,
        maximizing: bool,
        expanded: i32,
        pvinfo: &mut PvInfo,
        null_moves: i32,
        is_cut_node: bool,
    ) -> Option<(i32, Option<Move>)> {
        let mut depth = depth.max(0);
        if self.cancelled(t) {
            return None;
        }

        SearchCounters::bump(&self.counters().nodes);

        let is_root_node = ply == 1;
        let is_pv_node = node_type.is_pv();
        let player = t.board.turn();

        if ss >= STACK_GUARD + MAX_PLY {
            return Some((
                evaluate(t, self.options(), self.counters(), maximizing, alpha, beta),
                None,
            ));
        }

        if depth <= 0 {
            if self.options().enable_qsearch {
                let qtype = if is_pv_node {
                    NodeType::Pv
                } else {
                    NodeType::NonPv
                };
                return self.qsearch(t, ss, qtype, 0, alpha, beta, maximizing, pvinfo);
            }
            let eval = evaluate(t, self.options(), self.counters(), maximizing, alpha, beta);
            if let Some(tt) = self.tt() {
                tt.save(t.board.hash_key(), 0, None, 0, eval, Bound::Exact, is_pv_node);
            }
            return Some((eval, None));
        }

        let mut is_tt_pv = false;
        let mut tt_hit: Option<TTHit> = None;
        let mut tt_move: Option<Move> = None;
        if let Some(tt) = self.tt() {
            let key = t.board.hash_key();
            if let Some(entry) = tt.probe(key) {
                if entry.depth >= depth {
                    SearchCounters::bump(&self.counters().tt_hits);
                    // early cutoff at non-root non-PV nodes
                    if !is_root_node
                        && !is_pv_node
                        && (entry.bound == Bound::Exact
                            || (entry.bound == Bound::Lower && entry.score >= beta)
                            || (entry.bound == Bound::Upper && entry.score <= alpha))
                    {
                        let mov = self.validated_tt_move(t, &entry);
                        return Some((entry.score.clamp(alpha, beta), mov));
                    }
                }
                tt_move = self.validated_tt_move(t, &entry);
                is_tt_pv = entry.is_pv;
                tt_hit = Some(entry);
            }
        }

        t.ss[ss - 1].reduction = 0;

        let in_check = t.board.is_king_in_check(player);
        let partner_checked = t.board.is_king_in_check(player.partner());
        let team_checked = in_check || partner_checked;
        t.ss[ss].in_check = team_checked;

        let mut improving = false;
        let mut declining = false;
        let eval;
        let do_move_level_pruning = !team_checked;

        if team_checked {
            // no static eval while in check; borrow the one from two plies up
            eval = t.ss[ss - 2].static_eval;
            t.ss[ss].static_eval = eval;
        } else if let Some(entry) = &tt_hit {
            eval = if entry.eval == EVAL_NONE {
                evaluate(t, self.options(), self.counters(), maximizing, alpha, beta)
            } else {
                entry.eval
            };
            t.ss[ss].static_eval = eval;
        } else {
            eval = evaluate(t, self.options(), self.counters(), maximizing, alpha, beta);
            t.ss[ss].static_eval = eval;
            if let Some(tt) = self.tt() {
                tt.save(
                    t.board.hash_key(),
                    depth,
                    None,
                    0,
                    eval,
                    Bound::Exact,
                    is_pv_node,
                );
            }
        }

        t.ss[ss + 2].killers = [None, None];
        t.ss[ss].move_count = 0;
        if ply == 1 {
            t.ss[ss].root_depth = depth;
        }
        t.ss[ss + 1].root_depth = t.ss[ss].root_depth;

        if do_move_level_pruning {
            improving = ply > 2
                && t.ss[ss - 2].static_eval != EVAL_NONE
                && t.ss[ss - 2].static_eval < t.ss[ss].static_eval;
            declining = ply > 1
                && -t.ss[ss - 1].static_eval < t.ss[ss].static_eval
                && t.ss[ss - 1].static_eval != EVAL_NONE;

            if !is_pv_node {
                // reverse futility: a comfortable static margin over beta at
                // shallow depth fails high without searching
                if self.options().enable_futility_pruning
                    && !is_tt_pv
                    && depth <= 2 - i32::from(improving)
                    && eval - 150 * depth >= beta
                    && eval < MATE
                {
                    return Some((beta, None));
                }

                if self.options().enable_null_move_pruning
                    && !is_root_node
                    && null_moves == 0
                    && eval >= beta + 50
                {
                    SearchCounters::bump(&self.counters().null_moves_tried);
                    t.ss[ss].cont_hist = None;
                    t.ss[ss].current_move = None;
                    t.board.make_null_move();
                    let mut null_pv = PvInfo::default();
                    let r = (depth / 3 + 2).min(depth);
                    let nmp_result = self.search(
                        t,
                        ss + 1,
                        NodeType::NonPv,
                        ply + 1,
                        depth - r,
                        -beta,
                        -beta + 1,
                        !maximizing,
                        expanded,
                        &mut null_pv,
                        null_moves + 1,
                        false,
                    );
                    t.board.undo_null_move();
                    if let Some((child_score, _)) = nmp_result {
                        let nmp_score = -child_score;
                        if depth >= 256 {
                            // verification re-search for very deep nodes was
                            // removed; the gate stays, dormant
                        } else if nmp_score >= beta && nmp_score < MATE {
                            // don't trust an unproven mate score
                            SearchCounters::bump(&self.counters().null_moves_pruned);
                            return Some((beta, None));
                        }
                    }
                }
            }

            // internal iterative deepening
            if depth >= 9 && tt_move.is_none() {
                depth -= 1 + i32::from(is_cut_node);
            }
        }

        let mut best_move: Option<Move> = None;
        let player_colour = player.index();
        let curr_n_activated = t.n_activated[player_colour];
        let curr_total_moves = t.total_moves[player_colour];

        let cont_indices = [
            t.ss[ss - 1].cont_hist,
            t.ss[ss - 2].cont_hist,
            t.ss[ss - 3].cont_hist,
            t.ss[ss - 4].cont_hist,
            t.ss[ss - 5].cont_hist,
        ];

        let pv_move = pvinfo.best_move();
        let killers = if self.options().enable_killers {
            t.ss[ss].killers
        } else {
            [None, None]
        };
        let counter = if self.options().enable_counter_move_heuristic {
            t.ss[ss - 1]
                .current_move
                .and_then(|prev| t.counter_moves.get(prev))
        } else {
            None
        };
        let mut picker = MovePicker::new(
            pv_move.or(tt_move),
            killers,
            counter,
            true,
            self.picker_flags(),
            cont_indices,
        );

        let mut has_legal_moves = false;
        let mut move_count = 0;
        let mut quiets = 0;
        let mut fail_low = true;
        let mut fail_high = false;
        let mut searched_moves: ArrayVec<Move, MAX_POSITION_MOVES> = ArrayVec::new();

        while let Some(m) = picker.next(t) {
            let piece_type = m.piece().piece_type();

            // has to be asked before the move is made
            let delivers_check = m.delivers_check(&t.board);

            let lmr = self.options().enable_late_move_reduction
                && depth > 1
                && move_count > 1 + i32::from(is_root_node) + i32::from(is_pv_node)
                && (!is_tt_pv
                    || !m.is_capture()
                    || (is_cut_node && t.ss[ss - 1].move_count > 1));

            let quiet = !in_check && !m.is_capture() && !delivers_check;

            // late-move pruning threshold
            let mut q = 1 + depth * depth / if declining { 10 } else { 5 };
            if is_pv_node {
                q = 5 + depth * depth / if declining { 2 } else { 1 };
                if improving {
                    q *= 2;
                }
            }

            if self.options().enable_late_move_pruning
                && alpha > -MATE
                && quiet
                && quiets >= q
            {
                SearchCounters::bump(&self.counters().late_moves_pruned);
                continue;
            }

            let is_killer =
                t.ss[ss].killers[0] == Some(m) || t.ss[ss].killers[1] == Some(m);

            let mut r = 1 + ((depth - 5) / 3).max(0) + move_count / 30;
            if quiet {
                r += 1;
                // reduce harder the deeper we are
                r += depth / 8;
            }
            r -= i32::from(is_killer);
            // static eval far from alpha: this node is probably decided
            r += ((eval - alpha).abs() / 350).min(2);
            r -= i32::from(is_tt_pv);
            if is_cut_node {
                r += 2;
            }
            r -= i32::from(declining) - i32::from(!improving);
            r -= i32::from(in_check);
            r -= i32::from(delivers_check);
            r -= i32::from(is_pv_node);
            r -= i32::from(m.is_capture() && m.approx_see(&t.board) > 0);
            let history_score = if m.is_capture() {
                t.capture_history.get(m)
            } else {
                t.history.get(piece_type, m.from(), m.to())
            };
            r -= ((history_score - 4000) / 10000).clamp(-3, 3);
            // negative reduction (a light extension) is allowed until the
            // line runs past the root depth
            r = r.max(if ply >= t.ss[ss].root_depth { 0 } else { -1 });

            let new_depth = depth - 1;
            let lmr_depth = if lmr { (new_depth - r).max(0) } else { new_depth };

            // futility pruning of late captures
            if !is_root_node
                && !is_pv_node
                && alpha > -MATE
                && lmr
                && m.is_capture()
                && lmr_depth < 10
                && !in_check
            {
                let captured_value = m.captured().map_or(0, |p| p.value());
                let futility_eval = eval + 400 + 291 * lmr_depth + captured_value;
                if futility_eval < alpha {
                    SearchCounters::bump(&self.counters().futility_pruned);
                    continue;
                }
            }

            t.ss[ss].current_move = Some(m);
            t.ss[ss].cont_hist = Some(ContHistIndex {
                in_check: team_checked,
                is_capture: m.is_capture(),
                piece: piece_type,
                to: m.to(),
            });

            t.board.make_move(m);

            if t.board.game_result() != GameResult::InProgress {
                // took a king: nothing refutes that
                t.board.undo_move();
                alpha = beta;
                best_move = Some(m);
                pvinfo.set_best_move(m);
                break;
            }

            if t.board.is_king_in_check(player) {
                t.board.undo_move();
                continue;
            }

            has_legal_moves = true;
            t.ss[ss].move_count = move_count;
            move_count += 1;
            if quiet {
                quiets += 1;
            }

            if self.options().enable_mobility_evaluation || self.options().enable_piece_activation
            {
                update_mobility(t, self.options(), player);
            }

            let is_pv_move = pv_move == Some(m);
            let mut child_pv = if is_pv_move {
                pvinfo.child().cloned().unwrap_or_default()
            } else {
                PvInfo::default()
            };

            let mut e = 0;
            if self.options().enable_check_extensions
                && (in_check || (delivers_check && move_count < 6 && expanded < 4))
            {
                SearchCounters::bump(&self.counters().check_extensions);
                e = 1;
            }

            let mut child_result: Option<(i32, Option<Move>)> = None;
            if lmr {
                SearchCounters::bump(&self.counters().lmr_searches);
                let r = r.clamp(0, depth - 1);

                t.ss[ss].reduction = depth - 1 + e;
                child_result = self.search(
                    t,
                    ss + 1,
                    NodeType::NonPv,
                    ply + 1,
                    depth - 1 - r + e,
                    -alpha - 1,
                    -alpha,
                    !maximizing,
                    expanded + e,
                    &mut child_pv,
                    0,
                    true,
                );
                t.ss[ss].reduction = 0;

                // TODO: this reduced probe is issued twice back to back and
                // only the second result is kept; remove the duplicate once
                // match testing confirms parity.
                child_result = self.search(
                    t,
                    ss + 1,
                    NodeType::NonPv,
                    ply + 1,
                    depth - 1 - r + e,
                    -alpha - 1,
                    -alpha,
                    !maximizing,
                    expanded + e,
                    &mut child_pv,
                    0,
                    true,
                );
                if let Some((child_score, _)) = child_result {
                    if r > 0 && -child_score > alpha {
                        SearchCounters::bump(&self.counters().lmr_researches);
                        child_result = self.search(
                            t,
                            ss + 1,
                            NodeType::NonPv,
                            ply + 1,
                            depth - 1 + e,
                            -alpha - 1,
                            -alpha,
                            !maximizing,
                            expanded + e,
                            &mut child_pv,
                            0,
                            !is_cut_node,
                        );
                    }
                }
            } else if !is_pv_node || move_count > 1 {
                let mut r = r;
                if tt_move.is_none() {
                    r += 2;
                }
                // the one-ply trim on heavily reduced null-window probes is
                // part of the reduction scheme, so it obeys the same switch
                let trim = i32::from(self.options().enable_late_move_reduction && r > 3);
                child_result = self.search(
                    t,
                    ss + 1,
                    NodeType::NonPv,
                    ply + 1,
                    depth - 1 + e - trim,
                    -alpha - 1,
                    -alpha,
                    !maximizing,
                    expanded + e,
                    &mut child_pv,
                    0,
                    !is_cut_node,
                );
            }

            // PV nodes search the first move, and any move whose null-window
            // probe raised alpha without reaching beta (the root always
            // re-searches on a raise), with the full window.
            let full_search = is_pv_node
                && (move_count == 1
                    || child_result.is_some_and(|(child_score, _)| {
                        let score = -child_score;
                        score > alpha && (is_root_node || score < beta)
                    }));
            if full_search {
                child_result = self.search(
                    t,
                    ss + 1,
                    NodeType::Pv,
                    ply + 1,
                    depth - 1 + e,
                    -beta,
                    -alpha,
                    !maximizing,
                    expanded + e,
                    &mut child_pv,
                    0,
                    false,
                );
            }

            t.board.undo_move();

            if self.options().enable_mobility_evaluation || self.options().enable_piece_activation
            {
                t.n_activated[player_colour] = curr_n_activated;
                t.total_moves[player_colour] = curr_total_moves;
            }

            let Some((child_score, _)) = child_result else {
                return None; // timeout
            };
            let score = -child_score;
            searched_moves.push(m);

            if score >= beta {
                alpha = beta;
                best_move = Some(m);
                pvinfo.set_child(child_pv);
                pvinfo.set_best_move(m);
                fail_low = false;
                fail_high = true;
                break; // cutoff
            }
            if score > alpha {
                fail_low = false;
                alpha = score;
                best_move = Some(m);
                pvinfo.set_child(child_pv);
                pvinfo.set_best_move(m);
            } else if best_move.is_none() {
                best_move = Some(m);
                pvinfo.set_child(child_pv);
                pvinfo.set_best_move(m);
            }
        }

        if !fail_low {
            if let Some(best) = best_move {
                self.update_stats(t, ss, best, depth, fail_high, &searched_moves);
            }
        }

        let mut score = alpha;
        if !has_legal_moves {
            score = if in_check {
                (-MATE).clamp(alpha, beta) // checkmated
            } else {
                0i32.clamp(alpha, beta) // stalemate
            };
        }

        if let Some(tt) = self.tt() {
            let bound = if beta <= alpha {
                Bound::Lower
            } else if is_pv_node && best_move.is_some() {
                Bound::Exact
            } else {
                Bound::Upper
            };
            tt.save(
                t.board.hash_key(),
                depth,
                best_move.map(|m| (m.from(), m.to())),
                score,
                eval,
                bound,
                is_pv_node,
            );
        }

        if let Some(best) = best_move {
            if !best.is_capture() {
                self.update_quiet_stats(t, ss, best);
            }
        }

        // a fail-low after a tt-pv parent marks this line as worth keeping
        if score <= alpha {
            t.ss[ss].tt_pv = t.ss[ss].tt_pv || (t.ss[ss - 1].tt_pv && depth > 3);
        }

        Some((score, best_move))
    }

    /// Quiescence: stand pat on the static eval, then captures only (all
    /// moves while in check), until the position settles.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    pub(crate) fn qsearch(
        &self,
        t: &mut ThreadData,
        ss: usize,
        node_type: NodeType,
        depth: i32,
        mut alpha: i32,
        beta: i32,
        maximizing: bool,
        pv_info: &mut PvInfo,
    ) -> Option<(i32, Option<Move>)> {
        if self.cancelled(t) {
            return None;
        }
        if depth < 0 {
            SearchCounters::bump(&self.counters().nodes);
        }

        if ss >= STACK_GUARD + MAX_PLY {
            return Some((
                evaluate(t, self.options(), self.counters(), maximizing, alpha, beta),
                None,
            ));
        }

        let is_pv_node = node_type.is_pv();
        let tt_depth = 0;

        let mut tt_move: Option<Move> = None;
        let mut tt_hit: Option<TTHit> = None;
        if let Some(tt) = self.tt() {
            let key = t.board.hash_key();
            if let Some(entry) = tt.probe(key) {
                if entry.depth >= tt_depth {
                    SearchCounters::bump(&self.counters().tt_hits);
                    if !is_pv_node
                        && (entry.bound == Bound::Exact
                            || (entry.bound == Bound::Lower && entry.score >= beta)
                            || (entry.bound == Bound::Upper && entry.score <= alpha))
                    {
                        return Some((entry.score.clamp(alpha, beta), None));
                    }
                }
                tt_move = self.validated_tt_move(t, &entry);
                tt_hit = Some(entry);
            }
        }

        let player = t.board.turn();
        let in_check = t.board.is_king_in_check(player);
        t.ss[ss].in_check = in_check;

        let mut eval = EVAL_NONE;
        let mut best_value = -MATE;
        let mut futility_base = -MATE;

        if !in_check {
            // standing pat
            if tt_move.is_some()
                && tt_hit.as_ref().is_some_and(|entry| entry.eval != EVAL_NONE)
            {
                eval = tt_hit.as_ref().map_or(EVAL_NONE, |entry| entry.eval);
                best_value = eval;
            } else {
                eval = evaluate(t, self.options(), self.counters(), maximizing, alpha, beta);
                best_value = eval;
            }

            if best_value >= beta {
                if let Some(tt) = self.tt() {
                    tt.save(
                        t.board.hash_key(),
                        0,
                        None,
                        0,
                        best_value,
                        Bound::Lower,
                        is_pv_node,
                    );
                }
                return Some((best_value, None));
            }

            // delta pruning: even a free queen would not reach alpha
            if best_value + PieceType::Queen.value() < alpha {
                return Some((alpha, None));
            }

            futility_base = best_value;
        }

        let player_colour = player.index();
        let curr_n_activated = t.n_activated[player_colour];
        let curr_total_moves = t.total_moves[player_colour];

        let cont_indices = [
            t.ss[ss - 1].cont_hist,
            t.ss[ss - 2].cont_hist,
            t.ss[ss - 3].cont_hist,
            t.ss[ss - 4].cont_hist,
            t.ss[ss - 5].cont_hist,
        ];

        let pv_move = pv_info.best_move();
        let killers = if self.options().enable_killers {
            t.ss[ss].killers
        } else {
            [None, None]
        };
        let counter = if self.options().enable_counter_move_heuristic {
            t.ss[ss - 1]
                .current_move
                .and_then(|prev| t.counter_moves.get(prev))
        } else {
            None
        };
        let mut picker = MovePicker::new(
            pv_move,
            killers,
            counter,
            in_check,
            self.picker_flags(),
            cont_indices,
        );

        let mut best_move: Option<Move> = None;
        let mut move_count = 0;
        let mut quiet_check_evasions = 0;
        let mut fail_low = true;
        let mut fail_high = false;
        let mut searched_moves: ArrayVec<Move, MAX_POSITION_MOVES> = ArrayVec::new();

        while let Some(m) = picker.next(t) {
            let capture = m.is_capture();
            if !in_check {
                if let Some(captured) = m.captured() {
                    // cheap SEE gate; queens are always worth taking and
                    // pawn captures never lose material worth pruning over
                    if captured.piece_type() != PieceType::Queen
                        && m.piece().piece_type() != PieceType::Pawn
                        && t.board.static_exchange_eval(m) < 0
                    {
                        continue;
                    }
                } else {
                    continue;
                }
            }

            let piece_type = m.piece().piece_type();
            t.ss[ss].current_move = Some(m);
            t.ss[ss].cont_hist = Some(ContHistIndex {
                in_check: t.ss[ss].in_check,
                is_capture: capture,
                piece: piece_type,
                to: m.to(),
            });

            let delivers_check = m.delivers_check(&t.board);
            t.board.make_move(m);

            if t.board.game_result() != GameResult::InProgress {
                t.board.undo_move();
                best_value = beta; // fail hard
                best_move = Some(m);
                pv_info.set_best_move(m);
                break;
            }

            if t.board.is_king_in_check(player) {
                t.board.undo_move();
                continue;
            }

            move_count += 1;

            let is_pv_move = pv_move == Some(m);
            let mut child_pv = if is_pv_move {
                pv_info.child().cloned().unwrap_or_default()
            } else {
                PvInfo::default()
            };

            // once anything at all has been established, stop chasing long
            // tails of non-checking moves and bad trades
            if best_value > -MATE {
                if (!delivers_check && move_count > 2) || quiet_check_evasions > 1 {
                    t.board.undo_move();
                    continue;
                }
                if capture && !delivers_check {
                    let captured_value = m.captured().map_or(0, |p| p.value());
                    if futility_base + captured_value < alpha {
                        t.board.undo_move();
                        continue;
                    }
                }
            }

            quiet_check_evasions += i32::from(!capture && in_check);

            if self.options().enable_mobility_evaluation || self.options().enable_piece_activation
            {
                update_mobility(t, self.options(), player);
            }

            let child_result = self.qsearch(
                t,
                ss + 1,
                node_type,
                depth - 1,
                -beta,
                -alpha,
                !maximizing,
                &mut child_pv,
            );

            t.board.undo_move();

            if self.options().enable_mobility_evaluation || self.options().enable_piece_activation
            {
                t.n_activated[player_colour] = curr_n_activated;
                t.total_moves[player_colour] = curr_total_moves;
            }

            let Some((child_score, _)) = child_result else {
                return None; // timeout
            };
            let score = -child_score;
            searched_moves.push(m);

            if best_move.is_none() {
                best_move = Some(m);
                pv_info.set_child(child_pv.clone());
                pv_info.set_best_move(m);
            }
            if score > best_value {
                best_value = score;
                if score > alpha {
                    fail_low = false;
                    best_move = Some(m);
                    if is_pv_node {
                        pv_info.set_child(child_pv);
                        pv_info.set_best_move(m);
                    }
                    if score < beta {
                        alpha = score;
                    } else {
                        fail_high = true;
                        break; // fail high
                    }
                }
            }
        }

        if !fail_low {
            if let Some(best) = best_move {
                self.update_stats(t, ss, best, 0, fail_high, &searched_moves);
            }
        }

        let mut score = best_value;
        if in_check && best_value == -MATE {
            // no evasion worked: checkmated
            score = (-MATE).clamp(alpha, beta);
        }

        if let Some(tt) = self.tt() {
            let bound = if beta <= alpha { Bound::Lower } else { Bound::Upper };
            tt.save(
                t.board.hash_key(),
                tt_depth,
                best_move.map(|m| (m.from(), m.to())),
                score,
                eval,
                bound,
                is_pv_node,
            );
        }

        Some((score, best_move))
    }

    /// Reward the move that settled this node, punish its searched siblings.
    fn update_stats(
        &self,
        t: &mut ThreadData,
        ss: usize,
        best: Move,
        depth: i32,
        fail_high: bool,
        searched_moves: &[Move],
    ) {
        let bonus = stat_bonus(depth, fail_high);

        if best.is_capture() {
            t.capture_history.add(best, bonus);
        } else {
            if self.options().enable_history_heuristic {
                t.history
                    .add(best.piece().piece_type(), best.from(), best.to(), bonus);
            }
            if self.options().enable_counter_move_heuristic {
                if let Some(prev) = t.ss[ss - 1].current_move {
                    t.counter_moves.add(prev, best);
                }
            }
            self.update_quiet_stats(t, ss, best);
            Self::update_continuation_histories(t, ss, best.piece().piece_type(), best.to(), bonus);
        }

        for &other in searched_moves {
            if other != best {
                if other.is_capture() {
                    t.capture_history.add(other, -bonus);
                } else {
                    t.history
                        .add(other.piece().piece_type(), other.from(), other.to(), -bonus);
                }
            }
        }
    }

    fn update_quiet_stats(&self, t: &mut ThreadData, ss: usize, m: Move) {
        if self.options().enable_killers && t.ss[ss].killers[0] != Some(m) {
            t.ss[ss].killers[1] = t.ss[ss].killers[0];
            t.ss[ss].killers[0] = Some(m);
        }
    }

    /// Feed the bonus into the continuation histories of the last few plies.
    /// Only the immediate two apply while in check.
    fn update_continuation_histories(
        t: &mut ThreadData,
        ss: usize,
        piece_type: PieceType,
        to: crate::util::Loc,
        bonus: i32,
    ) {
        for i in 1..=6 {
            if t.ss[ss].in_check && i > 2 {
                break;
            }
            if t.ss[ss - i].current_move.is_some() {
                if let Some(index) = t.ss[ss - i].cont_hist {
                    t.cont_history.update(index, piece_type, to, bonus);
                }
            }
        }
    }

    /// Iterative deepening with an adaptive aspiration window. Returns the
    /// result of the deepest fully completed iteration, with the score from
    /// the side to move.
    pub(crate) fn search_root(
        &self,
        t: &mut ThreadData,
        max_depth: i32,
    ) -> Option<(i32, Option<Move>, i32)> {
        let mut pv = std::mem::take(&mut t.pv);
        let maximizing = t.board.team_to_play() == Team::RedYellow;
        let mut next_depth = (1 + pv.depth()).min(max_depth);
        let mut result: Option<(i32, Option<Move>)> = None;
        let mut searched_depth = 0;

        while next_depth <= max_depth {
            let mut move_and_value;

            if self.options().enable_aspiration_window {
                let prev = self.aspiration().average_root_eval();
                let mut delta = 50 + self.aspiration().deviation();
                let mut alpha = (prev - delta).max(-MATE);
                let mut beta = (prev + delta).min(MATE);
                let mut fail_cnt = 0;

                loop {
                    move_and_value = self.search(
                        t,
                        STACK_GUARD,
                        NodeType::Root,
                        1,
                        next_depth,
                        alpha,
                        beta,
                        maximizing,
                        0,
                        &mut pv,
                        0,
                        false,
                    );
                    let Some((evaluation, _)) = move_and_value else {
                        break; // hit the deadline
                    };
                    self.aspiration().record(evaluation);

                    if evaluation.abs() == MATE {
                        break;
                    }

                    if evaluation <= alpha {
                        beta = (alpha + beta) / 2;
                        alpha = (evaluation - delta).max(-MATE);
                        fail_cnt += 1;
                        log::trace!(
                            "depth {next_depth}: fail low ({evaluation}), window now ({alpha}, {beta})"
                        );
                    } else if evaluation >= beta {
                        beta = (evaluation + delta).min(MATE);
                        fail_cnt += 1;
                        log::trace!(
                            "depth {next_depth}: fail high ({evaluation}), window now ({alpha}, {beta})"
                        );
                    } else {
                        break;
                    }

                    if fail_cnt >= 5 {
                        alpha = -MATE;
                        beta = MATE;
                    }

                    delta += delta / 3;
                }
            } else {
                move_and_value = self.search(
                    t,
                    STACK_GUARD,
                    NodeType::Root,
                    1,
                    next_depth,
                    -MATE,
                    MATE,
                    maximizing,
                    0,
                    &mut pv,
                    0,
                    false,
                );
            }

            let Some((evaluation, best_move)) = move_and_value else {
                break; // hit the deadline; keep the last full iteration
            };
            result = Some((evaluation, best_move));
            searched_depth = next_depth;
            next_depth += 1;
            log::debug!(
                "depth {searched_depth} complete: score {evaluation}, best {:?}",
                best_move.map(|m| m.to_string())
            );
            if evaluation.abs() == MATE {
                break; // proven win or loss
            }
        }

        t.pv = pv;
        result.map(|(evaluation, best_move)| {
            let score = if maximizing { evaluation } else { -evaluation };
            (score, best_move, searched_depth)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        board::{movegen::MoveList, Board},
        options::EngineOptions,
        piece::{Colour, Piece},
        util::Loc,
    };

    fn put(board: &mut Board, colour: Colour, pt: PieceType, row: i8, col: i8) {
        board.set_piece(Loc::new(row, col), Piece::new(colour, pt));
    }

    /// Kings tucked into each arm, out of each other's way.
    fn four_kings() -> Board {
        let mut board = Board::empty();
        put(&mut board, Colour::Red, PieceType::King, 13, 7);
        put(&mut board, Colour::Blue, PieceType::King, 6, 0);
        put(&mut board, Colour::Yellow, PieceType::King, 0, 6);
        put(&mut board, Colour::Green, PieceType::King, 7, 13);
        board
    }

    /// Plain full-window negamax with no pruning at all, used as ground
    /// truth for the optimized search.
    fn reference_negamax(engine: &Engine, t: &mut ThreadData, depth: i32, maximizing: bool) -> i32 {
        if depth <= 0 {
            return evaluate(t, engine.options(), engine.counters(), maximizing, -MATE, MATE);
        }
        let player = t.board.turn();
        let in_check = t.board.is_king_in_check(player);
        let mut list = MoveList::new();
        t.board.generate_moves(&mut list);
        let moves: Vec<Move> = list.iter().map(|e| e.mov).collect();
        let mut best = None;
        for m in moves {
            t.board.make_move(m);
            if t.board.game_result() != GameResult::InProgress {
                t.board.undo_move();
                return MATE;
            }
            if t.board.is_king_in_check(player) {
                t.board.undo_move();
                continue;
            }
            let score = -reference_negamax(engine, t, depth - 1, !maximizing);
            t.board.undo_move();
            best = Some(best.map_or(score, |b: i32| b.max(score)));
        }
        match best {
            Some(score) => score,
            None if in_check => -MATE,
            None => 0,
        }
    }

    fn run_search(engine: &Engine, board: &Board, depth: i32, alpha: i32, beta: i32) -> Option<(i32, Option<Move>)> {
        let mut t = ThreadData::new(board.clone(), PvInfo::default(), None);
        let maximizing = board.team_to_play() == Team::RedYellow;
        let mut pv = PvInfo::default();
        engine.search(
            &mut t,
            STACK_GUARD,
            NodeType::Root,
            1,
            depth,
            alpha,
            beta,
            maximizing,
            0,
            &mut pv,
            0,
            false,
        )
    }

    fn tactical_board() -> Board {
        // a red queen forks material, a blue rook hangs, pawns push
        let mut board = four_kings();
        put(&mut board, Colour::Red, PieceType::Queen, 9, 7);
        put(&mut board, Colour::Red, PieceType::Pawn, 12, 4);
        put(&mut board, Colour::Blue, PieceType::Rook, 9, 2);
        put(&mut board, Colour::Blue, PieceType::Pawn, 7, 1);
        put(&mut board, Colour::Green, PieceType::Knight, 5, 10);
        put(&mut board, Colour::Yellow, PieceType::Bishop, 2, 8);
        board
    }

    #[test]
    fn full_window_search_matches_reference_negamax() {
        let engine = Engine::new(EngineOptions::all_disabled()).unwrap();
        for depth in 1..=3 {
            for turn in [Colour::Red, Colour::Blue] {
                let mut board = tactical_board();
                board.set_turn(turn);
                let maximizing = board.team_to_play() == Team::RedYellow;
                let mut t = ThreadData::new(board.clone(), PvInfo::default(), None);
                let expected = reference_negamax(&engine, &mut t, depth, maximizing);
                let (got, _) = run_search(&engine, &board, depth, -MATE, MATE).unwrap();
                assert_eq!(
                    got, expected,
                    "divergence at depth {depth} with {turn} to move"
                );
            }
        }
    }

    #[test]
    fn transposition_table_does_not_change_full_window_values() {
        let mut with_tt = EngineOptions::all_disabled();
        with_tt.enable_transposition_table = true;
        with_tt.transposition_table_size = 1 << 16;
        let engine_tt = Engine::new(with_tt).unwrap();
        let engine_plain = Engine::new(EngineOptions::all_disabled()).unwrap();
        let board = tactical_board();
        for depth in 1..=3 {
            let (a, _) = run_search(&engine_tt, &board, depth, -MATE, MATE).unwrap();
            let (b, _) = run_search(&engine_plain, &board, depth, -MATE, MATE).unwrap();
            assert_eq!(a, b, "tt changed the value at depth {depth}");
        }
    }

    #[test]
    fn stored_bounds_bracket_the_true_value() {
        let board = tactical_board();
        let reference = {
            let engine = Engine::new(EngineOptions::all_disabled()).unwrap();
            run_search(&engine, &board, 2, -MATE, MATE).unwrap().0
        };

        let mut conf = EngineOptions::all_disabled();
        conf.enable_transposition_table = true;
        conf.transposition_table_size = 1 << 16;

        // fail high: a null window just below the true value
        let engine = Engine::new(conf.clone()).unwrap();
        let mut t = ThreadData::new(board.clone(), PvInfo::default(), None);
        let mut pv = PvInfo::default();
        engine
            .search(
                &mut t,
                STACK_GUARD,
                NodeType::NonPv,
                1,
                2,
                reference - 11,
                reference - 10,
                true,
                0,
                &mut pv,
                0,
                false,
            )
            .unwrap();
        let hit = engine.tt().unwrap().probe(board.hash_key()).unwrap();
        assert_eq!(hit.bound, Bound::Lower);
        assert!(hit.score <= reference, "lower bound above the true value");

        // fail low: a null window just above the true value
        let engine = Engine::new(conf).unwrap();
        let mut t = ThreadData::new(board.clone(), PvInfo::default(), None);
        let mut pv = PvInfo::default();
        engine
            .search(
                &mut t,
                STACK_GUARD,
                NodeType::NonPv,
                1,
                2,
                reference + 10,
                reference + 11,
                true,
                0,
                &mut pv,
                0,
                false,
            )
            .unwrap();
        let hit = engine.tt().unwrap().probe(board.hash_key()).unwrap();
        assert_eq!(hit.bound, Bound::Upper);
        assert!(hit.score >= reference, "upper bound below the true value");
    }

    #[test]
    fn aspiration_windows_settle_on_the_full_window_value() {
        let board = tactical_board();
        let mut with_asp = EngineOptions::all_disabled();
        with_asp.enable_aspiration_window = true;
        with_asp.max_search_depth = Some(3);
        let engine_asp = Engine::new(with_asp).unwrap();
        let mut without = EngineOptions::all_disabled();
        without.max_search_depth = Some(3);
        let engine_plain = Engine::new(without).unwrap();
        let a = engine_asp.make_move(&board, None, 3).unwrap();
        let b = engine_plain.make_move(&board, None, 3).unwrap();
        assert_eq!(a.depth, b.depth);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn a_cancelled_search_returns_none_at_the_first_poll() {
        let engine = Engine::new(EngineOptions::all_disabled()).unwrap();
        engine.cancel();
        let board = tactical_board();
        assert!(run_search(&engine, &board, 3, -MATE, MATE).is_none());
    }

    #[test]
    fn heuristic_machinery_engages_on_a_real_search() {
        let mut conf = EngineOptions::default();
        conf.num_threads = 1;
        conf.transposition_table_size = 1 << 16;
        let engine = Engine::new(conf).unwrap();
        let board = Board::startpos();
        let result = engine.make_move(&board, None, 4).unwrap();
        assert!(result.best_move.is_some());
        let stats = engine.stats();
        assert!(stats.nodes > 0);
        assert!(stats.lmr_searches > 0, "late moves were never reduced");
        assert!(stats.tt_hits > 0, "the transposition table was never hit");
    }
}
