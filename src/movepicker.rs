use crate::{
    board::movegen::MoveList,
    chessmove::Move,
    historytable::ContHistIndex,
    lookups::PIECE_MOVE_ORDER_SCORES,
    threadlocal::ThreadData,
};

/// Score bands. Good captures sit above every quiet score, losing captures
/// below; the bands never overlap because history contributions are clamped.
const GOOD_CAPTURE_BASE: i32 = 1_500_000_000;
const GOOD_CAPTURE_FLOOR: i32 = 1_200_000_000;
const BAD_CAPTURE_PENALTY: i32 = 2_000_000_000;
const HISTORY_CLAMP: i32 = 200_000_000;
const QUIET_FLOOR: i32 = -HISTORY_CLAMP;
const CHECK_ORDER_BONUS: i32 = 10_000;

#[derive(Clone, Copy)]
pub struct PickerFlags {
    /// Score and sort moves at all. Off means generation order.
    pub order: bool,
    /// Give checking quiet moves an ordering bonus.
    pub order_checks: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum Stage {
    Hint,
    Generate,
    GoodCaptures,
    FirstKiller,
    SecondKiller,
    CounterMove,
    Quiets,
    BadCaptures,
    Done,
}

/// Stateful ordered enumerator over the pseudo-legal moves of one node:
/// hint, then winning captures, killers, the counter move, remaining quiets
/// by history, and finally losing captures. With `include_quiets` off
/// (quiescence out of check) the quiet stages are skipped.
pub struct MovePicker {
    list: MoveList,
    index: usize,
    stage: Stage,
    hint: Option<Move>,
    killers: [Option<Move>; 2],
    counter: Option<Move>,
    include_quiets: bool,
    flags: PickerFlags,
    cont_indices: [Option<ContHistIndex>; 5],
}

impl MovePicker {
    pub fn new(
        hint: Option<Move>,
        killers: [Option<Move>; 2],
        counter: Option<Move>,
        include_quiets: bool,
        flags: PickerFlags,
        cont_indices: [Option<ContHistIndex>; 5],
    ) -> Self {
        Self {
            list: MoveList::new(),
            index: 0,
            stage: Stage::Hint,
            hint,
            killers,
            counter,
            include_quiets,
            flags,
            cont_indices,
        }
    }

    /// Was this move already handed out in an early stage?
    fn tried_lazily(&self, m: Move) -> bool {
        Some(m) == self.hint
            || (self.stage > Stage::FirstKiller && Some(m) == self.killers[0])
            || (self.stage > Stage::SecondKiller && Some(m) == self.killers[1])
            || (self.stage > Stage::CounterMove && Some(m) == self.counter)
    }

    /// Select the next move to try. Returns None when the node is exhausted.
    #[allow(clippy::too_many_lines)]
    pub fn next(&mut self, t: &ThreadData) -> Option<Move> {
        if self.stage == Stage::Hint {
            self.stage = Stage::Generate;
            if let Some(hint) = self.hint {
                if t.board.is_pseudo_legal(hint) {
                    return Some(hint);
                }
                self.hint = None;
            }
        }
        if self.stage == Stage::Generate {
            self.stage = Stage::GoodCaptures;
            t.board.generate_moves(&mut self.list);
            if !self.include_quiets {
                self.list.retain(|e| e.mov.is_capture());
            }
            self.score_moves(t);
        }
        if self.stage == Stage::GoodCaptures {
            loop {
                let Some(best) = self.peek_best() else {
                    break;
                };
                if best.1 < GOOD_CAPTURE_FLOOR {
                    break;
                }
                // lazily SEE-test the capture; losers sink to the bottom band
                if self.flags.order && self.list[best.0].mov.approx_see(&t.board) < 0 {
                    self.list[best.0].score -= BAD_CAPTURE_PENALTY;
                    continue;
                }
                let m = self.take_at(best.0);
                if self.tried_lazily(m) {
                    continue;
                }
                return Some(m);
            }
            self.stage = if self.include_quiets {
                Stage::FirstKiller
            } else {
                Stage::BadCaptures
            };
        }
        if self.stage == Stage::FirstKiller {
            self.stage = Stage::SecondKiller;
            if let Some(m) = self.killer_candidate(t, self.killers[0]) {
                return Some(m);
            }
        }
        if self.stage == Stage::SecondKiller {
            self.stage = Stage::CounterMove;
            if let Some(m) = self.killer_candidate(t, self.killers[1]) {
                return Some(m);
            }
        }
        if self.stage == Stage::CounterMove {
            self.stage = Stage::Quiets;
            if let Some(counter) = self.counter {
                if Some(counter) != self.hint
                    && Some(counter) != self.killers[0]
                    && Some(counter) != self.killers[1]
                    && t.board.is_pseudo_legal(counter)
                {
                    return Some(counter);
                }
            }
            self.counter = None;
        }
        if self.stage == Stage::Quiets {
            loop {
                let Some(best) = self.peek_best() else {
                    break;
                };
                if best.1 < QUIET_FLOOR {
                    break;
                }
                let m = self.take_at(best.0);
                if self.tried_lazily(m) {
                    continue;
                }
                return Some(m);
            }
            self.stage = Stage::BadCaptures;
        }
        if self.stage == Stage::BadCaptures {
            loop {
                let Some(best) = self.peek_best() else {
                    break;
                };
                let m = self.take_at(best.0);
                if self.tried_lazily(m) {
                    continue;
                }
                return Some(m);
            }
            self.stage = Stage::Done;
        }
        None
    }

    /// Best-scored entry in the unsorted tail, as (index, score).
    fn peek_best(&self) -> Option<(usize, i32)> {
        let mut best: Option<(usize, i32)> = None;
        for i in self.index..self.list.len() {
            let score = self.list[i].score;
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        best
    }

    /// One step of selection sort: move the entry at `i` into the sorted
    /// prefix and return its move.
    fn take_at(&mut self, i: usize) -> Move {
        self.list.swap(self.index, i);
        let m = self.list[self.index].mov;
        self.index += 1;
        m
    }

    fn killer_candidate(&self, t: &ThreadData, killer: Option<Move>) -> Option<Move> {
        let killer = killer?;
        if Some(killer) == self.hint || !t.board.is_pseudo_legal(killer) {
            return None;
        }
        debug_assert!(!killer.is_capture(), "killers are recorded from quiets only");
        Some(killer)
    }

    fn score_moves(&mut self, t: &ThreadData) {
        if !self.flags.order {
            for entry in &mut self.list {
                entry.score = if entry.mov.is_capture() {
                    GOOD_CAPTURE_BASE
                } else {
                    0
                };
            }
            return;
        }
        for entry in &mut self.list {
            let m = entry.mov;
            entry.score = if let Some(captured) = m.captured() {
                // MVV-LVA with capture history as the tiebreak
                let mvv = 16 * captured.value();
                let lva = PIECE_MOVE_ORDER_SCORES[m.piece().piece_type().index()];
                let hist = t.capture_history.get(m).clamp(-HISTORY_CLAMP, HISTORY_CLAMP);
                GOOD_CAPTURE_BASE + mvv - lva + hist
            } else {
                let mut hist = t.history.get(m.piece().piece_type(), m.from(), m.to());
                for idx in self.cont_indices.iter().flatten() {
                    hist += t.cont_history.get(*idx, m.piece().piece_type(), m.to());
                }
                let mut score = hist.clamp(-HISTORY_CLAMP, HISTORY_CLAMP);
                if self.flags.order_checks && m.delivers_check(&t.board) {
                    score += CHECK_ORDER_BONUS;
                }
                score
            };
        }
    }
}
