use std::time::Instant;

use crate::{
    board::Board,
    historytable::{CaptureHistoryTable, ContinuationHistory, CounterMoveTable, HistoryTable},
    piece::{Colour, Team},
    pv::PvInfo,
    stack::{StackEntry, STACK_GUARD, STACK_SLACK},
    util::MAX_PLY,
};

/// Everything one worker thread mutates during a search: its own clone of
/// the board, its own principal variation, its own heuristic tables and
/// search stack, and the mobility tallies the evaluator reads. Nothing in
/// here is shared; workers only meet at the transposition table.
pub struct ThreadData {
    pub board: Board,
    pub pv: PvInfo,

    pub history: HistoryTable,
    pub capture_history: CaptureHistoryTable,
    pub counter_moves: CounterMoveTable,
    pub cont_history: ContinuationHistory,

    /// Search stack: `STACK_GUARD` zeroed frames below the root so `ss - n`
    /// indexing never underflows.
    pub ss: Vec<StackEntry>,

    /// Activated-piece count per colour, maintained incrementally.
    pub n_activated: [i32; Colour::COUNT],
    /// Pseudo-legal move count per colour.
    pub total_moves: [i32; Colour::COUNT],
    /// Profitable-capture count per colour.
    pub n_threats: [i32; Colour::COUNT],

    /// Team on turn at the root of the current search.
    pub root_team: Team,
    pub deadline: Option<Instant>,
}

impl ThreadData {
    pub fn new(board: Board, pv: PvInfo, deadline: Option<Instant>) -> Self {
        let root_team = board.team_to_play();
        Self {
            board,
            pv,
            history: HistoryTable::new(),
            capture_history: CaptureHistoryTable::new(),
            counter_moves: CounterMoveTable::new(),
            cont_history: ContinuationHistory::new(),
            ss: vec![StackEntry::default(); STACK_GUARD + MAX_PLY + STACK_SLACK],
            n_activated: [0; Colour::COUNT],
            total_moves: [0; Colour::COUNT],
            n_threats: [0; Colour::COUNT],
            root_team,
            deadline,
        }
    }

    /// Zero every heuristic table. Done once per engine move, before the
    /// workers launch.
    pub fn reset_tables(&mut self) {
        self.history.clear();
        self.capture_history.clear();
        self.counter_moves.clear();
        self.cont_history.clear();
        for frame in &mut self.ss {
            *frame = StackEntry::default();
        }
    }
}
