use crate::{chessmove::Move, historytable::ContHistIndex};

/// One search-stack frame. The per-thread stack keeps seven zeroed frames
/// below the root so `ss - 1` through `ss - 5` reads never need bounds
/// logic, plus slack above for the `ss + 2` killer reset.
#[derive(Clone, Default)]
pub struct StackEntry {
    pub killers: [Option<Move>; 2],
    pub tt_pv: bool,
    pub move_count: i32,
    /// Which continuation-history block the move that led here feeds.
    pub cont_hist: Option<ContHistIndex>,
    pub in_check: bool,
    pub reduction: i32,
    pub current_move: Option<Move>,
    pub root_depth: i32,
    pub static_eval: i32,
}

/// Frames kept below the root frame.
pub const STACK_GUARD: usize = 7;
/// Frames kept above the deepest reachable ply.
pub const STACK_SLACK: usize = 3;
