use crate::chessmove::Move;

/// The principal variation as an owned chain: best move here, then the line
/// below it. Each worker thread owns its chain outright; the engine clones
/// the winner's chain when a search completes.
#[derive(Clone, Default)]
pub struct PvInfo {
    best_move: Option<Move>,
    child: Option<Box<PvInfo>>,
}

impl PvInfo {
    pub fn best_move(&self) -> Option<Move> {
        self.best_move
    }

    pub fn set_best_move(&mut self, m: Move) {
        self.best_move = Some(m);
    }

    pub fn child(&self) -> Option<&PvInfo> {
        self.child.as_deref()
    }

    pub fn set_child(&mut self, child: PvInfo) {
        self.child = Some(Box::new(child));
    }

    /// Detach the child line, leaving this node's best move in place.
    pub fn take_child(&mut self) -> Option<PvInfo> {
        self.child.take().map(|b| *b)
    }

    /// Number of plies of principal variation recorded below (and including)
    /// this node.
    pub fn depth(&self) -> i32 {
        if self.best_move.is_none() {
            return 0;
        }
        1 + self.child.as_ref().map_or(0, |c| c.depth())
    }

    /// The whole line as a vector of moves, for reporting.
    pub fn line(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        let mut node = self;
        while let Some(m) = node.best_move {
            moves.push(m);
            match node.child() {
                Some(child) => node = child,
                None => break,
            }
        }
        moves
    }
}
