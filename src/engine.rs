//! The engine proper: owns the transposition table, the cancellation flag,
//! the aspiration statistics, and the published principal variation, and
//! coordinates the worker threads of one move search.

use std::sync::{
    atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
    Mutex,
};
use std::time::{Duration, Instant};

use crate::{
    board::Board,
    chessmove::Move,
    evaluation::{evaluate, reset_mobility, MATE},
    options::{EngineOptions, OptionsError},
    pv::PvInfo,
    searchinfo::{SearchCounters, SearchStats},
    threadlocal::ThreadData,
    transpositiontable::TranspositionTable,
};

/// Stack size for worker threads; the search recurses deep with a move list
/// per frame.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Outcome of one engine move: the score from the side to move, the move to
/// play, and the deepest fully completed iteration.
#[derive(Clone, Copy, Debug)]
pub struct SearchResult {
    pub score: i32,
    pub best_move: Option<Move>,
    pub depth: i32,
}

/// Running statistics over root scores at the current position, used to
/// size the aspiration window. Shared across workers, so everything is a
/// relaxed atomic.
#[derive(Default)]
pub(crate) struct AspirationStats {
    average: AtomicI64,
    observations: AtomicI64,
    sum: AtomicI64,
    sum_sq: AtomicI64,
}

impl AspirationStats {
    pub(crate) fn reset(&self) {
        self.average.store(0, Ordering::Relaxed);
        self.observations.store(0, Ordering::Relaxed);
        self.sum.store(0, Ordering::Relaxed);
        self.sum_sq.store(0, Ordering::Relaxed);
    }

    /// Fold a fresh root score into the running average (a 2:1 EWMA).
    pub(crate) fn record(&self, evaluation: i32) {
        let evaluation = i64::from(evaluation);
        if self.observations.load(Ordering::Relaxed) == 0 {
            self.average.store(evaluation, Ordering::Relaxed);
        } else {
            let old = self.average.load(Ordering::Relaxed);
            self.average
                .store((2 * evaluation + old) / 3, Ordering::Relaxed);
        }
        self.observations.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(evaluation, Ordering::Relaxed);
        self.sum_sq
            .fetch_add(evaluation * evaluation, Ordering::Relaxed);
    }

    pub(crate) fn average_root_eval(&self) -> i32 {
        #![allow(clippy::cast_possible_truncation)]
        self.average
            .load(Ordering::Relaxed)
            .clamp(i64::from(-MATE), i64::from(MATE)) as i32
    }

    /// Standard deviation of observed root scores, zero with no history.
    pub(crate) fn deviation(&self) -> i32 {
        #![allow(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::cast_sign_loss
        )]
        let n = self.observations.load(Ordering::Relaxed);
        if n == 0 {
            return 0;
        }
        let sum = i128::from(self.sum.load(Ordering::Relaxed));
        let sum_sq = i128::from(self.sum_sq.load(Ordering::Relaxed));
        let n = i128::from(n);
        let variance = (sum_sq - sum * sum / n) / n;
        (variance.max(0) as f64).sqrt() as i32
    }
}

pub struct Engine {
    options: EngineOptions,
    tt: Option<TranspositionTable>,
    pv: Mutex<PvInfo>,
    counters: SearchCounters,
    canceled: AtomicBool,
    aspiration: AspirationStats,
    last_board_key: AtomicU64,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Result<Self, OptionsError> {
        options.validate()?;
        let tt = options
            .enable_transposition_table
            .then(|| TranspositionTable::new(options.transposition_table_size));
        Ok(Self {
            options,
            tt,
            pv: Mutex::new(PvInfo::default()),
            counters: SearchCounters::default(),
            canceled: AtomicBool::new(false),
            aspiration: AspirationStats::default(),
            last_board_key: AtomicU64::new(0),
        })
    }

    pub fn with_default_options() -> Self {
        Self::new(EngineOptions::default()).expect("default options are valid")
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub(crate) fn tt(&self) -> Option<&TranspositionTable> {
        self.tt.as_ref()
    }

    pub(crate) fn counters(&self) -> &SearchCounters {
        &self.counters
    }

    pub(crate) fn aspiration(&self) -> &AspirationStats {
        &self.aspiration
    }

    /// The principal variation of the last completed search.
    pub fn pv(&self) -> PvInfo {
        self.pv.lock().unwrap().clone()
    }

    /// Telemetry snapshot (cumulative across searches until reset).
    pub fn stats(&self) -> SearchStats {
        self.counters.snapshot()
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// Ask every in-flight worker to unwind at its next poll.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_cancel_flag_set(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    /// Full static evaluation of a position from the side to move, with no
    /// window to cut against.
    pub fn static_evaluation(&self, board: &Board) -> i32 {
        let mut t = ThreadData::new(board.clone(), self.pv(), None);
        reset_mobility(&mut t, &self.options);
        let maximizing = board.team_to_play() == crate::piece::Team::RedYellow;
        evaluate(&t, &self.options, &self.counters, maximizing, -MATE, MATE)
    }

    /// Search the position and pick a move. Spawns the configured number of
    /// workers, each running iterative deepening from the same root; the
    /// first to finish wins and cancels the rest. Returns `None` only if no
    /// worker completed a single iteration before the deadline.
    pub fn make_move(
        &self,
        board: &Board,
        time_limit: Option<Duration>,
        max_depth: i32,
    ) -> Option<SearchResult> {
        let key = board.hash_key();
        if key != self.last_board_key.swap(key, Ordering::Relaxed) {
            self.aspiration.reset();
        }

        self.canceled.store(false, Ordering::Relaxed);
        let deadline = time_limit.map(|limit| Instant::now() + limit);
        let max_depth = self
            .options
            .max_search_depth
            .map_or(max_depth, |cap| max_depth.min(cap));

        let num_threads = self.options.effective_threads();
        let root_pv = self.pv();
        let mut workers: Vec<ThreadData> = (0..num_threads)
            .map(|_| {
                let mut t = ThreadData::new(board.clone(), root_pv.clone(), deadline);
                reset_mobility(&mut t, &self.options);
                t
            })
            .collect();

        let published: Mutex<Option<(SearchResult, PvInfo)>> = Mutex::new(None);
        let engine: &Engine = self;
        std::thread::scope(|scope| {
            for t in &mut workers {
                let published = &published;
                let builder = std::thread::Builder::new().stack_size(WORKER_STACK_SIZE);
                builder
                    .spawn_scoped(scope, move || {
                        let result = engine.search_root(t, max_depth);
                        // first finisher wins; everyone else short-circuits
                        // at their next cancellation poll
                        engine.canceled.store(true, Ordering::Relaxed);
                        if let Some((score, best_move, depth)) = result {
                            let mut slot = published.lock().unwrap();
                            if slot.is_none() {
                                *slot = Some((
                                    SearchResult {
                                        score,
                                        best_move,
                                        depth,
                                    },
                                    t.pv.clone(),
                                ));
                            }
                        }
                    })
                    .expect("failed to spawn search worker");
            }
        });
        self.canceled.store(false, Ordering::Relaxed);

        let (result, pv) = published.into_inner().unwrap()?;
        *self.pv.lock().unwrap() = pv;
        log::info!(
            "searched to depth {} in {} node(s): score {}, best {:?}",
            result.depth,
            self.stats().nodes,
            result.score,
            result.best_move.map(|m| m.to_string()),
        );
        Some(result)
    }
}
