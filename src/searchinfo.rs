use std::sync::atomic::{AtomicU64, Ordering};

/// Search telemetry, shared across worker threads. All updates are relaxed;
/// the numbers are diagnostics, not synchronisation.
#[derive(Default)]
pub struct SearchCounters {
    pub nodes: AtomicU64,
    pub tt_hits: AtomicU64,
    pub null_moves_tried: AtomicU64,
    pub null_moves_pruned: AtomicU64,
    pub futility_pruned: AtomicU64,
    pub lmr_searches: AtomicU64,
    pub lmr_researches: AtomicU64,
    pub late_moves_pruned: AtomicU64,
    pub check_extensions: AtomicU64,
    pub lazy_evals: AtomicU64,
}

impl SearchCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        for counter in [
            &self.nodes,
            &self.tt_hits,
            &self.null_moves_tried,
            &self.null_moves_pruned,
            &self.futility_pruned,
            &self.lmr_searches,
            &self.lmr_researches,
            &self.late_moves_pruned,
            &self.check_extensions,
            &self.lazy_evals,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> SearchStats {
        SearchStats {
            nodes: self.nodes.load(Ordering::Relaxed),
            tt_hits: self.tt_hits.load(Ordering::Relaxed),
            null_moves_tried: self.null_moves_tried.load(Ordering::Relaxed),
            null_moves_pruned: self.null_moves_pruned.load(Ordering::Relaxed),
            futility_pruned: self.futility_pruned.load(Ordering::Relaxed),
            lmr_searches: self.lmr_searches.load(Ordering::Relaxed),
            lmr_researches: self.lmr_researches.load(Ordering::Relaxed),
            late_moves_pruned: self.late_moves_pruned.load(Ordering::Relaxed),
            check_extensions: self.check_extensions.load(Ordering::Relaxed),
            lazy_evals: self.lazy_evals.load(Ordering::Relaxed),
        }
    }
}

/// A plain copy of the counters, safe to hold across searches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub tt_hits: u64,
    pub null_moves_tried: u64,
    pub null_moves_pruned: u64,
    pub futility_pruned: u64,
    pub lmr_searches: u64,
    pub lmr_researches: u64,
    pub late_moves_pruned: u64,
    pub check_extensions: u64,
    pub lazy_evals: u64,
}
