use std::sync::atomic::{AtomicU64, Ordering};

use crate::util::Loc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    None = 0,
    Upper = 1,
    Lower = 2,
    Exact = 3,
}

impl Bound {
    const fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => Self::None,
            1 => Self::Upper,
            2 => Self::Lower,
            _ => Self::Exact,
        }
    }
}

/// Sentinel for "no static eval stored".
pub const EVAL_NONE: i32 = i32::MIN / 2;

const MOVE_NONE: u64 = 0xFFFF;

/// A decoded table hit. The move is carried as bare from/to squares; callers
/// rebuild and re-validate it against the live board before use.
#[derive(Debug, Clone, Copy)]
pub struct TTHit {
    pub mov: Option<(Loc, Loc)>,
    pub depth: i32,
    pub bound: Bound,
    pub score: i32,
    pub eval: i32,
    pub is_pv: bool,
}

/// One slot: the entry packed into two data words plus a key word XORed with
/// both. A torn read scrambles the reconstructed key and reads as a miss,
/// which the caller already tolerates, so no locking is needed.
#[derive(Default)]
struct TTSlot {
    key: AtomicU64,
    data1: AtomicU64,
    data2: AtomicU64,
}

/// Shared fixed-capacity transposition table. Writers overwrite
/// unconditionally; readers re-check the key and re-validate the move.
pub struct TranspositionTable {
    slots: Vec<TTSlot>,
}

impl TranspositionTable {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "transposition table needs at least one slot");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, TTSlot::default);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&self) {
        for slot in &self.slots {
            slot.key.store(0, Ordering::Relaxed);
            slot.data1.store(0, Ordering::Relaxed);
            slot.data2.store(0, Ordering::Relaxed);
        }
    }

    fn wrap_key(&self, key: u64) -> usize {
        #![allow(clippy::cast_possible_truncation)]
        // fixed-point multiplication trick!
        let key = u128::from(key);
        let len = self.slots.len() as u128;
        ((key * len) >> 64) as usize
    }

    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key: u64,
        depth: i32,
        mov: Option<(Loc, Loc)>,
        score: i32,
        eval: i32,
        bound: Bound,
        is_pv: bool,
    ) {
        #![allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let slot = &self.slots[self.wrap_key(key)];
        let move_bits = mov.map_or(MOVE_NONE, |(from, to)| {
            (from.index() as u64) << 8 | to.index() as u64
        });
        let data1 = u64::from(score as u32) | u64::from(eval as u32) << 32;
        let data2 = move_bits
            | u64::from(depth.clamp(0, 255) as u8) << 16
            | (bound as u64) << 24
            | u64::from(is_pv) << 26;
        slot.data1.store(data1, Ordering::Relaxed);
        slot.data2.store(data2, Ordering::Relaxed);
        slot.key.store(key ^ data1 ^ data2, Ordering::Relaxed);
    }

    /// Fetch the entry for `key`, if the slot holds one. A slot whose key
    /// does not reconstruct is a miss, never an error.
    pub fn probe(&self, key: u64) -> Option<TTHit> {
        #![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let slot = &self.slots[self.wrap_key(key)];
        let key_word = slot.key.load(Ordering::Relaxed);
        let data1 = slot.data1.load(Ordering::Relaxed);
        let data2 = slot.data2.load(Ordering::Relaxed);
        if key_word ^ data1 ^ data2 != key {
            return None;
        }
        let move_bits = data2 & 0xFFFF;
        let mov = if move_bits == MOVE_NONE {
            None
        } else {
            let from = ((move_bits >> 8) & 0xFF) as u8;
            let to = (move_bits & 0xFF) as u8;
            Some((
                Loc::new((from / 14) as i8, (from % 14) as i8),
                Loc::new((to / 14) as i8, (to % 14) as i8),
            ))
        };
        Some(TTHit {
            mov,
            depth: ((data2 >> 16) & 0xFF) as i32,
            bound: Bound::from_bits(data2 >> 24),
            score: data1 as u32 as i32,
            eval: (data1 >> 32) as u32 as i32,
            is_pv: (data2 >> 26) & 1 != 0,
        })
    }
}
