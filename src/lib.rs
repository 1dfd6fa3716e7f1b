#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_const_for_fn, clippy::module_name_repetitions)]

//! chaturaji: a search engine for four-player team chess on the 14x14 cross
//! board (Red+Yellow against Blue+Green).
//!
//! The crate is a library: [`Engine::make_move`] runs an
//! iterative-deepening negamax alpha-beta search with quiescence, a shared
//! lock-free transposition table, per-thread move-ordering heuristics, and a
//! team-aware static evaluator, across as many worker threads as configured.

mod board;
mod chessmove;
mod engine;
mod evaluation;
mod historytable;
mod lookups;
mod movepicker;
mod options;
mod piece;
mod pv;
mod rng;
mod search;
mod searchinfo;
mod stack;
mod threadlocal;
mod transpositiontable;
mod util;

pub use board::{movegen::MoveList, Board, GameResult, PlacedPiece};
pub use chessmove::Move;
pub use engine::{Engine, SearchResult};
pub use evaluation::MATE;
pub use options::{EngineOptions, EngineTeam, OptionsError};
pub use piece::{Colour, Piece, PieceType, Team, PIECE_VALUES};
pub use pv::PvInfo;
pub use searchinfo::SearchStats;
pub use util::Loc;

/// The name of the engine.
pub static NAME: &str = "chaturaji";
/// The version of the engine.
pub static VERSION: &str = env!("CARGO_PKG_VERSION");
