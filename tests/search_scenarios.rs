//! End-to-end searches over hand-built positions, exercising the public
//! engine API the way a frontend would.

use std::time::Duration;

use chaturaji::{Board, Colour, Engine, EngineOptions, Loc, Piece, PieceType, MATE};

fn put(board: &mut Board, colour: Colour, pt: PieceType, row: i8, col: i8) {
    board.set_piece(Loc::new(row, col), Piece::new(colour, pt));
}

fn minimal_options() -> EngineOptions {
    EngineOptions::all_disabled()
}

#[test]
fn mate_in_one_finds_the_king_capture() {
    let mut board = Board::empty();
    put(&mut board, Colour::Red, PieceType::Rook, 7, 3);
    put(&mut board, Colour::Red, PieceType::King, 13, 7);
    put(&mut board, Colour::Blue, PieceType::King, 7, 9);
    put(&mut board, Colour::Yellow, PieceType::King, 0, 6);
    put(&mut board, Colour::Green, PieceType::King, 7, 13);
    board.set_turn(Colour::Red);

    let engine = Engine::new(minimal_options()).unwrap();
    let result = engine.make_move(&board, None, 3).expect("search completed");
    assert_eq!(result.score, MATE);
    let expected = board
        .move_from_parts(Loc::new(7, 3), Loc::new(7, 9))
        .expect("the king capture is pseudo-legal");
    assert_eq!(result.best_move, Some(expected));
}

#[test]
fn stalemate_scores_zero_with_no_move() {
    let mut board = Board::empty();
    put(&mut board, Colour::Red, PieceType::King, 13, 3);
    put(&mut board, Colour::Blue, PieceType::Rook, 12, 10);
    put(&mut board, Colour::Blue, PieceType::Rook, 10, 4);
    put(&mut board, Colour::Blue, PieceType::King, 6, 0);
    put(&mut board, Colour::Yellow, PieceType::King, 0, 6);
    put(&mut board, Colour::Green, PieceType::King, 7, 13);
    board.set_turn(Colour::Red);
    assert!(!board.is_king_in_check(Colour::Red));

    let engine = Engine::new(minimal_options()).unwrap();
    let result = engine.make_move(&board, None, 3).expect("search completed");
    assert_eq!(result.score, 0);
    assert_eq!(result.best_move, None);
}

#[test]
fn a_checked_king_forces_the_only_blocking_move() {
    let mut board = Board::empty();
    put(&mut board, Colour::Blue, PieceType::King, 3, 0);
    put(&mut board, Colour::Blue, PieceType::Rook, 10, 5);
    put(&mut board, Colour::Red, PieceType::Rook, 3, 9);
    put(&mut board, Colour::Red, PieceType::Rook, 4, 9);
    put(&mut board, Colour::Red, PieceType::King, 13, 10);
    put(&mut board, Colour::Yellow, PieceType::King, 0, 10);
    put(&mut board, Colour::Green, PieceType::King, 10, 13);
    board.set_turn(Colour::Blue);
    assert!(board.is_king_in_check(Colour::Blue));

    let engine = Engine::new(minimal_options()).unwrap();
    let result = engine.make_move(&board, None, 3).expect("search completed");
    let block = board
        .move_from_parts(Loc::new(10, 5), Loc::new(3, 5))
        .expect("the block is pseudo-legal");
    assert_eq!(result.best_move, Some(block));
    assert!(result.score > -MATE, "the block keeps the game alive");
}

#[test]
fn a_persistent_table_is_hit_on_the_second_search() {
    let mut board = Board::empty();
    put(&mut board, Colour::Red, PieceType::King, 13, 7);
    put(&mut board, Colour::Red, PieceType::Queen, 9, 7);
    put(&mut board, Colour::Blue, PieceType::King, 6, 0);
    put(&mut board, Colour::Blue, PieceType::Rook, 9, 2);
    put(&mut board, Colour::Yellow, PieceType::King, 0, 6);
    put(&mut board, Colour::Green, PieceType::King, 7, 13);
    board.set_turn(Colour::Red);

    let mut options = minimal_options();
    options.enable_transposition_table = true;
    options.transposition_table_size = 1 << 16;
    let engine = Engine::new(options).unwrap();

    let first = engine.make_move(&board, None, 3).expect("first search");
    engine.reset_stats();
    let second = engine.make_move(&board, None, 3).expect("second search");

    assert_eq!(first.depth, second.depth);
    assert_eq!(first.score, second.score);
    assert!(
        engine.stats().tt_hits > 0,
        "the second search never consulted the table"
    );
}

#[test]
fn single_threaded_searches_are_deterministic() {
    let mut options = EngineOptions::default();
    options.num_threads = 1;
    options.transposition_table_size = 1 << 16;

    let board = Board::startpos();
    let a = Engine::new(options.clone())
        .unwrap()
        .make_move(&board, None, 3)
        .expect("search completed");
    let b = Engine::new(options)
        .unwrap()
        .make_move(&board, None, 3)
        .expect("search completed");

    assert_eq!(a.score, b.score);
    assert_eq!(a.best_move, b.best_move);
    assert_eq!(a.depth, b.depth);
}

#[test]
fn parallel_search_agrees_with_single_threaded_at_fixed_depth() {
    // without the shared table the workers are fully independent, so the
    // winning result must match the single-threaded one exactly
    let mut options = EngineOptions::default();
    options.enable_transposition_table = false;
    options.num_threads = 1;
    let board = Board::startpos();
    let single = Engine::new(options.clone())
        .unwrap()
        .make_move(&board, None, 3)
        .expect("search completed");

    options.num_threads = 4;
    let parallel = Engine::new(options)
        .unwrap()
        .make_move(&board, None, 3)
        .expect("search completed");

    assert_eq!(parallel.depth, single.depth);
    assert_eq!(parallel.score, single.score);
}

#[test]
fn cancellation_stops_a_deep_search_promptly() {
    let mut options = EngineOptions::default();
    options.num_threads = 2;
    options.transposition_table_size = 1 << 16;
    let engine = Engine::new(options).unwrap();
    let board = Board::startpos();

    std::thread::scope(|scope| {
        let handle = scope.spawn(|| engine.make_move(&board, None, 64));
        std::thread::sleep(Duration::from_millis(200));
        engine.cancel();
        let result = handle.join().expect("worker panicked");
        if let Some(result) = result {
            assert!(result.depth < 64, "cancellation had no effect");
        }
    });
}

#[test]
fn deadline_expiry_returns_the_best_completed_depth() {
    let mut options = EngineOptions::default();
    options.num_threads = 1;
    options.transposition_table_size = 1 << 16;
    let engine = Engine::new(options).unwrap();
    let board = Board::startpos();

    let result = engine.make_move(&board, Some(Duration::from_millis(300)), 64);
    if let Some(result) = result {
        assert!(result.depth >= 1);
        assert!(result.depth < 64);
        assert!(result.best_move.is_some());
    }
}

#[test]
fn static_evaluation_is_team_antisymmetric() {
    let engine = Engine::with_default_options();
    let mut board = Board::startpos();
    let for_red = engine.static_evaluation(&board);
    board.set_turn(Colour::Blue);
    let for_blue = engine.static_evaluation(&board);
    assert_eq!(for_red, -for_blue);
}
