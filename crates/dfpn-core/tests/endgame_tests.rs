//! End-to-end coverage through the public `solve()` entry point, using
//! hand-built one-empty positions whose only legal move is fully traceable.
//! Assertions check proven WIN/LOSE outcomes rather than exact scores, since
//! this solver only proves game-theoretic results, not scores.

use dfpn_core::{GameResult, SolverConfig, solve};

fn fast_config() -> SolverConfig {
    SolverConfig {
        threads: 1,
        tt_size_mb: 1,
        time_limit_sec: 5,
        ..SolverConfig::default()
    }
}

/// Board: A1 = player, B1 = opponent, C1 empty, all other 61 squares =
/// opponent. The only legal move is C1 (captures B1 between A1 and C1);
/// afterwards the mover holds 3 discs against 61, a crushing forced loss.
#[test]
fn test_one_ply_forced_loss() {
    let a1 = 1u64 << 0;
    let c1 = 1u64 << 2;
    let player = a1;
    let opponent = !(a1 | c1);

    let outcome = solve(player, opponent, fast_config());
    assert_eq!(outcome.result, GameResult::Lose);
    assert!(outcome.best_move.is_some());
}

/// Board: everything except B1 and C1 = player (includes A1), B1 = opponent,
/// C1 empty. The only legal move is C1 (captures the lone opponent disc at
/// B1, sandwiched between C1 and A1); afterwards the opponent holds zero
/// discs, a forced win.
#[test]
fn test_one_ply_forced_win() {
    let b1 = 1u64 << 1;
    let c1 = 1u64 << 2;
    let player = !(b1 | c1);
    let opponent = b1;

    let outcome = solve(player, opponent, fast_config());
    assert_eq!(outcome.result, GameResult::Win);
    assert!(outcome.best_move.is_some());
}

/// Re-solving the same forced-loss position with more threads than legal
/// root moves (1) must not change the proven result: extra workers just sit
/// idle once the single root task is claimed.
#[test]
fn test_forced_loss_result_stable_across_thread_counts() {
    let a1 = 1u64 << 0;
    let c1 = 1u64 << 2;
    let player = a1;
    let opponent = !(a1 | c1);

    let single = solve(
        player,
        opponent,
        SolverConfig {
            threads: 1,
            tt_size_mb: 1,
            time_limit_sec: 5,
            ..SolverConfig::default()
        },
    );
    let multi = solve(
        player,
        opponent,
        SolverConfig {
            threads: 4,
            tt_size_mb: 1,
            time_limit_sec: 5,
            ..SolverConfig::default()
        },
    );
    assert_eq!(single.result, GameResult::Lose);
    assert_eq!(multi.result, GameResult::Lose);
}

/// A fully played-out board (no empties) is solved without spinning up any
/// search at all: the result is read straight off the final disc count.
#[test]
fn test_already_finished_board_reports_result_through_public_api() {
    // Player holds every square: an unambiguous win with nothing left to play.
    let player = u64::MAX;
    let opponent = 0u64;

    let outcome = solve(player, opponent, fast_config());
    assert_eq!(outcome.result, GameResult::Win);
}
