//! Global state & termination: the single library entry point. Splits
//! "configure and dispatch" from "thread pool owns the loop" — except here
//! the loop runs to a proof rather than a fixed depth.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use crate::board::Board;
use crate::constants::MAIN_POLL_MS;
use crate::context::{EngineContext, RootMoveState, SolverConfig};
use crate::eval;
use crate::square::Square;
use crate::task::Task;
use crate::tt::TranspositionTable;
use crate::types::GameResult;
use crate::worker;

/// Result of one `solve` call.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub result: GameResult,
    pub best_move: Option<Square>,
    pub stats: SolveStats,
}

/// Diagnostics collected over the whole solve.
#[derive(Debug, Clone)]
pub struct SolveStats {
    pub total_nodes: u64,
    pub per_worker_nodes: Vec<u64>,
    pub tt_hits: u64,
    pub tt_stores: u64,
    pub tt_collisions: u64,
    pub subtasks_spawned: u64,
    pub subtasks_completed: u64,
    pub elapsed: Duration,
    pub nps: f64,
}

/// Solves the given position to a proof of WIN, LOSE, or DRAW (or returns
/// UNKNOWN if the time limit cuts the search short). This is the only
/// function the CLI (or any other caller) needs.
pub fn solve(player: u64, opponent: u64, config: SolverConfig) -> SolveOutcome {
    let tt = TranspositionTable::new(config.tt_size_mb);
    let root_moves = build_root_moves(player, opponent);

    if root_moves.is_empty() {
        // No legal moves at the root: either the side to move passes (not
        // representable as a "root move" in this API) or the game is over.
        // Both collapse to a defensive pass-through that callers resolve
        // themselves by flipping perspective and re-calling `solve`.
        return SolveOutcome {
            result: terminal_or_pass_result(player, opponent),
            best_move: None,
            stats: SolveStats {
                total_nodes: 0,
                per_worker_nodes: Vec::new(),
                tt_hits: 0,
                tt_stores: 0,
                tt_collisions: 0,
                subtasks_spawned: 0,
                subtasks_completed: 0,
                elapsed: Duration::ZERO,
                nps: 0.0,
            },
        };
    }

    let n_moves = root_moves.len();
    let n_threads = config.threads.max(1);
    let ctx = EngineContext::new(config, root_moves, tt);

    for rm in &ctx.root_moves {
        let priority = rm.eval as i64;
        ctx.shared_array
            .push(Task::root(rm.player, rm.opponent, rm.sq, priority as i32, 0));
    }

    thread::scope(|scope| {
        for worker_id in 0..n_threads {
            thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn_scoped(scope, move || worker::run(worker_id, &ctx))
                .expect("failed to spawn worker thread");
        }

        loop {
            thread::sleep(Duration::from_millis(MAIN_POLL_MS));
            if ctx.is_shutdown() {
                break;
            }
            let completed = ctx.tasks_completed.load(Ordering::Relaxed) as usize >= n_moves;
            let all_definitive_or_settled = ctx
                .root_moves
                .iter()
                .all(|rm| rm.result() != GameResult::Unknown || completed);
            if completed && all_definitive_or_settled {
                ctx.request_shutdown();
                break;
            }
            if ctx.time_limit_exceeded() {
                ctx.request_shutdown();
                break;
            }
        }
        ctx.request_shutdown();
    });

    assemble_outcome(&ctx)
}

fn build_root_moves(player: u64, opponent: u64) -> Vec<RootMoveState> {
    let board = Board::from_bitboards(player, opponent);
    let mut moves = Vec::new();
    let mut bb = board.get_moves();
    while bb != 0 {
        let sq = Square::from_u32_unchecked(bb.trailing_zeros());
        bb &= bb - 1;
        let child = board.make_move(sq);
        let e = eval::evaluate(child.player, child.opponent);
        moves.push(RootMoveState::new(sq, child.player, child.opponent, e));
    }
    moves
}

fn terminal_or_pass_result(player: u64, opponent: u64) -> GameResult {
    let board = Board::from_bitboards(player, opponent);
    if !board.is_game_over() {
        // Side to move must pass; the caller owns perspective-flipping.
        return GameResult::Unknown;
    }
    match board.final_score() {
        s if s > 0 => GameResult::Win,
        s if s < 0 => GameResult::Lose,
        _ => GameResult::Draw,
    }
}

/// Final-result aggregation : WIN wins outright if any worker proved
/// it; otherwise a defensive scan over the root moves picks the best
/// definitive outcome, falling back to the best-evaluated UNKNOWN root.
fn assemble_outcome(ctx: &EngineContext) -> SolveOutcome {
    let elapsed = ctx.start.elapsed();
    let total_nodes = ctx.total_nodes.load(Ordering::Relaxed);
    let nps = if elapsed.as_secs_f64() > 0.0 {
        total_nodes as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    let stats = SolveStats {
        total_nodes,
        per_worker_nodes: ctx.root_moves.iter().map(|rm| rm.nodes()).collect(),
        tt_hits: ctx.tt.hits(),
        tt_stores: ctx.tt.stores(),
        tt_collisions: ctx.tt.collisions(),
        subtasks_spawned: ctx.subtasks_spawned.load(Ordering::Relaxed),
        subtasks_completed: ctx.subtasks_completed.load(Ordering::Relaxed),
        elapsed,
        nps,
    };

    if let Some(sq) = ctx.winning_move() {
        return SolveOutcome {
            result: GameResult::Win,
            best_move: Some(sq),
            stats,
        };
    }

    if let Some(rm) = ctx.root_moves.iter().find(|rm| rm.result() == GameResult::Win) {
        return SolveOutcome {
            result: GameResult::Win,
            best_move: Some(rm.sq),
            stats,
        };
    }

    let any_win = ctx.root_moves.iter().any(|rm| rm.result() == GameResult::Win);
    if !any_win {
        if let Some(rm) = ctx.root_moves.iter().find(|rm| rm.result() == GameResult::Draw) {
            return SolveOutcome {
                result: GameResult::Draw,
                best_move: Some(rm.sq),
                stats,
            };
        }
    }

    if ctx.root_moves.iter().all(|rm| rm.result() == GameResult::Lose) {
        return SolveOutcome {
            result: GameResult::Lose,
            best_move: Some(ctx.root_moves[0].sq),
            stats,
        };
    }

    let best_unknown = ctx
        .root_moves
        .iter()
        .max_by_key(|rm| rm.eval)
        .map(|rm| rm.sq);
    SolveOutcome {
        result: GameResult::Unknown,
        best_move: best_unknown,
        stats,
    }
}
