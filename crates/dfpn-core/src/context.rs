//! The engine context: everything genuinely shared across workers, bundled
//! into one value held through shared ownership with internal
//! synchronization, the way the design notes prescribe ("Global mutable
//! state"). Workers borrow this; nothing here is cloned per-worker except
//! the atomics' snapshotted values.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Instant;

use crate::constants::{MAX_ROOT_REQUEUE_COUNT, TT_SIZE_FLOOR_MB};
use crate::queues::chunk_queue::GlobalChunkQueue;
use crate::queues::shared_array::SharedTaskArray;
use crate::square::Square;
use crate::tt::TranspositionTable;
use crate::types::{Depth, GameResult, Generation, Score};
use crate::worker_state::WorkerState;

/// Startup configuration. All fields have defaults, builder-ish `Default`,
/// populated by the CLI from flattened `clap` flags.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub threads: usize,
    pub time_limit_sec: u64,
    pub tt_size_mb: usize,
    pub spawn_max_generation: Generation,
    pub spawn_min_depth: Depth,
    pub spawn_limit_per_node: usize,
    pub use_evaluation: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            threads: num_cpus::get(),
            time_limit_sec: 0,
            tt_size_mb: TT_SIZE_FLOOR_MB,
            spawn_max_generation: 1,
            spawn_min_depth: 5,
            spawn_limit_per_node: usize::MAX,
            use_evaluation: true,
        }
    }
}

impl SolverConfig {
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        if let Some(t) = threads {
            self.threads = t.min(num_cpus::get()).max(1);
        }
        self
    }

    pub fn with_time_limit(mut self, time_limit_sec: u64) -> Self {
        self.time_limit_sec = time_limit_sec;
        self
    }

    pub fn with_tt_size_mb(mut self, tt_size_mb: usize) -> Self {
        self.tt_size_mb = tt_size_mb.max(1);
        self
    }

    pub fn with_spawn_max_generation(mut self, spawn_max_generation: Generation) -> Self {
        self.spawn_max_generation = spawn_max_generation;
        self
    }

    pub fn with_spawn_min_depth(mut self, spawn_min_depth: Depth) -> Self {
        self.spawn_min_depth = spawn_min_depth;
        self
    }

    pub fn with_spawn_limit(mut self, spawn_limit: Option<usize>) -> Self {
        if let Some(l) = spawn_limit {
            self.spawn_limit_per_node = l;
        }
        self
    }

    pub fn with_use_evaluation(mut self, use_evaluation: bool) -> Self {
        self.use_evaluation = use_evaluation;
        self
    }
}

/// Per-root-move bookkeeping. `result` and `nodes` are updated concurrently
/// via CAS/atomic-add from whichever worker finishes that root move's task.
pub struct RootMoveState {
    pub sq: Square,
    pub eval: Score,
    pub player: u64,
    pub opponent: u64,
    result: AtomicU8,
    nodes: AtomicU64,
    requeue_count: AtomicU32,
}

impl RootMoveState {
    pub fn new(sq: Square, player: u64, opponent: u64, eval: Score) -> RootMoveState {
        RootMoveState {
            sq,
            eval,
            player,
            opponent,
            result: AtomicU8::new(GameResult::Unknown as u8),
            nodes: AtomicU64::new(0),
            requeue_count: AtomicU32::new(0),
        }
    }

    pub fn result(&self) -> GameResult {
        GameResult::from_u8_unchecked(self.result.load(Ordering::Acquire))
    }

    /// `result[i]` may transition only `UNKNOWN -> definitive`. A CAS
    /// failure here just means another worker already set it, which is
    /// fine: the monotone-transition property holds either way.
    pub fn try_set_result(&self, new_result: GameResult) -> bool {
        self.result
            .compare_exchange(
                GameResult::Unknown as u8,
                new_result as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn add_nodes(&self, n: u64) {
        self.nodes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    /// Livelock guard for the UNKNOWN root-task requeue policy. Returns
    /// `true` while requeuing is still allowed.
    pub fn requeue_allowed(&self) -> bool {
        self.requeue_count.fetch_add(1, Ordering::Relaxed) < MAX_ROOT_REQUEUE_COUNT
    }
}

/// Everything shared across all workers for one solve. Lives for the
/// duration of one `solve()` call.
pub struct EngineContext {
    pub tt: TranspositionTable,
    pub global_queue: GlobalChunkQueue,
    pub shared_array: SharedTaskArray,
    pub worker_state: WorkerState,
    pub config: SolverConfig,
    pub root_moves: Vec<RootMoveState>,

    pub shutdown: AtomicBool,
    pub found_win: AtomicBool,
    /// Square index of the winning root move, or `Square::None`'s index
    /// (64) as a sentinel while unset.
    winning_move: AtomicU8,

    pub tasks_completed: AtomicU64,
    pub total_nodes: AtomicU64,
    pub subtasks_spawned: AtomicU64,
    pub subtasks_completed: AtomicU64,

    pub start: Instant,
}

const NO_WINNING_MOVE: u8 = 64;

impl EngineContext {
    pub fn new(config: SolverConfig, root_moves: Vec<RootMoveState>, tt: TranspositionTable) -> EngineContext {
        let n_workers = config.threads;
        EngineContext {
            tt,
            global_queue: GlobalChunkQueue::new(),
            shared_array: SharedTaskArray::new(),
            worker_state: WorkerState::new(n_workers),
            config,
            root_moves,
            shutdown: AtomicBool::new(false),
            found_win: AtomicBool::new(false),
            winning_move: AtomicU8::new(NO_WINNING_MOVE),
            tasks_completed: AtomicU64::new(0),
            total_nodes: AtomicU64::new(0),
            subtasks_spawned: AtomicU64::new(0),
            subtasks_completed: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    /// First worker to prove WIN at root wins all races and globally signals
    /// shutdown.
    pub fn announce_win(&self, sq: Square) {
        if self
            .found_win
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.winning_move.store(sq.index() as u8, Ordering::Release);
            self.shutdown.store(true, Ordering::Release);
            self.global_queue.notify_all();
        }
    }

    pub fn winning_move(&self) -> Option<Square> {
        let v = self.winning_move.load(Ordering::Acquire);
        if v == NO_WINNING_MOVE {
            None
        } else {
            Some(Square::from_u32_unchecked(v as u32))
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire) || self.found_win.load(Ordering::Acquire)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.global_queue.notify_all();
    }

    pub fn time_limit_exceeded(&self) -> bool {
        self.config.time_limit_sec != 0
            && self.start.elapsed().as_secs() >= self.config.time_limit_sec
    }
}
