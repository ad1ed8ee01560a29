/// Maximum number of empty squares the engine will ever see (full empty board).
pub const MAX_EMPTIES: u32 = 60;

/// Proof-number infinity. Both `pn` and `dn` saturate here; `pn == dn == PN_INF`
/// with `is_proven == true` denotes a proven draw.
pub const PN_INF: u32 = 100_000_000;

/// Disproof-number infinity, kept as a distinct name for readability at call
/// sites even though it shares `PN_INF`'s value.
pub const DN_INF: u32 = PN_INF;

/// Capacity of a single worker's [`crate::queues::local_heap::LocalHeap`].
pub const LOCAL_HEAP_CAPACITY: usize = 1024;

/// Number of tasks batched into one [`crate::queues::chunk_queue::Chunk`].
pub const CHUNK_SIZE: usize = 16;

/// Capacity, in chunks, of the [`crate::queues::chunk_queue::GlobalChunkQueue`].
pub const GLOBAL_CHUNK_QUEUE_CAPACITY: usize = 4096;

/// Capacity, in tasks, of the [`crate::queues::shared_array::SharedTaskArray`] ring.
pub const SHARED_TASK_ARRAY_CAPACITY: usize = 65_536;

/// Number of stripe locks guarding the transposition table.
pub const TT_STRIPES: usize = 1024;

/// Maximum number of workers the [`crate::worker_state::WorkerState`] bitmap can track.
pub const MAX_WORKERS: usize = 1024;

/// Words in the worker-state bitmap (`MAX_WORKERS / 64`).
pub const WORKER_STATE_WORDS: usize = MAX_WORKERS / 64;

/// Local-heap occupancy above which a worker exports a chunk to the global queue.
pub const LOCAL_EXPORT_THRESHOLD: usize = CHUNK_SIZE + 4;

/// How many nodes a worker processes between cooperative-cancellation checks.
pub const CANCELLATION_CHECK_INTERVAL: u64 = 1024;

/// How many main-loop iterations between mid-search spawn attempts (Trigger C).
pub const MID_SEARCH_SPAWN_INTERVAL: u64 = 50;

/// How many nodes between chunk-export attempts.
pub const CHUNK_EXPORT_INTERVAL: u64 = 1000;

/// Timeout, in milliseconds, a dispatcher waits on the global queue's condvar
/// before retrying dispatch.
pub const DISPATCH_WAIT_MS: u64 = 5;

/// Polling interval, in milliseconds, for the main thread's completion/timeout check.
pub const MAIN_POLL_MS: u64 = 50;

/// Default recommended transposition-table floor, below which the UNKNOWN
/// root-task requeue policy risks thrashing (see `DESIGN.md`).
pub const TT_SIZE_FLOOR_MB: usize = 256;

/// Root-task requeue livelock guard: after this many UNKNOWN returns for the
/// same root task, stop requeuing and accept UNKNOWN as final for that root.
pub const MAX_ROOT_REQUEUE_COUNT: u32 = 64;
