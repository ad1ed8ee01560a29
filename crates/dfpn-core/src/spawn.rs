//! Spawn controller : decides when and how many subtasks to
//! delegate to other workers during one task's traversal. All delegation
//! is additive — the delegating task keeps every child in its own
//! traversal regardless of what it also hands out, so the worst case is
//! redundant work that the shared TT later deduplicates, never a
//! correctness hazard (see `DESIGN.md`).

use arrayvec::ArrayVec;

use crate::arena::{Arena, MAX_CHILDREN, NodeId};
use crate::constants::CHUNK_SIZE;
use crate::context::EngineContext;
use crate::engine::priority_of;
use crate::queues::chunk_queue::Chunk;
use crate::queues::local_heap::LocalHeap;
use crate::task::{NodeType, Task};
use crate::types::Generation;

const ROOT_SPLIT_BOOST: i64 = 10_000;
const ROOT_SPLIT_GENERATION: Generation = 1;
const EARLY_SPAWN_BOOST: i64 = 4_000;
const EARLY_SPAWN_GENERATION: Generation = 3;
const EARLY_SPAWN_CAP: usize = 15;
const MID_SPAWN_BOOST: i64 = 3_000;
const MID_SPAWN_GENERATION: Generation = 5;
const MID_SPAWN_CAP: usize = 2;

fn child_task(arena: &Arena, child: NodeId, root_move: crate::square::Square, boost: i64, generation: Generation) -> Task {
    let n = arena.get(child);
    let priority = priority_of(n.node_type, n) + boost;
    Task::new(n.player, n.opponent, root_move, priority, false, n.depth, n.node_type, generation)
}

fn unproven_children(arena: &Arena, node_id: NodeId) -> ArrayVec<NodeId, MAX_CHILDREN> {
    arena
        .get(node_id)
        .children
        .iter()
        .copied()
        .filter(|&c| !arena.get(c).is_proven)
        .collect()
}

/// Trigger A : when a worker receives a `generation == 0` root task,
/// push every child but the highest-priority one into the shared array
/// with a large priority boost, multiplying initial parallelism roughly by
/// the branching factor. The delegating worker still processes every
/// child itself afterward; this only adds opportunities for idle workers
/// to race on the same subtrees.
pub fn trigger_root_split(arena: &Arena, root_id: NodeId, task: &Task, ctx: &EngineContext) {
    let children = &arena.get(root_id).children;
    if children.len() < 2 {
        return;
    }
    let best = *children
        .iter()
        .max_by_key(|&&c| priority_of(arena.get(c).node_type, arena.get(c)))
        .expect("root has at least one child");

    for &child in children.iter() {
        if child == best {
            continue;
        }
        let t = child_task(arena, child, task.root_move, ROOT_SPLIT_BOOST, ROOT_SPLIT_GENERATION);
        ctx.shared_array.push(t);
        ctx.subtasks_spawned.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}

/// Trigger B : right after the task's own root node expands, if
/// workers are idle or this worker's `LocalHeap` is running low, push a
/// bounded number of unproven children into the shared array. Goes
/// through the shared `spawn_child_tasks` decision procedure, so it
/// respects the same backpressure and generation/depth gating as Trigger C.
pub fn trigger_early_spawn(arena: &Arena, node_id: NodeId, task: &Task, ctx: &EngineContext, scratch: &mut crate::engine::WorkerScratch) {
    if !(ctx.worker_state.has_idle() || scratch.local_heap.len() < CHUNK_SIZE) {
        return;
    }
    spawn_child_tasks(
        arena,
        node_id,
        task,
        ctx,
        scratch.local_heap,
        scratch.fast_sharing,
        EARLY_SPAWN_CAP,
        EARLY_SPAWN_BOOST,
        EARLY_SPAWN_GENERATION,
    );
}

/// Trigger C : every 50 main-loop iterations, if idle workers exist
/// and the node still has unproven children, push a small number of them.
/// Goes through the shared `spawn_child_tasks` decision procedure.
pub fn trigger_mid_search_spawn(arena: &Arena, node_id: NodeId, task: &Task, ctx: &EngineContext, local_heap: &mut LocalHeap) {
    if !ctx.worker_state.has_idle() {
        return;
    }
    let fast_sharing = crate::dispatcher::is_fast_sharing(ctx);
    spawn_child_tasks(
        arena,
        node_id,
        task,
        ctx,
        local_heap,
        fast_sharing,
        MID_SPAWN_CAP,
        MID_SPAWN_BOOST,
        MID_SPAWN_GENERATION,
    );
}

struct EffectiveParams {
    max_generation: Generation,
    spawn_limit: usize,
    min_depth: u32,
}

/// Computes the environment-adapted `(max_gen, spawn_limit, min_depth)`
/// table from, given current queue/worker pressure.
fn effective_params(ctx: &EngineContext, local_heap_len: usize) -> Option<EffectiveParams> {
    let mut max_generation = ctx.config.spawn_max_generation;
    let mut spawn_limit = ctx.config.spawn_limit_per_node;
    let mut min_depth = ctx.config.spawn_min_depth;

    if local_heap_len < CHUNK_SIZE {
        if ctx.shared_array.fill_ratio() >= 0.8 {
            return None;
        }
        max_generation += 20;
        spawn_limit = 50;
        min_depth /= 2;
    }

    let idle_rate = ctx.worker_state.idle_rate();
    if idle_rate > 0.9 {
        max_generation += 10;
        spawn_limit = spawn_limit.saturating_mul(5);
        min_depth /= 2;
    } else if idle_rate > 0.7 {
        max_generation += 5;
        spawn_limit = spawn_limit.saturating_mul(3);
        min_depth = min_depth * 2 / 3;
    } else if idle_rate > 0.5 {
        max_generation += 2;
        spawn_limit = spawn_limit.saturating_mul(2);
    }

    Some(EffectiveParams {
        max_generation,
        spawn_limit,
        min_depth,
    })
}

/// The generic `spawn_child_tasks` decision procedure, reused by
/// Triggers B and C through their thinner wrappers above for the
/// parameters they don't individually hard-cap (`max_gen`/`min_depth`
/// gating, the 80%-of-best priority filter).
pub fn spawn_child_tasks(
    arena: &Arena,
    node_id: NodeId,
    parent_task: &Task,
    ctx: &EngineContext,
    local_heap: &mut LocalHeap,
    fast_sharing: bool,
    trigger_cap: usize,
    boost: i64,
    generation: Generation,
) -> usize {
    let params = match effective_params(ctx, local_heap.len()) {
        Some(p) => p,
        None => return 0,
    };

    let has_idle = ctx.worker_state.has_idle();
    if parent_task.generation >= params.max_generation && !has_idle && local_heap.len() >= CHUNK_SIZE {
        return 0;
    }
    if arena.get(node_id).depth < params.min_depth {
        return 0;
    }

    let candidates = unproven_children(arena, node_id);
    if candidates.is_empty() {
        return 0;
    }
    let node_type = arena.get(node_id).node_type;
    let best = *candidates
        .iter()
        .max_by_key(|&&c| priority_of(node_type, arena.get(c)))
        .expect("candidates is non-empty");
    let best_priority = priority_of(node_type, arena.get(best));
    let threshold = (best_priority as f64) * 0.8;

    let limit = params.spawn_limit.min(trigger_cap);
    let mut spawned = 0;
    for &child in candidates.iter() {
        if spawned >= limit {
            break;
        }
        if child == best {
            continue;
        }
        if (priority_of(node_type, arena.get(child)) as f64) < threshold {
            continue;
        }
        let t = child_task(arena, child, parent_task.root_move, boost, generation);
        let ok = if fast_sharing { ctx.shared_array.push(t) } else { local_heap.push(t) };
        if ok {
            spawned += 1;
        }
    }
    if spawned > 0 {
        ctx.subtasks_spawned.fetch_add(spawned as u64, std::sync::atomic::Ordering::Relaxed);
    }
    spawned
}

/// Chunk export (, independent of spawning): every `CHUNK_EXPORT_INTERVAL`
/// nodes, a worker sitting on a deep `LocalHeap` promotes its top tasks to
/// the global queue, and (if workers are idle) pushes everything else
/// straight to the shared array for fastest pickup.
pub fn try_export_chunk(local_heap: &mut LocalHeap, ctx: &EngineContext) {
    use crate::constants::LOCAL_EXPORT_THRESHOLD;

    if local_heap.len() >= LOCAL_EXPORT_THRESHOLD
        && (local_heap.peek_priority() < ctx.global_queue.peek_top_priority() || ctx.global_queue.is_empty())
    {
        let mut tasks: ArrayVec<Task, CHUNK_SIZE> = ArrayVec::new();
        // Keep the very best for ourselves; export the next CHUNK_SIZE.
        let mut held_best = local_heap.pop();
        while tasks.len() < CHUNK_SIZE {
            match local_heap.pop() {
                Some(t) => tasks.push(t),
                None => break,
            }
        }
        if let Some(best) = held_best.take() {
            local_heap.push(best);
        }
        if !tasks.is_empty() {
            ctx.global_queue.push(Chunk::new(tasks));
        }
    }

    if ctx.worker_state.has_idle() && local_heap.len() > 1 {
        let held_best = local_heap.pop();
        while let Some(t) = local_heap.pop() {
            if !ctx.shared_array.push(t) {
                // Array is full; put it back and stop.
                local_heap.push(t);
                break;
            }
        }
        if let Some(best) = held_best {
            local_heap.push(best);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Node;
    use crate::context::{RootMoveState, SolverConfig};
    use crate::square::Square;
    use crate::tt::TranspositionTable;

    fn ctx_with_threads(threads: usize) -> EngineContext {
        EngineContext::new(
            SolverConfig {
                threads,
                ..SolverConfig::default()
            },
            vec![RootMoveState::new(Square::C4, 0, 0, 0)],
            TranspositionTable::new(1),
        )
    }

    #[test]
    fn test_root_split_pushes_all_but_best_to_shared_array() {
        let ctx = ctx_with_threads(4);
        let mut arena = Arena::new();
        let c1 = arena.alloc(Node {
            pn: 1,
            eval_score: 0,
            ..Node::default()
        });
        let c2 = arena.alloc(Node {
            pn: 50,
            eval_score: 0,
            ..Node::default()
        });
        let mut children = ArrayVec::new();
        children.push(c1);
        children.push(c2);
        let root = arena.alloc(Node {
            node_type: NodeType::Or,
            children,
            ..Node::default()
        });
        let task = Task::root(0, 0, Square::C4, 0, 10);
        trigger_root_split(&arena, root, &task, &ctx);
        // c1 has the lower pn, i.e. higher OR priority, so it's kept; c2 is
        // delegated.
        assert!(!ctx.shared_array.is_empty());
        let delegated = ctx.shared_array.pop().unwrap();
        assert_eq!(delegated.generation, ROOT_SPLIT_GENERATION);
        assert!(ctx.shared_array.is_empty());
    }

    #[test]
    fn test_effective_params_backpressure_aborts_when_shared_array_full() {
        let ctx = ctx_with_threads(4);
        // Fill the shared array past 80%.
        let cap = ctx.shared_array.capacity();
        for _ in 0..(cap * 9 / 10) {
            ctx.shared_array.push(Task::root(0, 0, Square::A1, 0, 1));
        }
        assert!(effective_params(&ctx, 0).is_none());
    }

    #[test]
    fn test_effective_params_loosens_under_high_idle_rate() {
        let ctx = ctx_with_threads(10);
        // All ten workers idle by default.
        let base = ctx.config.spawn_max_generation;
        let params = effective_params(&ctx, CHUNK_SIZE + 1).expect("not backpressured");
        assert!(params.max_generation > base);
    }

    #[test]
    fn test_try_export_chunk_keeps_best_locally() {
        let ctx = ctx_with_threads(1);
        let mut heap = LocalHeap::new();
        for p in 0..(CHUNK_SIZE as i64 + 10) {
            heap.push(Task::root(0, 0, Square::A1, p, 10));
        }
        let best_priority = heap.peek_priority();
        try_export_chunk(&mut heap, &ctx);
        assert_eq!(heap.peek_priority(), best_priority);
    }
}
