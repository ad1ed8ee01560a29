//! One worker's lifetime : repeatedly dispatch a task, run it to
//! completion, record the outcome, and feed root-task requeues back into
//! the local heap — until shutdown or a proven WIN ends the search.

use std::sync::atomic::Ordering;

use crate::arena::Arena;
use crate::context::EngineContext;
use crate::dispatcher;
use crate::engine::{self, WorkerScratch};
use crate::queues::local_heap::LocalHeap;
use crate::types::GameResult;

/// Runs worker `worker_id` until the context signals shutdown or a proven
/// win. Drains its `LocalHeap` into the `SharedTaskArray` on the way out
/// ("Lifecycles").
pub fn run(worker_id: usize, ctx: &EngineContext) {
    let mut arena = Arena::new();
    let mut local_heap = LocalHeap::new();

    loop {
        if ctx.is_shutdown() {
            break;
        }
        let task = match dispatcher::dispatch(ctx, &mut local_heap) {
            Some(t) => t,
            None => break,
        };

        ctx.worker_state.set_busy(worker_id);
        let fast_sharing = dispatcher::is_fast_sharing(ctx);
        let mut scratch = WorkerScratch {
            worker_id,
            task,
            node_counter: 0,
            loop_iterations: 0,
            should_abort_task: false,
            fast_sharing,
            local_heap: &mut local_heap,
        };
        let outcome = engine::run_task(&mut arena, ctx, &mut scratch);
        ctx.worker_state.set_idle(worker_id);

        ctx.total_nodes.fetch_add(outcome.nodes, Ordering::Relaxed);
        if !task.is_root_task {
            ctx.subtasks_completed.fetch_add(1, Ordering::Relaxed);
        }

        if task.is_root_task {
            handle_root_outcome(ctx, &task, outcome, &mut local_heap);
        }
        // Non-root tasks leave their partial progress in the TT for
        // whichever task (root or otherwise) next probes that position;
        // there is no separate bookkeeping for them beyond the counters
        // above ("On exit from the loop").
    }

    while let Some(t) = local_heap.pop() {
        ctx.shared_array.push(t);
    }
}

fn handle_root_outcome(
    ctx: &EngineContext,
    task: &crate::task::Task,
    outcome: engine::RunOutcome,
    local_heap: &mut LocalHeap,
) {
    let root_state = ctx
        .root_moves
        .iter()
        .find(|rm| rm.sq == task.root_move)
        .expect("root task must match a known root move");

    root_state.add_nodes(outcome.nodes);

    if outcome.aborted {
        // Cooperatively handed off mid-flight (TT-hit side channel, or
        // global shutdown/time limit); partial progress is in the TT and
        // will resurface on the next probe of this position. Push the
        // task back so this root move still gets a chance at a definitive
        // result instead of being silently dropped.
        if !local_heap.push(*task) {
            ctx.shared_array.push(*task);
        }
        return;
    }

    match outcome.result {
        GameResult::Win => {
            root_state.try_set_result(GameResult::Win);
            ctx.announce_win(task.root_move);
            ctx.tasks_completed.fetch_add(1, Ordering::Relaxed);
        }
        GameResult::Lose | GameResult::Draw => {
            root_state.try_set_result(outcome.result);
            ctx.tasks_completed.fetch_add(1, Ordering::Relaxed);
        }
        GameResult::Unknown => {
            // Bound cutoff without a definitive proof: requeue with a
            // priority penalty, forcing the normal (non-root-split) path
            // on the next attempt ("Root-task requeue").
            if root_state.requeue_allowed() {
                let mut requeued = *task;
                requeued.priority -= 100;
                requeued.generation = 1;
                if !local_heap.push(requeued) {
                    ctx.shared_array.push(requeued);
                }
            } else {
                // Livelock guard tripped (Open Questions): stop
                // requeuing and accept UNKNOWN as final for this root
                // rather than spin forever. `result` stays `Unknown`;
                // `global::solve`'s completion check accounts for this.
                ctx.tasks_completed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
