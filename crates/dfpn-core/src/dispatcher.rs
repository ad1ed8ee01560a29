//! Dispatcher : decides where a worker's next task comes from.
//! Fast-sharing mode favors low latency while ramp-up/drain leaves most
//! workers idle; normal mode favors throughput via chunked batches once
//! the system is saturated.

use std::time::Duration;

use crate::constants::DISPATCH_WAIT_MS;
use crate::context::EngineContext;
use crate::queues::local_heap::LocalHeap;
use crate::task::Task;

/// `true` while fast-sharing mode should be used: any worker is currently
/// idle (equivalently, `active_workers < 100%` of total).
pub fn is_fast_sharing(ctx: &EngineContext) -> bool {
    ctx.worker_state.n_workers() == 0 || ctx.worker_state.has_idle()
}

/// Pulls the next task for a worker, blocking (with a short timeout) only
/// when every source is exhausted. Returns `None` only when the caller
/// should stop entirely (shutdown/win-found with nothing left to try).
pub fn dispatch(ctx: &EngineContext, local_heap: &mut LocalHeap) -> Option<Task> {
    loop {
        if let Some(t) = try_dispatch_once(ctx, local_heap) {
            return Some(t);
        }
        if ctx.is_shutdown() {
            return None;
        }
        ctx.global_queue.wait_timeout(Duration::from_millis(DISPATCH_WAIT_MS));
        if ctx.is_shutdown() {
            return None;
        }
    }
}

fn try_dispatch_once(ctx: &EngineContext, local_heap: &mut LocalHeap) -> Option<Task> {
    if is_fast_sharing(ctx) {
        if let Some(t) = local_heap.pop() {
            return Some(t);
        }
        return ctx.shared_array.pop();
    }

    if ctx.global_queue.peek_top_priority() > local_heap.peek_priority() {
        if let Some(chunk) = ctx.global_queue.pop() {
            let mut tasks = chunk.tasks;
            let first = tasks.swap_remove(0);
            for t in tasks {
                local_heap.push(t);
            }
            return Some(first);
        }
    }

    if let Some(t) = local_heap.pop() {
        return Some(t);
    }
    if let Some(chunk) = ctx.global_queue.pop() {
        let mut tasks = chunk.tasks;
        let first = tasks.swap_remove(0);
        for t in tasks {
            local_heap.push(t);
        }
        return Some(first);
    }
    ctx.shared_array.pop()
}
