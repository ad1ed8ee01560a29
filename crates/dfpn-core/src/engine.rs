//! The DFPN engine : runs one [`Task`] to proof, disproof, or
//! voluntary abort. Recursion depth is bounded by the number of empty
//! squares (`MAX_EMPTIES`), so this is plain call-stack recursion — no
//! explicit continuation machinery, per the design notes' take on
//! "cooperative cancellation in recursive calls".

use arrayvec::ArrayVec;

use crate::arena::{Arena, MAX_CHILDREN, Node, NodeId};
use crate::board::{self, Board};
use crate::constants::{CANCELLATION_CHECK_INTERVAL, CHUNK_EXPORT_INTERVAL, DN_INF, MID_SEARCH_SPAWN_INTERVAL, PN_INF};
use crate::context::EngineContext;
use crate::eval;
use crate::queues::local_heap::LocalHeap;
use crate::spawn;
use crate::square::Square;
use crate::task::{NodeType, Task};
use crate::types::{Depth, GameResult, ProofNumber};
use crate::zobrist;

/// Per-worker scratch state threaded through one task's recursion. Holds
/// the counters the main loop needs for its periodic triggers
/// without making them fields of [`EngineContext`] (they are worker-local).
pub struct WorkerScratch<'a> {
    pub worker_id: usize,
    pub task: Task,
    pub node_counter: u64,
    pub loop_iterations: u64,
    pub should_abort_task: bool,
    pub fast_sharing: bool,
    pub local_heap: &'a mut LocalHeap,
}

/// Outcome of running one task to its main-loop exit (proof, disproof,
/// bound cutoff, or cooperative abort).
#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    pub pn: ProofNumber,
    pub dn: ProofNumber,
    pub result: GameResult,
    pub is_proven: bool,
    pub nodes: u64,
    pub aborted: bool,
}

/// Runs `scratch.task` to completion against a fresh [`Arena`] and returns
/// its outcome (through "On exit from the loop").
pub fn run_task(arena: &mut Arena, ctx: &EngineContext, scratch: &mut WorkerScratch) -> RunOutcome {
    arena.reset();
    let task = scratch.task;
    let key = zobrist::canonical_hash(task.player, task.opponent);

    let root = Node {
        player: task.player,
        opponent: task.opponent,
        node_type: task.node_type,
        depth: task.depth,
        threshold_pn: PN_INF + 1,
        threshold_dn: DN_INF + 1,
        ..Node::default()
    };
    let root_id = arena.alloc(root);

    if let Some(hit) = ctx.tt.probe(key, task.depth) {
        let n = arena.get_mut(root_id);
        n.pn = hit.pn;
        n.dn = hit.dn;
        n.result = hit.result;
        n.is_proven = hit.result.is_definitive();
        n.eval_score = hit.eval;

        // TT-hit side channel : a fresher, higher-priority chunk is
        // already waiting — hand this task's remaining work back to the
        // dispatcher instead of continuing to hog this worker.
        if ctx.global_queue.peek_top_priority() > task.priority {
            scratch.should_abort_task = true;
        }
    } else {
        let eval_score = if ctx.config.use_evaluation {
            eval::evaluate(task.player, task.opponent)
        } else {
            0
        };
        arena.get_mut(root_id).eval_score = eval_score;
    }

    if task.generation == 0 && task.is_root_task {
        expand(arena, root_id, ctx);
        spawn::trigger_root_split(arena, root_id, &task, ctx);
        spawn::trigger_early_spawn(arena, root_id, &task, ctx, scratch);
    }

    let completed = solve_node(arena, root_id, ctx, scratch, true);
    let node = arena.get(root_id);
    let outcome = RunOutcome {
        pn: node.pn,
        dn: node.dn,
        result: node.result,
        is_proven: node.is_proven,
        nodes: scratch.node_counter,
        aborted: !completed,
    };

    ctx.tt.store(key, task.depth, outcome.pn, outcome.dn, outcome.result, node.eval_score);
    outcome
}

/// Recursively drives one node's df-pn+ main loop. Returns `false`
/// if this call (or any descendant) was cooperatively aborted.
fn solve_node(arena: &mut Arena, node_id: NodeId, ctx: &EngineContext, scratch: &mut WorkerScratch, is_task_root: bool) -> bool {
    scratch.node_counter += 1;

    if !arena.get(node_id).expanded {
        expand(arena, node_id, ctx);
        if !is_task_root {
            // Trigger B only fires once per task, right after the task's
            // own root expands ; recursive re-expansion of deeper
            // nodes does not re-trigger it.
        }
    }

    loop {
        let (pn, dn, threshold_pn, threshold_dn, node_type) = {
            let n = arena.get(node_id);
            (n.pn, n.dn, n.threshold_pn, n.threshold_dn, n.node_type)
        };
        if !(pn > 0 && pn < threshold_pn && dn > 0 && dn < threshold_dn) {
            break;
        }

        if ctx.is_shutdown() || scratch.should_abort_task {
            return false;
        }

        if scratch.node_counter % CANCELLATION_CHECK_INTERVAL == 0 && ctx.time_limit_exceeded() {
            ctx.request_shutdown();
            return false;
        }

        scratch.loop_iterations += 1;
        if scratch.loop_iterations % MID_SEARCH_SPAWN_INTERVAL == 0 {
            spawn::trigger_mid_search_spawn(arena, node_id, &scratch.task, ctx, scratch.local_heap);
        }
        if scratch.node_counter % CHUNK_EXPORT_INTERVAL == 0 {
            spawn::try_export_chunk(scratch.local_heap, ctx);
        }

        let children: ArrayVec<NodeId, MAX_CHILDREN> = arena.get(node_id).children.clone();
        if children.is_empty() {
            break;
        }
        let best_child = select_best_child(arena, &children, node_type);
        narrow_thresholds(arena, node_id, &children, best_child, node_type);

        if !solve_node(arena, best_child, ctx, scratch, false) {
            return false;
        }
        update(arena, node_id);
    }
    true
}

/// Priority-of-a-child metric used both for main-loop child selection and
/// for spawn-candidate ranking (point 3).
pub(crate) fn priority_of(node_type: NodeType, child: &Node) -> i64 {
    match node_type {
        NodeType::Or => (PN_INF as i64 - child.pn as i64) / 1000 + child.eval_score as i64,
        NodeType::And => (DN_INF as i64 - child.dn as i64) / 1000 - child.eval_score as i64,
    }
}

fn select_best_child(arena: &Arena, children: &[NodeId], node_type: NodeType) -> NodeId {
    *children
        .iter()
        .max_by_key(|&&id| priority_of(node_type, arena.get(id)))
        .expect("select_best_child called with no children")
}

/// Standard df-pn+ threshold-narrowing recurrence (point 4
/// invariants): the child thresholds are derived from the parent's own
/// thresholds minus the contribution of every *other* child.
fn narrow_thresholds(arena: &mut Arena, parent_id: NodeId, children: &[NodeId], best: NodeId, node_type: NodeType) {
    let (parent_tpn, parent_tdn) = {
        let p = arena.get(parent_id);
        (p.threshold_pn, p.threshold_dn)
    };

    let (thpn, thdn) = match node_type {
        NodeType::Or => {
            let second_best_pn = children
                .iter()
                .filter(|&&id| id != best)
                .map(|&id| arena.get(id).pn)
                .min()
                .unwrap_or(PN_INF);
            let others_dn: u64 = children
                .iter()
                .filter(|&&id| id != best)
                .map(|&id| arena.get(id).dn as u64)
                .sum();
            let thpn = parent_tpn.min(second_best_pn.saturating_add(1));
            let thdn = (parent_tdn as u64).saturating_sub(others_dn).min(DN_INF as u64) as u32;
            (thpn, thdn.max(1))
        }
        NodeType::And => {
            let second_best_dn = children
                .iter()
                .filter(|&&id| id != best)
                .map(|&id| arena.get(id).dn)
                .min()
                .unwrap_or(DN_INF);
            let others_pn: u64 = children
                .iter()
                .filter(|&&id| id != best)
                .map(|&id| arena.get(id).pn as u64)
                .sum();
            let thdn = parent_tdn.min(second_best_dn.saturating_add(1));
            let thpn = (parent_tpn as u64).saturating_sub(others_pn).min(PN_INF as u64) as u32;
            (thpn.max(1), thdn)
        }
    };

    let c = arena.get_mut(best);
    c.threshold_pn = thpn;
    c.threshold_dn = thdn;
}

/// First-visit handling for a node (/ "Terminal handling at
/// expansion"), applied uniformly to the task's own root and to every
/// child the main loop descends into for the first time.
fn expand(arena: &mut Arena, node_id: NodeId, ctx: &EngineContext) {
    let (player, opponent, node_type, depth) = {
        let n = arena.get(node_id);
        (n.player, n.opponent, n.node_type, n.depth)
    };
    let board = Board::from_bitboards(player, opponent);
    let moves = board.get_moves();

    if moves == 0 {
        let passed = board.switch_players();
        if passed.get_moves() == 0 {
            terminalize(arena, node_id, &board, node_type);
            return;
        }
        let child = make_child(passed.player, passed.opponent, node_type.child(), depth, ctx);
        let child_id = arena.alloc(child);
        let n = arena.get_mut(node_id);
        n.children.push(child_id);
        n.expanded = true;
        update(arena, node_id);
        return;
    }

    let mut bb = moves;
    while bb != 0 {
        let sq = Square::from_u32_unchecked(bb.trailing_zeros());
        let mut np = player;
        let mut no = opponent;
        board::make_move(&mut np, &mut no, sq);
        let child = make_child(np, no, node_type.child(), depth - 1, ctx);
        let child_id = arena.alloc(child);
        arena.get_mut(node_id).children.push(child_id);
        bb = crate::bit::clear_lsb_u64(bb);
    }
    arena.get_mut(node_id).expanded = true;
    update(arena, node_id);
}

/// Terminal classification ("Terminal handling at expansion"): the raw
/// disc differential is always computed from `board`'s own `player`
/// perspective, then mapped relative to the side that played the root
/// move by flipping sign at AND nodes (AND nodes hold the opponent's turn).
fn terminalize(arena: &mut Arena, node_id: NodeId, board: &Board, node_type: NodeType) {
    let raw = board.final_score();
    let diff_for_root_mover = match node_type {
        NodeType::Or => raw,
        NodeType::And => -raw,
    };
    let (pn, dn, result) = match diff_for_root_mover.cmp(&0) {
        std::cmp::Ordering::Greater => (0, DN_INF, GameResult::Win),
        std::cmp::Ordering::Less => (PN_INF, 0, GameResult::Lose),
        std::cmp::Ordering::Equal => (PN_INF, DN_INF, GameResult::Draw),
    };
    let n = arena.get_mut(node_id);
    n.pn = pn;
    n.dn = dn;
    n.result = result;
    n.is_proven = true;
    n.expanded = true;
}

fn make_child(player: u64, opponent: u64, node_type: NodeType, depth: Depth, ctx: &EngineContext) -> Node {
    let key = zobrist::canonical_hash(player, opponent);
    if let Some(hit) = ctx.tt.probe(key, depth) {
        Node {
            player,
            opponent,
            node_type,
            depth,
            pn: hit.pn,
            dn: hit.dn,
            threshold_pn: PN_INF + 1,
            threshold_dn: DN_INF + 1,
            result: hit.result,
            is_proven: hit.result.is_definitive(),
            eval_score: hit.eval,
            ..Node::default()
        }
    } else {
        let eval_score = if ctx.config.use_evaluation {
            eval::evaluate(player, opponent)
        } else {
            0
        };
        Node {
            player,
            opponent,
            node_type,
            depth,
            pn: 1,
            dn: 1,
            threshold_pn: PN_INF + 1,
            threshold_dn: DN_INF + 1,
            eval_score,
            ..Node::default()
        }
    }
}

/// Recomputes `pn`/`dn` via the OR/AND recurrence and the tri-valued
/// `is_proven`/`result` propagation, type-aware at both OR and AND nodes
/// (the AND case is the adversarial dual of the OR case).
fn update(arena: &mut Arena, node_id: NodeId) {
    let node_type = arena.get(node_id).node_type;
    let children: ArrayVec<NodeId, MAX_CHILDREN> = arena.get(node_id).children.clone();
    if children.is_empty() {
        return;
    }

    let (pn, dn) = match node_type {
        NodeType::Or => {
            let pn = children.iter().map(|&c| arena.get(c).pn).min().unwrap_or(PN_INF);
            let dn_sum: u64 = children.iter().map(|&c| arena.get(c).dn as u64).sum();
            (pn, dn_sum.min(DN_INF as u64) as u32)
        }
        NodeType::And => {
            let pn_sum: u64 = children.iter().map(|&c| arena.get(c).pn as u64).sum();
            let dn = children.iter().map(|&c| arena.get(c).dn).min().unwrap_or(DN_INF);
            (pn_sum.min(PN_INF as u64) as u32, dn)
        }
    };

    let (is_proven, result) = propagate_result(arena, &children, node_type);

    let n = arena.get_mut(node_id);
    n.pn = pn;
    n.dn = dn;
    n.is_proven = is_proven;
    n.result = result;
}

fn propagate_result(arena: &Arena, children: &[NodeId], node_type: NodeType) -> (bool, GameResult) {
    let statuses: ArrayVec<(bool, GameResult), MAX_CHILDREN> =
        children.iter().map(|&c| (arena.get(c).is_proven, arena.get(c).result)).collect();

    let all_proven = statuses.iter().all(|&(proven, _)| proven);
    match node_type {
        NodeType::Or => {
            if statuses.iter().any(|&(proven, r)| proven && r == GameResult::Win) {
                return (true, GameResult::Win);
            }
            if all_proven {
                if statuses.iter().all(|&(_, r)| r == GameResult::Lose) {
                    return (true, GameResult::Lose);
                }
                if statuses.iter().any(|&(_, r)| r == GameResult::Draw) {
                    return (true, GameResult::Draw);
                }
            }
            (false, GameResult::Unknown)
        }
        NodeType::And => {
            if statuses.iter().any(|&(proven, r)| proven && r == GameResult::Lose) {
                return (true, GameResult::Lose);
            }
            if all_proven {
                if statuses.iter().all(|&(_, r)| r == GameResult::Win) {
                    return (true, GameResult::Win);
                }
                // All proven, none LOSE, not unanimously WIN: a mix of WIN
                // and DRAW children. The adversary prefers DRAW over
                // handing the root mover a WIN.
                return (true, GameResult::Draw);
            }
            (false, GameResult::Unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EngineContext, RootMoveState};
    use crate::queues::local_heap::LocalHeap;
    use crate::tt::TranspositionTable;

    fn test_context() -> EngineContext {
        EngineContext::new(
            crate::context::SolverConfig {
                threads: 1,
                ..crate::context::SolverConfig::default()
            },
            vec![RootMoveState::new(Square::C4, 0, 0, 0)],
            TranspositionTable::new(1),
        )
    }

    #[test]
    fn test_trivial_terminal_full_board_win() {
        // Player holds 34 squares, opponent 30, board full (no empties).
        let player: u64 = (1u64 << 34) - 1;
        let opponent: u64 = !player;
        let ctx = test_context();
        let mut arena = Arena::new();
        let mut heap = LocalHeap::new();
        let task = Task::root(player, opponent, Square::A1, 0, 0);
        let mut scratch = WorkerScratch {
            worker_id: 0,
            task,
            node_counter: 0,
            loop_iterations: 0,
            should_abort_task: false,
            fast_sharing: false,
            local_heap: &mut heap,
        };
        let outcome = run_task(&mut arena, &ctx, &mut scratch);
        assert!(!outcome.aborted);
        assert!(outcome.is_proven);
        // `Task::root` builds an AND task (the opponent's reply after our
        // move); the raw diff is positive for `player`, and AND nodes flip
        // sign, so the root-mover's outcome here is LOSE.
        assert_eq!(outcome.result, GameResult::Lose);
        assert_eq!(outcome.nodes, 1);
    }

    #[test]
    fn test_terminal_mapping_or_node_is_unflipped() {
        // Full board, player ahead 34-30: at an OR node the raw differential
        // maps straight through with no sign flip.
        let player: u64 = (1u64 << 34) - 1;
        let opponent: u64 = !player;
        let board = Board::from_bitboards(player, opponent);
        let mut arena = Arena::new();
        let root = arena.alloc(Node {
            node_type: NodeType::Or,
            ..Node::default()
        });
        terminalize(&mut arena, root, &board, NodeType::Or);
        let node = arena.get(root);
        assert!(node.is_proven);
        assert_eq!(node.result, GameResult::Win);
        assert_eq!(node.pn, 0);
        assert_eq!(node.dn, DN_INF);
    }

    #[test]
    fn test_terminal_mapping_and_node_flips_sign() {
        // Same board, but at an AND node the same raw differential (still
        // positive for `player`) is negated before mapping, since AND nodes
        // represent the opponent's turn relative to the root mover.
        let player: u64 = (1u64 << 34) - 1;
        let opponent: u64 = !player;
        let board = Board::from_bitboards(player, opponent);
        let mut arena = Arena::new();
        let root = arena.alloc(Node {
            node_type: NodeType::And,
            ..Node::default()
        });
        terminalize(&mut arena, root, &board, NodeType::And);
        let node = arena.get(root);
        assert!(node.is_proven);
        assert_eq!(node.result, GameResult::Lose);
        assert_eq!(node.pn, PN_INF);
        assert_eq!(node.dn, 0);
    }

    #[test]
    fn test_pass_node_preserves_depth_and_flips_type() {
        let mut arena = Arena::new();
        let ctx = test_context();
        // A position where `player` has no legal move but `opponent` does:
        // rows engineered so get_moves(player, opponent) == 0.
        let player = 0u64;
        let opponent = Board::default().opponent | Board::default().player;
        let root = Node {
            player,
            opponent,
            node_type: NodeType::Or,
            depth: 10,
            threshold_pn: PN_INF + 1,
            threshold_dn: DN_INF + 1,
            ..Node::default()
        };
        let root_id = arena.alloc(root);
        expand(&mut arena, root_id, &ctx);
        let node = arena.get(root_id);
        assert!(node.expanded);
        assert_eq!(node.children.len(), 1);
        let child = arena.get(node.children[0]);
        assert_eq!(child.node_type, NodeType::And);
        assert_eq!(child.depth, 10);
    }

    #[test]
    fn test_or_recurrence_matches_children() {
        let mut arena = Arena::new();
        let c1 = arena.alloc(Node {
            pn: 4,
            dn: 2,
            is_proven: false,
            ..Node::default()
        });
        let c2 = arena.alloc(Node {
            pn: 7,
            dn: 3,
            is_proven: false,
            ..Node::default()
        });
        let mut children = ArrayVec::new();
        children.push(c1);
        children.push(c2);
        let parent = arena.alloc(Node {
            node_type: NodeType::Or,
            children,
            ..Node::default()
        });
        update(&mut arena, parent);
        let n = arena.get(parent);
        assert_eq!(n.pn, 4);
        assert_eq!(n.dn, 5);
    }

    #[test]
    fn test_and_recurrence_matches_children() {
        let mut arena = Arena::new();
        let c1 = arena.alloc(Node {
            pn: 4,
            dn: 2,
            is_proven: false,
            ..Node::default()
        });
        let c2 = arena.alloc(Node {
            pn: 7,
            dn: 3,
            is_proven: false,
            ..Node::default()
        });
        let mut children = ArrayVec::new();
        children.push(c1);
        children.push(c2);
        let parent = arena.alloc(Node {
            node_type: NodeType::And,
            children,
            ..Node::default()
        });
        update(&mut arena, parent);
        let n = arena.get(parent);
        assert_eq!(n.pn, 11);
        assert_eq!(n.dn, 2);
    }

    #[test]
    fn test_or_propagation_win_if_any_child_win() {
        let mut arena = Arena::new();
        let c1 = arena.alloc(Node {
            is_proven: true,
            result: GameResult::Lose,
            ..Node::default()
        });
        let c2 = arena.alloc(Node {
            is_proven: true,
            result: GameResult::Win,
            pn: 0,
            dn: DN_INF,
            ..Node::default()
        });
        let mut children = ArrayVec::new();
        children.push(c1);
        children.push(c2);
        let parent = arena.alloc(Node {
            node_type: NodeType::Or,
            children,
            ..Node::default()
        });
        update(&mut arena, parent);
        let n = arena.get(parent);
        assert!(n.is_proven);
        assert_eq!(n.result, GameResult::Win);
    }

    #[test]
    fn test_and_propagation_lose_if_any_child_lose() {
        let mut arena = Arena::new();
        let c1 = arena.alloc(Node {
            is_proven: true,
            result: GameResult::Win,
            pn: 0,
            dn: DN_INF,
            ..Node::default()
        });
        let c2 = arena.alloc(Node {
            is_proven: true,
            result: GameResult::Lose,
            pn: PN_INF,
            dn: 0,
            ..Node::default()
        });
        let mut children = ArrayVec::new();
        children.push(c1);
        children.push(c2);
        let parent = arena.alloc(Node {
            node_type: NodeType::And,
            children,
            ..Node::default()
        });
        update(&mut arena, parent);
        let n = arena.get(parent);
        assert!(n.is_proven);
        assert_eq!(n.result, GameResult::Lose);
    }

    #[test]
    fn test_and_propagation_draw_when_mixed_win_and_draw() {
        let mut arena = Arena::new();
        let c1 = arena.alloc(Node {
            is_proven: true,
            result: GameResult::Win,
            pn: 0,
            dn: DN_INF,
            ..Node::default()
        });
        let c2 = arena.alloc(Node {
            is_proven: true,
            result: GameResult::Draw,
            pn: PN_INF,
            dn: DN_INF,
            ..Node::default()
        });
        let mut children = ArrayVec::new();
        children.push(c1);
        children.push(c2);
        let parent = arena.alloc(Node {
            node_type: NodeType::And,
            children,
            ..Node::default()
        });
        update(&mut arena, parent);
        let n = arena.get(parent);
        assert!(n.is_proven);
        assert_eq!(n.result, GameResult::Draw);
    }

    #[test]
    fn test_unproven_child_blocks_propagation() {
        let mut arena = Arena::new();
        let c1 = arena.alloc(Node {
            is_proven: false,
            result: GameResult::Unknown,
            pn: 3,
            dn: 3,
            ..Node::default()
        });
        let c2 = arena.alloc(Node {
            is_proven: true,
            result: GameResult::Lose,
            pn: PN_INF,
            dn: 0,
            ..Node::default()
        });
        let mut children = ArrayVec::new();
        children.push(c1);
        children.push(c2);
        let parent = arena.alloc(Node {
            node_type: NodeType::Or,
            children,
            ..Node::default()
        });
        update(&mut arena, parent);
        let n = arena.get(parent);
        assert!(!n.is_proven);
        assert_eq!(n.result, GameResult::Unknown);
    }
}
