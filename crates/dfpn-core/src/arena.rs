//! Per-worker node arena: a block-chunked pool of df-pn+ nodes with stable
//! `NodeId` indices instead of raw pointers, so the tree built during one
//! task can be thrown away in O(1) between tasks. A growable, block-chunked
//! backing store rather than a fixed-capacity array, since the arena has no
//! fixed upper bound on live nodes within one traversal.

use arrayvec::ArrayVec;

use crate::task::NodeType;
use crate::types::{Depth, GameResult, ProofNumber, Score};

/// Nodes per arena block.
const BLOCK_SIZE: usize = 8192;

/// Upper bound on legal moves from one Othello position (actual max is 33;
/// rounded up to 34 for headroom).
pub const MAX_CHILDREN: usize = 34;

/// Stable index into an [`Arena`]. `NONE` marks "no child" / "not expanded".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn is_none(self) -> bool {
        self == NodeId::NONE
    }
}

/// A single df-pn+ node ("DFPN node"), transient and arena-allocated.
#[derive(Debug, Clone)]
pub struct Node {
    pub player: u64,
    pub opponent: u64,
    pub node_type: NodeType,
    pub depth: Depth,
    pub pn: ProofNumber,
    pub dn: ProofNumber,
    pub threshold_pn: ProofNumber,
    pub threshold_dn: ProofNumber,
    pub result: GameResult,
    pub is_proven: bool,
    pub eval_score: Score,
    pub expanded: bool,
    pub children: ArrayVec<NodeId, MAX_CHILDREN>,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            player: 0,
            opponent: 0,
            node_type: NodeType::Or,
            depth: 0,
            pn: 0,
            dn: 0,
            threshold_pn: 0,
            threshold_dn: 0,
            result: GameResult::Unknown,
            is_proven: false,
            eval_score: 0,
            expanded: false,
            children: ArrayVec::new(),
        }
    }
}

/// Block-allocated pool, owned by one worker. Accessed only by its owning
/// thread between `reset` calls, so no synchronization is needed.
pub struct Arena {
    blocks: Vec<Box<[Node; BLOCK_SIZE]>>,
    len: usize,
}

impl Arena {
    pub fn new() -> Arena {
        Arena {
            blocks: vec![new_zeroed_block()],
            len: 0,
        }
    }

    /// Allocates the next node, growing blocks on demand, and returns its id.
    /// The returned node is a fresh [`Node::default`] — callers fill in
    /// fields immediately, so no stale data from a prior task is ever read.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        let block_idx = self.len / BLOCK_SIZE;
        let in_block = self.len % BLOCK_SIZE;

        if block_idx == self.blocks.len() {
            self.blocks.push(new_zeroed_block());
        }

        self.blocks[block_idx][in_block] = node;
        let id = NodeId(self.len as u32);
        self.len += 1;
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        let idx = id.0 as usize;
        &self.blocks[idx / BLOCK_SIZE][idx % BLOCK_SIZE]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        let idx = id.0 as usize;
        &mut self.blocks[idx / BLOCK_SIZE][idx % BLOCK_SIZE]
    }

    /// Rewinds to the first block for the next task. Subsequent blocks keep
    /// their stale contents until `alloc` overwrites them in full, which it
    /// always does, so no separate lazy-zero pass is required.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Arena {
    fn default() -> Self {
        Arena::new()
    }
}

fn new_zeroed_block() -> Box<[Node; BLOCK_SIZE]> {
    let v: Vec<Node> = (0..BLOCK_SIZE).map(|_| Node::default()).collect();
    v.into_boxed_slice()
        .try_into()
        .unwrap_or_else(|_| unreachable!("block size mismatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_returns_distinct_ids() {
        let mut arena = Arena::new();
        let a = arena.alloc(Node::default());
        let b = arena.alloc(Node::default());
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn test_alloc_across_block_boundary() {
        let mut arena = Arena::new();
        for i in 0..(BLOCK_SIZE + 10) {
            let id = arena.alloc(Node {
                player: i as u64,
                ..Node::default()
            });
            assert_eq!(arena.get(id).player, i as u64);
        }
        assert_eq!(arena.len(), BLOCK_SIZE + 10);
    }

    #[test]
    fn test_reset_rewinds_and_reuses_storage() {
        let mut arena = Arena::new();
        arena.alloc(Node {
            player: 7,
            ..Node::default()
        });
        arena.reset();
        assert!(arena.is_empty());
        let id = arena.alloc(Node::default());
        assert_eq!(id.0, 0);
        assert_eq!(arena.get(id).player, 0);
    }

    #[test]
    fn test_get_mut_mutates_in_place() {
        let mut arena = Arena::new();
        let id = arena.alloc(Node::default());
        arena.get_mut(id).pn = 42;
        assert_eq!(arena.get(id).pn, 42);
    }

    #[test]
    fn test_node_id_none_sentinel() {
        assert!(NodeId::NONE.is_none());
        assert!(!NodeId(0).is_none());
    }
}
