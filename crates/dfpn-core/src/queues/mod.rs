//! The three task-transfer substrates of the hybrid work-distribution
//! model (-): per-worker [`local_heap`], global [`chunk_queue`], and
//! the lock-free [`shared_array`] ring.

pub mod chunk_queue;
pub mod local_heap;
pub mod shared_array;
