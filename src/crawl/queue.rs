// src/crawl/queue.rs
// =============================================================================
// The work queue: URLs that passed the filter pipeline and are waiting to be
// loaded.
//
// It's a plain FIFO. Breadth-first order means pages close to the seed get
// captured first, which is what you want if a crawl is interrupted.
//
// Only the crawl loop reads from it, and only the loop's dispatch step writes
// to it, so no locking is needed.
//
// Rust concepts:
// - VecDeque: Double-ended queue for breadth-first crawling
// =============================================================================

use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct WorkQueue {
    items: VecDeque<String>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // Appends to the tail
    pub fn push(&mut self, item: String) {
        self.items.push_back(item);
    }

    // Removes from the head, None when empty
    pub fn pop(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
