//! Paged traversal with a per-block work budget.
//!
//! Full-table walks (pools, liquidity positions) are expressed as pages so a
//! single block never does more than its budget allows; the next block
//! resumes from persisted state.

/// A page of records plus the key to resume after, if more remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Request for the page that starts strictly after `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub after: Option<String>,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { after: None, limit }
    }
}

/// Units of work a caller may still spend in this block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkBudget {
    remaining: usize,
}

impl WorkBudget {
    pub fn new(limit: usize) -> Self {
        Self { remaining: limit }
    }

    /// Spend one unit; false once the budget is gone.
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}
