// Sum-tree priority store for prioritized experience replay
use crate::error::{AgentError, Result};

/// Complete binary tree flattened into `2 * capacity - 1` slots. Leaves live
/// in the last `capacity` slots and each one is paired with a payload slot.
/// Every internal node holds the sum of its two children, so the root is the
/// total priority mass.
#[derive(Debug, Clone)]
pub struct SumTree<T> {
    capacity: usize,
    tree: Vec<f64>,
    data: Vec<Option<T>>,
    write: usize,
    len: usize,
}

/// A leaf resolved by [`SumTree::sample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSample<'a, T> {
    pub leaf_index: usize,
    pub priority: f64,
    pub payload: &'a T,
}

impl<T> SumTree<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(AgentError::configuration("sum tree capacity must be positive"));
        }
        Ok(Self {
            capacity,
            tree: vec![0.0; 2 * capacity - 1],
            data: (0..capacity).map(|_| None).collect(),
            write: 0,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of populated payload slots (saturates at capacity).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Root value, the sum of every leaf priority.
    pub fn total(&self) -> f64 {
        self.tree[0]
    }

    /// Writes `payload` into the cursor slot, overwriting the oldest entry
    /// once the tree is full, and returns the leaf's tree index.
    pub fn insert(&mut self, priority: f64, payload: T) -> Result<usize> {
        check_priority(priority)?;
        let leaf_index = self.write + self.capacity - 1;
        self.data[self.write] = Some(payload);
        self.set_leaf(leaf_index, priority);

        self.write += 1;
        if self.write >= self.capacity {
            self.write = 0;
        }
        self.len = (self.len + 1).min(self.capacity);
        Ok(leaf_index)
    }

    /// Rewrites one leaf and pushes the delta up to the root.
    pub fn update(&mut self, leaf_index: usize, priority: f64) -> Result<()> {
        if !self.is_leaf(leaf_index) {
            return Err(AgentError::configuration(format!(
                "tree index {} is not a leaf (capacity {})",
                leaf_index, self.capacity
            )));
        }
        check_priority(priority)?;
        self.set_leaf(leaf_index, priority);
        Ok(())
    }

    /// Inverse-CDF lookup: walks down from the root, going left while
    /// `value` fits in the left subtree. Returns `None` only when the
    /// resolved leaf has never been written.
    pub fn sample(&self, value: f64) -> Option<TreeSample<'_, T>> {
        let mut idx = 0;
        let mut remaining = value;
        loop {
            let left = 2 * idx + 1;
            if left >= self.tree.len() {
                break;
            }
            if remaining <= self.tree[left] {
                idx = left;
            } else {
                remaining -= self.tree[left];
                idx = left + 1;
            }
        }

        self.data[self.data_index(idx)]
            .as_ref()
            .map(|payload| TreeSample {
                leaf_index: idx,
                priority: self.tree[idx],
                payload,
            })
    }

    /// Current priority stored at a leaf.
    pub fn priority(&self, leaf_index: usize) -> Option<f64> {
        self.is_leaf(leaf_index).then(|| self.tree[leaf_index])
    }

    pub fn payload(&self, leaf_index: usize) -> Option<&T> {
        if !self.is_leaf(leaf_index) {
            return None;
        }
        self.data[self.data_index(leaf_index)].as_ref()
    }

    /// Leaf priorities in payload-slot order.
    pub fn leaf_priorities(&self) -> &[f64] {
        &self.tree[self.capacity - 1..]
    }

    pub fn leaf_index(&self, data_index: usize) -> usize {
        data_index + self.capacity - 1
    }

    pub fn data_index(&self, leaf_index: usize) -> usize {
        leaf_index + 1 - self.capacity
    }

    fn is_leaf(&self, index: usize) -> bool {
        index >= self.capacity - 1 && index < self.tree.len()
    }

    fn set_leaf(&mut self, leaf_index: usize, priority: f64) {
        let change = priority - self.tree[leaf_index];
        self.tree[leaf_index] = priority;

        let mut idx = leaf_index;
        while idx != 0 {
            idx = (idx - 1) / 2;
            self.tree[idx] += change;
        }
    }
}

/// Leaf values must be finite and non-negative; anything else would poison
/// every ancestor sum.
fn check_priority(priority: f64) -> Result<()> {
    if !priority.is_finite() || priority < 0.0 {
        return Err(AgentError::InvalidPriority(priority));
    }
    Ok(())
}
