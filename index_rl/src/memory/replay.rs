// Prioritized experience replay on top of the sum tree
use rand::Rng;

use super::sum_tree::SumTree;
use crate::error::{AgentError, Result};

/// Replay buffer whose sampling weight is `(|td_error| + epsilon) ^ alpha`.
#[derive(Debug, Clone)]
pub struct ReplayMemory<T> {
    tree: SumTree<T>,
    epsilon: f64,
    alpha: f64,
}

/// One stratified draw: the leaf it came from and a copy of its payload.
#[derive(Debug, Clone)]
pub struct SampledEntry<T> {
    pub leaf_index: usize,
    pub priority: f64,
    pub item: T,
}

impl<T: Clone> ReplayMemory<T> {
    pub fn new(capacity: usize, epsilon: f64, alpha: f64) -> Result<Self> {
        if !(epsilon > 0.0) {
            return Err(AgentError::configuration(format!(
                "priority epsilon must be positive, got {}",
                epsilon
            )));
        }
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(AgentError::configuration(format!(
                "priority alpha must be in (0, 1], got {}",
                alpha
            )));
        }
        Ok(Self {
            tree: SumTree::new(capacity)?,
            epsilon,
            alpha,
        })
    }

    pub fn priority(&self, td_error: f64) -> f64 {
        (td_error.abs() + self.epsilon).powf(self.alpha)
    }

    /// Stores a transition and returns the leaf it landed in.
    pub fn add(&mut self, td_error: f64, item: T) -> Result<usize> {
        let priority = self.priority(td_error);
        self.tree.insert(priority, item)
    }

    /// Splits `[0, total)` into `n` equal segments and draws one value
    /// uniformly from each, so every batch spans the priority spectrum.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<SampledEntry<T>>> {
        if n == 0 {
            return Err(AgentError::configuration("replay batch size must be positive"));
        }
        let total = self.tree.total();
        if self.tree.is_empty() || !(total > 0.0) {
            return Err(AgentError::EmptyMemory);
        }

        let segment = total / n as f64;
        let mut batch = Vec::with_capacity(n);
        for i in 0..n {
            let low = segment * i as f64;
            let value = low + rng.gen::<f64>() * segment;
            // Rounding in the tree sums can push a draw near `total` past the
            // populated leaves; retry from the segment's lower bound.
            let hit = self
                .tree
                .sample(value)
                .or_else(|| self.tree.sample(low))
                .ok_or(AgentError::EmptyMemory)?;
            batch.push(SampledEntry {
                leaf_index: hit.leaf_index,
                priority: hit.priority,
                item: hit.payload.clone(),
            });
        }
        Ok(batch)
    }

    /// Refreshes a leaf's priority from a new TD error.
    pub fn update(&mut self, leaf_index: usize, td_error: f64) -> Result<()> {
        let priority = self.priority(td_error);
        self.tree.update(leaf_index, priority)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    pub fn total_priority(&self) -> f64 {
        self.tree.total()
    }

    pub fn tree(&self) -> &SumTree<T> {
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_priority_formula() {
        let memory = ReplayMemory::<u8>::new(4, 0.01, 0.6).unwrap();
        let expected = (0.5f64 + 0.01).powf(0.6);
        assert!((memory.priority(0.5) - expected).abs() < 1e-12);
        // sign of the error is irrelevant
        assert_eq!(memory.priority(-0.5), memory.priority(0.5));
        // zero error still has positive mass
        assert!(memory.priority(0.0) > 0.0);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(ReplayMemory::<u8>::new(4, 0.0, 0.6).is_err());
        assert!(ReplayMemory::<u8>::new(4, 0.01, 0.0).is_err());
        assert!(ReplayMemory::<u8>::new(4, 0.01, 1.5).is_err());
        assert!(ReplayMemory::<u8>::new(0, 0.01, 0.6).is_err());
    }

    #[test]
    fn test_sample_empty_memory_fails() {
        let memory = ReplayMemory::<u8>::new(4, 0.01, 0.6).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(memory.sample(1, &mut rng), Err(AgentError::EmptyMemory)));
    }

    #[test]
    fn test_sample_returns_exactly_n() {
        let mut memory = ReplayMemory::new(16, 0.01, 0.6).unwrap();
        for i in 0..3u32 {
            memory.add(i as f64, i).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(7);
        let batch = memory.sample(8, &mut rng).unwrap();
        assert_eq!(batch.len(), 8);
        assert!(batch.iter().all(|e| e.item < 3));
    }

    #[test]
    fn test_stratified_sampling_covers_spectrum() {
        // equal mass per item: segment i can only resolve to item i
        let mut memory = ReplayMemory::new(4, 0.01, 1.0).unwrap();
        for item in ['a', 'b', 'c', 'd'] {
            memory.add(0.99, item).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let batch = memory.sample(4, &mut rng).unwrap();
            let items: Vec<char> = batch.iter().map(|e| e.item).collect();
            assert_eq!(items, vec!['a', 'b', 'c', 'd']);
        }
    }

    #[test]
    fn test_update_changes_priority() {
        let mut memory = ReplayMemory::new(4, 0.01, 1.0).unwrap();
        let leaf = memory.add(1.0, 0u8).unwrap();
        memory.add(1.0, 1u8).unwrap();
        let before = memory.total_priority();
        memory.update(leaf, 3.0).unwrap();
        assert!((memory.total_priority() - (before + 2.0)).abs() < 1e-9);
        assert!((memory.tree().priority(leaf).unwrap() - 3.01).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_td_error_rejected() {
        let mut memory = ReplayMemory::new(4, 0.01, 0.6).unwrap();
        memory.add(1.0, 0u8).unwrap();
        let before = memory.total_priority();
        assert!(memory.add(f64::NAN, 1u8).is_err());
        assert!(memory.update(memory.tree().leaf_index(0), f64::INFINITY).is_err());
        assert_eq!(memory.total_priority(), before);
        assert_eq!(memory.len(), 1);
    }
}
