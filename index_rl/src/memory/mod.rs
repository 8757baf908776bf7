// Prioritized replay storage
pub mod replay;
pub mod sum_tree;

pub use replay::{ReplayMemory, SampledEntry};
pub use sum_tree::{SumTree, TreeSample};
