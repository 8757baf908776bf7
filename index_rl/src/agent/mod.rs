// Learning agent: epsilon-greedy policy, double-Q targets, replay training
pub mod ddqn;
pub mod schedule;
pub mod targets;

pub use ddqn::{Agent, ReplayReport, Transition};
pub use schedule::EpsilonSchedule;
pub use targets::{argmax, double_q_target};
