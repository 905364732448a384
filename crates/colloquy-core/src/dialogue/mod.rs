//! Topic-level dialogue structure: phases, topics, plans and scenario progress.

pub mod phase;
pub mod plan;
pub mod scenario;
pub mod topic;

pub use phase::PhaseMachine;
pub use plan::{derive_plan, plan_context};
pub use scenario::ScenarioRunner;
pub use topic::TopicTracker;
