pub mod record;
pub mod scheduler;
pub mod step;

pub use record::{RunRecord, StatusSummary};
pub use scheduler::{RunState, Scheduler, TickReport};
pub use step::AgentOutcome;
