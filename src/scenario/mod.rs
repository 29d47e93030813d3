pub mod context;
pub mod loader;
pub mod rules;
pub mod state;

pub use context::SpatialContext;
pub use loader::load_scenario;
pub use rules::{Action, ActionKind, Bounds, ScenarioRules};
pub use state::ScenarioState;
