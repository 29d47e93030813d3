//! Scenario rule set: action vocabulary, coordinate bounds, pacing
//!
//! Rules are loaded once from `scenario.toml` and never mutated during a
//! run. Everything the decoder needs to validate a model reply lives here,
//! so validation stays a pure function of (response, rules).

use crate::core::error::{Result, SimError};
use serde::{Deserialize, Serialize};

/// The action vocabulary exposed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    MoveTo,
    Wait,
    Interact,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::MoveTo => "move_to",
            ActionKind::Wait => "wait",
            ActionKind::Interact => "interact",
        }
    }
}

/// A decoded, validated instruction for one agent
///
/// Constructed only by the response decoder (or as the scenario fallback),
/// and applied exactly once by the step controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Move toward the given WGS84 coordinate
    MoveTo { lon: f64, lat: f64 },
    /// Stay in place this tick
    Wait,
    /// Interact with a nearby named agent
    Interact { target: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::MoveTo { .. } => ActionKind::MoveTo,
            Action::Wait => ActionKind::Wait,
            Action::Interact { .. } => ActionKind::Interact,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::MoveTo { lon, lat } => write!(f, "move_to({lon:.6};{lat:.6})"),
            Action::Wait => write!(f, "wait"),
            Action::Interact { target } => write!(f, "interact({target})"),
        }
    }
}

/// Axis-aligned WGS84 bounding box for the scenario area
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon.is_finite()
            && lat.is_finite()
            && lon >= self.min_lon
            && lon <= self.max_lon
            && lat >= self.min_lat
            && lat <= self.max_lat
    }
}

fn default_allowed_actions() -> Vec<ActionKind> {
    vec![ActionKind::MoveTo, ActionKind::Wait, ActionKind::Interact]
}

fn default_fallback() -> ActionKind {
    ActionKind::Wait
}

fn default_minutes_per_step() -> u32 {
    5
}

fn default_n_days() -> u32 {
    5
}

fn default_max_ticks() -> u64 {
    10_000
}

fn default_speed_kmh() -> f64 {
    5.0
}

fn default_neighborhood_radius_m() -> f64 {
    250.0
}

fn default_arrival_radius_m() -> f64 {
    50.0
}

fn default_max_prompt_chars() -> usize {
    4000
}

fn default_max_neighbors() -> usize {
    8
}

/// Static rule parameters for one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRules {
    /// Scenario name, used for the output directory
    pub name: String,

    /// Actions the model is allowed to choose from
    #[serde(default = "default_allowed_actions")]
    pub allowed_actions: Vec<ActionKind>,

    /// Safe default substituted when a reply cannot be trusted.
    /// Must be a parameter-free member of `allowed_actions`.
    #[serde(default = "default_fallback")]
    pub fallback: ActionKind,

    /// Coordinate bounds every position and move target must satisfy
    pub bounds: Bounds,

    /// Simulated minutes that pass per tick (must stay below 60)
    #[serde(default = "default_minutes_per_step")]
    pub minutes_per_step: u32,

    /// Number of simulated days before the run terminates
    #[serde(default = "default_n_days")]
    pub n_days: u32,

    /// Hard tick budget, a backstop independent of the day counter
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Movement speed applied to agents without their own speed
    #[serde(default = "default_speed_kmh")]
    pub default_speed_kmh: f64,

    /// Radius within which other agents appear in the spatial context
    #[serde(default = "default_neighborhood_radius_m")]
    pub neighborhood_radius_m: f64,

    /// Distance from the goal at which an agent counts as arrived
    #[serde(default = "default_arrival_radius_m")]
    pub arrival_radius_m: f64,

    /// Upper bound on the encoded prompt size in characters
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Cap on neighbors listed in the prompt (nearest first)
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,

    /// Consecutive fallback outcomes after which an agent is marked
    /// stuck (terminal). Absent means agents never escalate.
    #[serde(default)]
    pub stuck_after_fallbacks: Option<u32>,

    /// Seed for initial placement jitter
    #[serde(default)]
    pub seed: u64,

    /// Maximum placement jitter around an agent's home, in meters
    #[serde(default)]
    pub placement_jitter_m: f64,
}

impl ScenarioRules {
    /// The scenario-defined no-op substituted on fallback
    pub fn fallback_action(&self) -> Action {
        match self.fallback {
            ActionKind::Wait => Action::Wait,
            // validate() rejects parameterized fallbacks; wait is the
            // only kind that can be constructed without model input
            _ => Action::Wait,
        }
    }

    /// Check internal consistency; violations are fatal at load time
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SimError::InvalidScenario("scenario name is empty".into()));
        }
        if self.allowed_actions.is_empty() {
            return Err(SimError::InvalidScenario(
                "allowed_actions must not be empty".into(),
            ));
        }
        if !self.allowed_actions.contains(&self.fallback) {
            return Err(SimError::InvalidScenario(format!(
                "fallback action '{}' is not in allowed_actions",
                self.fallback.as_str()
            )));
        }
        if self.fallback != ActionKind::Wait {
            return Err(SimError::InvalidScenario(format!(
                "fallback action must be parameter-free, got '{}'",
                self.fallback.as_str()
            )));
        }
        if self.bounds.min_lon >= self.bounds.max_lon
            || self.bounds.min_lat >= self.bounds.max_lat
        {
            return Err(SimError::InvalidScenario(format!(
                "bounds are inverted or empty: {:?}",
                self.bounds
            )));
        }
        if self.minutes_per_step == 0 || self.minutes_per_step >= 60 {
            return Err(SimError::InvalidScenario(format!(
                "minutes_per_step must be in 1..60, got {}",
                self.minutes_per_step
            )));
        }
        if self.n_days == 0 || self.max_ticks == 0 {
            return Err(SimError::InvalidScenario(
                "n_days and max_ticks must be positive".into(),
            ));
        }
        if self.default_speed_kmh <= 0.0 {
            return Err(SimError::InvalidScenario(
                "default_speed_kmh must be positive".into(),
            ));
        }
        if self.neighborhood_radius_m <= 0.0 || self.arrival_radius_m <= 0.0 {
            return Err(SimError::InvalidScenario(
                "radii must be positive".into(),
            ));
        }
        if self.max_prompt_chars < 500 {
            return Err(SimError::InvalidScenario(format!(
                "max_prompt_chars ({}) leaves no room for the output schema",
                self.max_prompt_chars
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_rules() -> ScenarioRules {
    ScenarioRules {
        name: "test".into(),
        allowed_actions: default_allowed_actions(),
        fallback: ActionKind::Wait,
        bounds: Bounds {
            min_lon: -1.0,
            min_lat: 51.0,
            max_lon: 0.5,
            max_lat: 51.5,
        },
        minutes_per_step: 5,
        n_days: 5,
        max_ticks: 1000,
        default_speed_kmh: 5.0,
        neighborhood_radius_m: 250.0,
        arrival_radius_m: 50.0,
        max_prompt_chars: 4000,
        max_neighbors: 8,
        stuck_after_fallbacks: None,
        seed: 0,
        placement_jitter_m: 0.0,
    }
}
