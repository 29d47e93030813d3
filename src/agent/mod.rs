//! Simulated people: identity, position, status
//!
//! Agents are owned exclusively by `ScenarioState`. They are created at
//! scenario load and only mutated by the step controller with the result
//! of that agent's own decision for the current tick.

pub mod memory;

pub use memory::AgentMemory;

use crate::core::types::AgentId;
use geo_types::Point;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Deciding and acting each tick
    Active,
    /// Reached its goal; no further decisions
    Arrived,
    /// Escalated after repeated fallback outcomes; no further decisions
    Stuck,
}

impl AgentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Arrived | AgentStatus::Stuck)
    }
}

/// One simulated person
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    /// Role/class flag, e.g. "resident" or "responder"
    pub role: String,
    /// Natural-language persona description fed to the prompt encoder
    pub description: String,
    /// Current position in WGS84 (lon, lat)
    pub position: Point<f64>,
    /// Name of the location this agent is trying to reach
    pub goal: String,
    /// Movement speed in km/h
    pub speed_kmh: f64,
    pub status: AgentStatus,
    pub memory: AgentMemory,
    /// Consecutive non-ok outcomes, feeding the stuck escalation rule
    pub consecutive_fallbacks: u32,
}

impl Agent {
    pub fn new(
        id: AgentId,
        name: String,
        role: String,
        description: String,
        position: Point<f64>,
        goal: String,
        speed_kmh: f64,
    ) -> Self {
        Self {
            id,
            name,
            role,
            description,
            position,
            goal,
            speed_kmh,
            status: AgentStatus::Active,
            memory: AgentMemory::new(),
            consecutive_fallbacks: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}
