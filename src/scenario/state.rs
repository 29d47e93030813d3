//! Scenario state: the single mutable home of agents and geography
//!
//! Locations and rules are immutable after load. Agents are mutated only
//! by the step controller, one at a time, inside a tick.

use crate::agent::Agent;
use crate::core::error::{Result, SimError};
use crate::core::types::AgentId;
use crate::scenario::rules::ScenarioRules;
use ahash::AHashMap;
use geo_types::Point;

/// A named point of interest in the scenario area
#[derive(Debug, Clone)]
pub struct Location {
    pub name: String,
    pub point: Point<f64>,
}

/// Full state for one simulation run
#[derive(Debug)]
pub struct ScenarioState {
    pub rules: ScenarioRules,
    /// Sorted by name at load for deterministic prompt output
    locations: Vec<Location>,
    location_index: AHashMap<String, usize>,
    /// Indexed by `AgentId`; order is load order
    agents: Vec<Agent>,
    agent_index: AHashMap<String, AgentId>,
    /// Free-text background shared by every agent's system prompt
    pub global_info: String,
}

impl ScenarioState {
    /// Assemble a state from already-validated parts.
    ///
    /// Used by the loader and directly by tests; performs the structural
    /// checks a loaded scenario must pass before the first tick.
    pub fn new(
        rules: ScenarioRules,
        mut locations: Vec<Location>,
        agents: Vec<Agent>,
        global_info: String,
    ) -> Result<Self> {
        rules.validate()?;
        locations.sort_by(|a, b| a.name.cmp(&b.name));

        let mut location_index = AHashMap::new();
        for (i, loc) in locations.iter().enumerate() {
            if !rules.bounds.contains(loc.point.x(), loc.point.y()) {
                return Err(SimError::InvalidScenario(format!(
                    "location '{}' lies outside scenario bounds",
                    loc.name
                )));
            }
            if location_index.insert(loc.name.clone(), i).is_some() {
                return Err(SimError::InvalidScenario(format!(
                    "duplicate location name '{}'",
                    loc.name
                )));
            }
        }

        let mut agent_index = AHashMap::new();
        for (i, agent) in agents.iter().enumerate() {
            if agent.id != AgentId(i as u32) {
                return Err(SimError::InvalidScenario(format!(
                    "agent '{}' has id {:?}, expected load order {:?}",
                    agent.name,
                    agent.id,
                    AgentId(i as u32)
                )));
            }
            if !location_index.contains_key(&agent.goal) {
                return Err(SimError::InvalidScenario(format!(
                    "agent '{}' has unknown goal '{}'",
                    agent.name, agent.goal
                )));
            }
            if !rules.bounds.contains(agent.position.x(), agent.position.y()) {
                return Err(SimError::InvalidScenario(format!(
                    "agent '{}' starts outside scenario bounds",
                    agent.name
                )));
            }
            if agent_index.insert(agent.name.clone(), agent.id).is_some() {
                return Err(SimError::InvalidScenario(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
        }

        Ok(Self {
            rules,
            locations,
            location_index,
            agents,
            agent_index,
            global_info,
        })
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, name: &str) -> Option<&Location> {
        self.location_index.get(name).map(|&i| &self.locations[i])
    }

    pub fn is_location(&self, name: &str) -> bool {
        self.location_index.contains_key(name)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Agent ids in the fixed iteration order (load order)
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.iter().map(|a| a.id).collect()
    }

    pub fn agent(&self, id: AgentId) -> Result<&Agent> {
        self.agents
            .get(id.index())
            .ok_or(SimError::AgentNotFound(id))
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent> {
        self.agents
            .get_mut(id.index())
            .ok_or(SimError::AgentNotFound(id))
    }

    pub fn agent_by_name(&self, name: &str) -> Option<&Agent> {
        self.agent_index.get(name).map(|&id| &self.agents[id.index()])
    }

    /// Mutable access to two distinct agents at once (for interactions)
    pub fn agent_pair_mut(&mut self, a: AgentId, b: AgentId) -> Result<(&mut Agent, &mut Agent)> {
        let (ia, ib) = (a.index(), b.index());
        if ia == ib || ia >= self.agents.len() || ib >= self.agents.len() {
            return Err(SimError::AgentNotFound(if ia >= self.agents.len() {
                a
            } else {
                b
            }));
        }
        if ia < ib {
            let (left, right) = self.agents.split_at_mut(ib);
            Ok((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.agents.split_at_mut(ia);
            Ok((&mut right[0], &mut left[ib]))
        }
    }

    pub fn active_count(&self) -> usize {
        self.agents.iter().filter(|a| a.is_active()).count()
    }

    pub fn all_terminal(&self) -> bool {
        self.agents.iter().all(|a| a.status.is_terminal())
    }
}
