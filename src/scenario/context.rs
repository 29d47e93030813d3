//! Read-only spatial snapshots taken at decision time
//!
//! The scheduler snapshots every active agent's context at tick start,
//! before any of that tick's actions are applied. Each agent therefore
//! decides against the state as of tick start, never against a
//! partially-updated tick.

use crate::core::error::Result;
use crate::core::types::AgentId;
use crate::scenario::state::ScenarioState;
use geo::{HaversineBearing, HaversineDistance};
use geo_types::Point;

/// Another agent visible within the neighborhood radius
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub name: String,
    pub distance_m: f64,
}

/// A named location as seen from the agent's position
#[derive(Debug, Clone, PartialEq)]
pub struct LocationView {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub distance_m: f64,
    pub compass: &'static str,
}

/// Snapshot of everything one agent can base a decision on
#[derive(Debug, Clone)]
pub struct SpatialContext {
    pub position: Point<f64>,
    /// Nearest first, capped at `rules.max_neighbors`
    pub neighbors: Vec<Neighbor>,
    /// All named locations, sorted by name
    pub locations: Vec<LocationView>,
    /// The agent's goal as seen from here
    pub goal: LocationView,
}

impl SpatialContext {
    /// Take a snapshot for `id` against the current state
    pub fn snapshot(state: &ScenarioState, id: AgentId) -> Result<Self> {
        let agent = state.agent(id)?;
        let here = agent.position;
        let radius = state.rules.neighborhood_radius_m;

        let mut neighbors: Vec<Neighbor> = state
            .agents()
            .iter()
            .filter(|other| other.id != id && other.is_active())
            .filter_map(|other| {
                let distance_m = here.haversine_distance(&other.position);
                (distance_m <= radius).then(|| Neighbor {
                    name: other.name.clone(),
                    distance_m,
                })
            })
            .collect();
        // Distance ties broken by name so snapshots are deterministic
        neighbors.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.name.cmp(&b.name))
        });
        neighbors.truncate(state.rules.max_neighbors);

        let locations: Vec<LocationView> = state
            .locations()
            .iter()
            .map(|loc| view_of(here, &loc.name, loc.point))
            .collect();

        let goal_loc = state
            .location(&agent.goal)
            .expect("goals are validated at load");
        let goal = view_of(here, &goal_loc.name, goal_loc.point);

        Ok(Self {
            position: here,
            neighbors,
            locations,
            goal,
        })
    }
}

fn view_of(from: Point<f64>, name: &str, to: Point<f64>) -> LocationView {
    LocationView {
        name: name.to_string(),
        lon: to.x(),
        lat: to.y(),
        distance_m: from.haversine_distance(&to),
        compass: compass(from.haversine_bearing(to)),
    }
}

/// Eight-wind compass name for a bearing in degrees from north
pub fn compass(bearing_deg: f64) -> &'static str {
    const WINDS: [&str; 8] = [
        "north",
        "north-east",
        "east",
        "south-east",
        "south",
        "south-west",
        "west",
        "north-west",
    ];
    let normalized = bearing_deg.rem_euclid(360.0);
    let sector = ((normalized + 22.5) / 45.0).floor() as usize % 8;
    WINDS[sector]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::state::test_support::small_state;

    #[test]
    fn test_compass_sectors() {
        assert_eq!(compass(0.0), "north");
        assert_eq!(compass(359.0), "north");
        assert_eq!(compass(90.0), "east");
        assert_eq!(compass(-90.0), "west");
        assert_eq!(compass(135.0), "south-east");
        assert_eq!(compass(180.0), "south");
    }

    #[test]
    fn test_snapshot_includes_goal() {
        let state = small_state(1);
        let ctx = SpatialContext::snapshot(&state, AgentId(0)).unwrap();
        assert_eq!(ctx.goal.name, "hall");
        assert!(ctx.goal.distance_m > 0.0);
        assert_eq!(ctx.locations.len(), 2);
    }

    #[test]
    fn test_neighbors_exclude_self_and_sort_by_name_on_tie() {
        // All three agents share a position, so distances tie
        let state = small_state(3);
        let ctx = SpatialContext::snapshot(&state, AgentId(1)).unwrap();
        let names: Vec<_> = ctx.neighbors.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["agent-0", "agent-2"]);
    }

    #[test]
    fn test_terminal_agents_are_not_neighbors() {
        let mut state = small_state(2);
        state.agent_mut(AgentId(1)).unwrap().status = crate::agent::AgentStatus::Arrived;
        let ctx = SpatialContext::snapshot(&state, AgentId(0)).unwrap();
        assert!(ctx.neighbors.is_empty());
    }
}
