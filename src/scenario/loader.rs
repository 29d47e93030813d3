//! Load a scenario directory into a validated `ScenarioState`
//!
//! A scenario directory mirrors the layout produced by the scenario
//! builder pipeline:
//!
//! ```text
//! scenarios/westerham/
//!   scenario.toml      rule parameters
//!   locations.json     name -> { lon, lat }
//!   agents.json        initial agent placements
//!   global_info.txt    optional shared background text
//! ```
//!
//! Everything structural is checked here; a scenario that loads is safe
//! to simulate.

use crate::agent::Agent;
use crate::core::error::{Result, SimError};
use crate::core::types::AgentId;
use crate::scenario::rules::ScenarioRules;
use crate::scenario::state::{Location, ScenarioState};
use geo::HaversineDestination;
use geo_types::Point;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct LocationSpec {
    lon: f64,
    lat: f64,
}

#[derive(Debug, Deserialize)]
struct AgentSpec {
    name: String,
    #[serde(default = "default_role")]
    role: String,
    #[serde(default)]
    description: String,
    /// Named location the agent starts at
    home: String,
    /// Named location the agent tries to reach
    goal: String,
    /// Overrides `rules.default_speed_kmh` when present
    speed_kmh: Option<f64>,
}

fn default_role() -> String {
    "resident".into()
}

/// Load and validate the scenario at `dir`
pub fn load_scenario(dir: &Path) -> Result<ScenarioState> {
    let rules = load_rules(&dir.join("scenario.toml"))?;
    let locations = load_locations(&dir.join("locations.json"))?;
    let global_info = load_global_info(&dir.join("global_info.txt"))?;
    let specs = load_agent_specs(&dir.join("agents.json"))?;

    // Placement jitter is drawn from a seeded stream so the same scenario
    // always produces the same initial positions.
    let mut rng = ChaCha8Rng::seed_from_u64(rules.seed);

    let mut agents = Vec::with_capacity(specs.len());
    for (i, spec) in specs.into_iter().enumerate() {
        let home = locations
            .iter()
            .find(|l| l.name == spec.home)
            .ok_or_else(|| {
                SimError::InvalidScenario(format!(
                    "agent '{}' has unknown home '{}'",
                    spec.name, spec.home
                ))
            })?;

        let position = jitter(home.point, rules.placement_jitter_m, &mut rng, &rules);
        let speed = spec.speed_kmh.unwrap_or(rules.default_speed_kmh);
        if speed <= 0.0 {
            return Err(SimError::InvalidScenario(format!(
                "agent '{}' has non-positive speed {speed}",
                spec.name
            )));
        }

        agents.push(Agent::new(
            AgentId(i as u32),
            spec.name,
            spec.role,
            spec.description,
            position,
            spec.goal,
            speed,
        ));
    }

    tracing::info!(
        scenario = %rules.name,
        locations = locations.len(),
        agents = agents.len(),
        "scenario loaded"
    );

    ScenarioState::new(rules, locations, agents, global_info)
}

fn load_rules(path: &Path) -> Result<ScenarioRules> {
    let content = fs::read_to_string(path).map_err(|e| {
        SimError::InvalidScenario(format!("cannot read {}: {e}", path.display()))
    })?;
    let rules: ScenarioRules = toml::from_str(&content)?;
    rules.validate()?;
    Ok(rules)
}

fn load_locations(path: &Path) -> Result<Vec<Location>> {
    let content = fs::read_to_string(path).map_err(|e| {
        SimError::InvalidScenario(format!("cannot read {}: {e}", path.display()))
    })?;
    // BTreeMap keeps location order independent of JSON key order
    let raw: BTreeMap<String, LocationSpec> = serde_json::from_str(&content)?;
    Ok(raw
        .into_iter()
        .map(|(name, spec)| Location {
            name,
            point: Point::new(spec.lon, spec.lat),
        })
        .collect())
}

fn load_agent_specs(path: &Path) -> Result<Vec<AgentSpec>> {
    let content = fs::read_to_string(path).map_err(|e| {
        SimError::InvalidScenario(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn load_global_info(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Offset `point` by up to `max_m` meters in a seeded random direction,
/// keeping the result inside the scenario bounds.
fn jitter(
    point: Point<f64>,
    max_m: f64,
    rng: &mut ChaCha8Rng,
    rules: &ScenarioRules,
) -> Point<f64> {
    if max_m <= 0.0 {
        return point;
    }
    let bearing: f64 = rng.gen_range(0.0..360.0);
    let distance: f64 = rng.gen_range(0.0..max_m);
    let moved = point.haversine_destination(bearing, distance);
    if rules.bounds.contains(moved.x(), moved.y()) {
        moved
    } else {
        point
    }
}
