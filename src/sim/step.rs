//! Per-agent step: encode -> infer -> decode -> apply
//!
//! This is the failure-containment boundary. Whatever the inference
//! service or the model does, the step produces a recorded outcome and
//! leaves the agent in a valid state. One agent's bad tick never
//! touches another agent's.

use crate::agent::AgentStatus;
use crate::core::error::Result;
use crate::core::types::{AgentId, Tick};
use crate::llm::{decode, encode, DecisionSource, DecisionStatus};
use crate::scenario::context::SpatialContext;
use crate::scenario::rules::Action;
use crate::scenario::state::ScenarioState;
use geo::{HaversineBearing, HaversineDistance, HaversineDestination};

/// What one agent did this tick
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub agent_id: AgentId,
    pub agent: String,
    /// The action actually applied (the fallback on any failure)
    pub action: Action,
    pub status: DecisionStatus,
}

/// Run one agent through a full decision cycle and apply the result.
///
/// Terminal agents skip inference entirely and report a holding `wait`,
/// so the record keeps its full tick-by-agent grid.
pub async fn step_agent<S: DecisionSource>(
    state: &mut ScenarioState,
    source: &S,
    id: AgentId,
    ctx: &SpatialContext,
    tick: Tick,
) -> Result<AgentOutcome> {
    let agent = state.agent(id)?;
    let name = agent.name.clone();

    if agent.status.is_terminal() {
        return Ok(AgentOutcome {
            agent_id: id,
            agent: name,
            action: Action::Wait,
            status: DecisionStatus::Ok,
        });
    }

    let request = encode(agent, ctx, &state.rules, &state.global_info);
    let response = source.decide(&request).await;
    let (decoded, status) = decode(&response, &state.rules);

    let (applied, status) = apply_action(state, id, decoded, status, ctx, tick)?;

    let agent = state.agent_mut(id)?;
    agent
        .memory
        .remember(tick, format!("{} ({})", applied, status.as_str()));

    // Escalation: repeated untrusted replies eventually strand the agent
    if status.is_ok() {
        agent.consecutive_fallbacks = 0;
    } else {
        agent.consecutive_fallbacks += 1;
        if let Some(limit) = state.rules.stuck_after_fallbacks {
            let agent = state.agent_mut(id)?;
            if agent.consecutive_fallbacks >= limit && agent.status == AgentStatus::Active {
                agent.status = AgentStatus::Stuck;
                tracing::warn!(agent = %name, tick, "agent marked stuck after repeated fallbacks");
            }
        }
    }

    tracing::debug!(agent = %name, tick, action = %applied, status = status.as_str(), "agent stepped");

    Ok(AgentOutcome {
        agent_id: id,
        agent: name,
        action: applied,
        status,
    })
}

/// Apply a validated action, returning what was actually applied.
///
/// An `interact` whose target is not in the snapshot neighborhood
/// degrades to the fallback here; the decoder cannot check it because
/// target validity depends on state.
fn apply_action(
    state: &mut ScenarioState,
    id: AgentId,
    action: Action,
    status: DecisionStatus,
    ctx: &SpatialContext,
    tick: Tick,
) -> Result<(Action, DecisionStatus)> {
    match action {
        Action::Wait => Ok((Action::Wait, status)),

        Action::MoveTo { lon, lat } => {
            apply_move(state, id, lon, lat)?;
            Ok((Action::MoveTo { lon, lat }, status))
        }

        Action::Interact { target } => {
            let in_range = ctx.neighbors.iter().any(|n| n.name == target);
            let target_id = state.agent_by_name(&target).map(|a| a.id);
            match (in_range, target_id) {
                (true, Some(other)) if other != id => {
                    apply_interact(state, id, other, tick)?;
                    Ok((Action::Interact { target }, status))
                }
                _ => {
                    tracing::debug!(
                        agent = ?id,
                        target = %target,
                        "interact target not in neighborhood, falling back"
                    );
                    Ok((state.rules.fallback_action(), DecisionStatus::Malformed))
                }
            }
        }
    }
}

fn apply_move(state: &mut ScenarioState, id: AgentId, lon: f64, lat: f64) -> Result<()> {
    let minutes = state.rules.minutes_per_step as f64;
    let arrival_radius = state.rules.arrival_radius_m;

    let goal_point = {
        let agent = state.agent(id)?;
        state
            .location(&agent.goal)
            .expect("goals are validated at load")
            .point
    };

    let agent = state.agent_mut(id)?;
    let target = geo_types::Point::new(lon, lat);
    let max_step_m = agent.speed_kmh * 1000.0 / 60.0 * minutes;

    let distance = agent.position.haversine_distance(&target);
    agent.position = if distance <= max_step_m {
        target
    } else {
        let bearing = agent.position.haversine_bearing(target);
        agent.position.haversine_destination(bearing, max_step_m)
    };

    if agent.position.haversine_distance(&goal_point) <= arrival_radius {
        agent.status = AgentStatus::Arrived;
        tracing::info!(agent = %agent.name, goal = %agent.goal, "agent arrived");
    }
    Ok(())
}

fn apply_interact(state: &mut ScenarioState, a: AgentId, b: AgentId, tick: Tick) -> Result<()> {
    let (first, second) = state.agent_pair_mut(a, b)?;
    let note_a = format!("spoke with {}", second.name);
    let note_b = format!("spoke with {}", first.name);
    first.memory.remember(tick, note_a);
    second.memory.remember(tick, note_b);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DecisionResponse, ScriptedSource};
    use crate::scenario::state::test_support::small_state;

    fn move_json(lon: f64, lat: f64) -> String {
        format!(r#"{{"action": "move_to", "lon": {lon}, "lat": {lat}}}"#)
    }

    async fn run_step(
        state: &mut ScenarioState,
        source: &ScriptedSource,
        id: AgentId,
    ) -> AgentOutcome {
        let ctx = SpatialContext::snapshot(state, id).unwrap();
        step_agent(state, source, id, &ctx, 1).await.unwrap()
    }

    #[tokio::test]
    async fn test_move_is_speed_limited() {
        let mut state = small_state(1);
        // Goal is ~780m away; at 5 km/h and 5 min/tick the step is ~417m
        let source = ScriptedSource::new().script(
            "agent-0",
            vec![DecisionResponse::ok(move_json(-0.060, 51.270))],
        );

        let before = state.agent(AgentId(0)).unwrap().position;
        let outcome = run_step(&mut state, &source, AgentId(0)).await;
        assert!(outcome.status.is_ok());

        let after = state.agent(AgentId(0)).unwrap().position;
        let moved = before.haversine_distance(&after);
        assert!(moved > 400.0 && moved < 430.0, "moved {moved}m");
        assert!(state.agent(AgentId(0)).unwrap().is_active());
    }

    #[tokio::test]
    async fn test_move_close_enough_arrives() {
        let mut state = small_state(1);
        // Fast agent covers the whole distance in one step
        state.agent_mut(AgentId(0)).unwrap().speed_kmh = 60.0;
        let source = ScriptedSource::new().script(
            "agent-0",
            vec![DecisionResponse::ok(move_json(-0.060, 51.270))],
        );

        run_step(&mut state, &source, AgentId(0)).await;
        assert_eq!(
            state.agent(AgentId(0)).unwrap().status,
            AgentStatus::Arrived
        );
    }

    #[tokio::test]
    async fn test_malformed_leaves_position_unchanged() {
        let mut state = small_state(1);
        let source = ScriptedSource::new().script(
            "agent-0",
            vec![DecisionResponse::ok("I would rather not say")],
        );

        let before = state.agent(AgentId(0)).unwrap().position;
        let outcome = run_step(&mut state, &source, AgentId(0)).await;
        assert_eq!(outcome.status, DecisionStatus::Malformed);
        assert_eq!(outcome.action, Action::Wait);
        assert_eq!(state.agent(AgentId(0)).unwrap().position, before);
    }

    #[tokio::test]
    async fn test_interact_records_both_memories() {
        let mut state = small_state(2);
        let source = ScriptedSource::new().script(
            "agent-0",
            vec![DecisionResponse::ok(
                r#"{"action": "interact", "target": "agent-1"}"#,
            )],
        );

        let outcome = run_step(&mut state, &source, AgentId(0)).await;
        assert!(outcome.status.is_ok());
        // The target remembers the encounter under the tick it happened
        assert!(state
            .agent(AgentId(1))
            .unwrap()
            .memory
            .recent_summary()
            .contains("tick 1: spoke with agent-0"));
    }

    #[tokio::test]
    async fn test_interact_out_of_range_falls_back() {
        let mut state = small_state(2);
        // Move agent-1 far away so it leaves the neighborhood
        state.agent_mut(AgentId(1)).unwrap().position = geo_types::Point::new(0.3, 51.45);
        let source = ScriptedSource::new().script(
            "agent-0",
            vec![DecisionResponse::ok(
                r#"{"action": "interact", "target": "agent-1"}"#,
            )],
        );

        let outcome = run_step(&mut state, &source, AgentId(0)).await;
        assert_eq!(outcome.status, DecisionStatus::Malformed);
        assert_eq!(outcome.action, Action::Wait);
    }

    #[tokio::test]
    async fn test_stuck_escalation_after_consecutive_fallbacks() {
        let mut state = small_state(1);
        state.rules.stuck_after_fallbacks = Some(2);
        let source = ScriptedSource::new().script(
            "agent-0",
            vec![
                DecisionResponse::service_error("down"),
                DecisionResponse::timeout(),
            ],
        );

        run_step(&mut state, &source, AgentId(0)).await;
        assert!(state.agent(AgentId(0)).unwrap().is_active());
        run_step(&mut state, &source, AgentId(0)).await;
        assert_eq!(state.agent(AgentId(0)).unwrap().status, AgentStatus::Stuck);
    }

    #[tokio::test]
    async fn test_ok_resets_escalation_counter() {
        let mut state = small_state(1);
        state.rules.stuck_after_fallbacks = Some(2);
        let source = ScriptedSource::new().script(
            "agent-0",
            vec![
                DecisionResponse::timeout(),
                DecisionResponse::ok(r#"{"action": "wait"}"#),
                DecisionResponse::timeout(),
            ],
        );

        run_step(&mut state, &source, AgentId(0)).await;
        run_step(&mut state, &source, AgentId(0)).await;
        run_step(&mut state, &source, AgentId(0)).await;
        // Never two consecutive fallbacks, so still active
        assert!(state.agent(AgentId(0)).unwrap().is_active());
    }

    #[tokio::test]
    async fn test_terminal_agent_skips_inference() {
        let mut state = small_state(1);
        state.agent_mut(AgentId(0)).unwrap().status = AgentStatus::Arrived;
        // Scripted garbage that would register as malformed if consumed
        let source = ScriptedSource::new()
            .with_default(DecisionResponse::ok("garbage"))
            .script("agent-0", vec![DecisionResponse::ok("garbage")]);

        let outcome = run_step(&mut state, &source, AgentId(0)).await;
        assert_eq!(outcome.action, Action::Wait);
        assert!(outcome.status.is_ok());
    }
}
