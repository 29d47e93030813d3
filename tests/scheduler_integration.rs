//! Full-loop tests: scenario state, scheduler, scripted decisions

use geollm::agent::{Agent, AgentStatus};
use geollm::core::types::AgentId;
use geollm::llm::{DecisionResponse, DecisionStatus, ScriptedSource};
use geollm::scenario::state::Location;
use geollm::scenario::{ActionKind, Bounds, ScenarioRules, ScenarioState};
use geollm::sim::{RunState, Scheduler};
use geo_types::Point;

const GREEN: (f64, f64) = (-0.070, 51.267);
const HALL: (f64, f64) = (-0.060, 51.270);

fn rules(max_ticks: u64) -> ScenarioRules {
    ScenarioRules {
        name: "walkers".into(),
        allowed_actions: vec![ActionKind::MoveTo, ActionKind::Wait, ActionKind::Interact],
        fallback: ActionKind::Wait,
        bounds: Bounds {
            min_lon: -1.0,
            min_lat: 51.0,
            max_lon: 0.5,
            max_lat: 51.5,
        },
        minutes_per_step: 5,
        n_days: 5,
        max_ticks,
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

fn walker(id: u32, name: &str) -> Agent {
    Agent::new(
        AgentId(id),
        name.into(),
        "resident".into(),
        format!("{name} lives near the green."),
        Point::new(GREEN.0, GREEN.1),
        "hall".into(),
        5.0,
    )
}

fn state(max_ticks: u64, names: &[&str]) -> ScenarioState {
    let locations = vec![
        Location {
            name: "green".into(),
            point: Point::new(GREEN.0, GREEN.1),
        },
        Location {
            name: "hall".into(),
            point: Point::new(HALL.0, HALL.1),
        },
    ];
    let agents = names
        .iter()
        .enumerate()
        .map(|(i, name)| walker(i as u32, name))
        .collect();
    ScenarioState::new(
        rules(max_ticks),
        locations,
        agents,
        "A quiet village morning.".into(),
    )
    .unwrap()
}

fn move_to_hall() -> DecisionResponse {
    DecisionResponse::ok(format!(
        r#"{{"action": "move_to", "lon": {}, "lat": {}}}"#,
        HALL.0, HALL.1
    ))
}

fn scripted_pair() -> ScriptedSource {
    ScriptedSource::new()
        .script("ada", vec![move_to_hall(), move_to_hall()])
        .script(
            "bob",
            vec![
                DecisionResponse::ok("I think I shall stay right here, thank you."),
                DecisionResponse::ok("Still not in the mood for JSON."),
                DecisionResponse::ok("No."),
            ],
        )
}

#[tokio::test]
async fn test_identical_runs_produce_identical_records() {
    let mut first = Scheduler::new(state(3, &["ada", "bob"]), scripted_pair());
    first.run_to_completion().await.unwrap();

    let mut second = Scheduler::new(state(3, &["ada", "bob"]), scripted_pair());
    second.run_to_completion().await.unwrap();

    assert_eq!(
        first.record().to_csv_string(),
        second.record().to_csv_string()
    );
}

#[tokio::test]
async fn test_two_agents_three_ticks_full_grid() {
    let mut scheduler = Scheduler::new(state(3, &["ada", "bob"]), scripted_pair());
    scheduler.run_to_completion().await.unwrap();

    // 2 agents over 3 ticks, the arrived agent included
    assert_eq!(scheduler.record().len(), 6);
    assert_eq!(scheduler.run_state(), RunState::Terminated);

    // ada covers ~772m to the hall in two ~417m steps, then holds
    let ada = scheduler.scenario().agent(AgentId(0)).unwrap();
    assert_eq!(ada.status, AgentStatus::Arrived);
    let ada_tick3 = &scheduler.record().entries()[4];
    assert_eq!(ada_tick3.agent, "ada");
    assert_eq!(ada_tick3.action, "wait");
    assert_eq!(ada_tick3.status, DecisionStatus::Ok);

    // bob never produced valid JSON and never moved
    let bob = scheduler.scenario().agent(AgentId(1)).unwrap();
    assert_eq!(bob.position, Point::new(GREEN.0, GREEN.1));
    let bob_statuses: Vec<_> = scheduler
        .record()
        .entries()
        .iter()
        .filter(|e| e.agent == "bob")
        .map(|e| e.status)
        .collect();
    assert_eq!(bob_statuses, vec![DecisionStatus::Malformed; 3]);

    let summary = scheduler.record().summary();
    assert_eq!(summary.ok, 3);
    assert_eq!(summary.malformed, 3);
}

#[tokio::test]
async fn test_one_failing_agent_does_not_disturb_the_others() {
    let source = ScriptedSource::new().script(
        "bob",
        vec![
            DecisionResponse::service_error("connection refused"),
            DecisionResponse::timeout(),
        ],
    );
    let mut scheduler = Scheduler::new(state(2, &["ada", "bob", "cleo"]), source);
    scheduler.run_to_completion().await.unwrap();

    for entry in scheduler.record().entries() {
        if entry.agent == "bob" {
            assert_ne!(entry.status, DecisionStatus::Ok);
            assert_eq!(entry.action, "wait");
        } else {
            assert_eq!(entry.status, DecisionStatus::Ok);
        }
    }
    assert!(scheduler.scenario().agent(AgentId(0)).unwrap().is_active());
    assert!(scheduler.scenario().agent(AgentId(2)).unwrap().is_active());
}

#[tokio::test]
async fn test_stuck_escalation_ends_an_unresponsive_run() {
    let mut st = state(50, &["ada"]);
    st.rules.stuck_after_fallbacks = Some(3);
    let source =
        ScriptedSource::new().with_default(DecisionResponse::service_error("service down"));
    let mut scheduler = Scheduler::new(st, source);

    scheduler.run_to_completion().await.unwrap();
    // Stuck on tick 3, so the run ends there rather than at max_ticks
    assert_eq!(scheduler.record().len(), 3);
    assert_eq!(
        scheduler.scenario().agent(AgentId(0)).unwrap().status,
        AgentStatus::Stuck
    );
}

#[tokio::test]
async fn test_neighbors_can_interact_and_both_remember() {
    let source = ScriptedSource::new().script(
        "ada",
        vec![DecisionResponse::ok(
            r#"{"action": "interact", "target": "bob"}"#,
        )],
    );
    let mut scheduler = Scheduler::new(state(1, &["ada", "bob"]), source);
    scheduler.run_to_completion().await.unwrap();

    let entry = &scheduler.record().entries()[0];
    assert_eq!(entry.action, "interact(bob)");
    assert_eq!(entry.status, DecisionStatus::Ok);
    let bob = scheduler.scenario().agent(AgentId(1)).unwrap();
    assert!(bob.memory.recent_summary().contains("spoke with ada"));
}
