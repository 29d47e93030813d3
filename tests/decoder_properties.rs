//! Property tests for the response decoder
//!
//! The decoder is the trust boundary for model output, so it gets the
//! adversarial treatment: arbitrary input must always produce a valid
//! in-vocabulary action.

use geollm::llm::{decode, DecisionResponse, DecisionStatus};
use geollm::scenario::{Action, ActionKind, Bounds, ScenarioRules};
use proptest::prelude::*;

fn rules() -> ScenarioRules {
    ScenarioRules {
        name: "proptest".into(),
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

proptest! {
    #[test]
    fn well_formed_in_bounds_moves_decode_as_ok(
        lon in -1.0f64..=0.5,
        lat in 51.0f64..=51.5,
    ) {
        let rules = rules();
        let raw = format!(r#"{{"action": "move_to", "lon": {lon}, "lat": {lat}}}"#);
        let (action, status) = decode(&DecisionResponse::ok(raw), &rules);

        prop_assert_eq!(status, DecisionStatus::Ok);
        match action {
            Action::MoveTo { lon: alon, lat: alat } => {
                prop_assert!(rules.bounds.contains(alon, alat));
            }
            other => prop_assert!(false, "expected move_to, got {:?}", other),
        }
    }

    #[test]
    fn out_of_bounds_moves_always_fall_back(
        lon in prop_oneof![-180.0f64..-1.001, 0.501f64..180.0],
        lat in 51.0f64..=51.5,
    ) {
        let rules = rules();
        let raw = format!(r#"{{"action": "move_to", "lon": {lon}, "lat": {lat}}}"#);
        let (action, status) = decode(&DecisionResponse::ok(raw), &rules);

        prop_assert_eq!(status, DecisionStatus::Malformed);
        prop_assert_eq!(action, Action::Wait);
    }

    #[test]
    fn arbitrary_input_never_panics_and_never_escapes_bounds(raw in ".*") {
        let rules = rules();
        let (action, status) = decode(&DecisionResponse::ok(raw), &rules);

        // Whatever came back, the action is valid under the rules
        prop_assert!(rules.allowed_actions.contains(&action.kind()));
        if let Action::MoveTo { lon, lat } = &action {
            prop_assert!(rules.bounds.contains(*lon, *lat));
        }
        // A non-ok status always pairs with the fallback
        if status != DecisionStatus::Ok {
            prop_assert_eq!(action, Action::Wait);
        }
    }

    #[test]
    fn prose_wrapping_does_not_change_the_decoded_action(
        prefix in "[a-zA-Z ,.!]{0,40}",
        suffix in "[a-zA-Z ,.!]{0,40}",
    ) {
        let rules = rules();
        let wrapped = format!("{prefix}{{\"action\": \"wait\"}}{suffix}");
        let (action, status) = decode(&DecisionResponse::ok(wrapped), &rules);

        prop_assert_eq!(status, DecisionStatus::Ok);
        prop_assert_eq!(action, Action::Wait);
    }
}
