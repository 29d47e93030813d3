//! Parse and validate model output against the action schema
//!
//! `decode` is a total function: every possible response, including
//! garbage, maps to some (Action, status) pair. A reply that fails any
//! check degrades to the scenario's no-op with status `malformed`; it
//! can never produce an out-of-bounds action or a panic.

use crate::llm::{DecisionResponse, DecisionStatus};
use crate::scenario::rules::{Action, ScenarioRules};

/// Decode a raw response into a validated action
pub fn decode(response: &DecisionResponse, rules: &ScenarioRules) -> (Action, DecisionStatus) {
    match response.status {
        // Transport failures carry their status through; the agent
        // performs the fallback this tick.
        DecisionStatus::Timeout | DecisionStatus::ServiceError => {
            (rules.fallback_action(), response.status)
        }
        DecisionStatus::Ok | DecisionStatus::Malformed => match parse_action(&response.raw, rules) {
            Some(action) => (action, DecisionStatus::Ok),
            None => (rules.fallback_action(), DecisionStatus::Malformed),
        },
    }
}

fn parse_action(raw: &str, rules: &ScenarioRules) -> Option<Action> {
    let json = extract_json(raw)?;
    let action: Action = serde_json::from_str(json).ok()?;

    if !rules.allowed_actions.contains(&action.kind()) {
        return None;
    }
    match &action {
        Action::MoveTo { lon, lat } => {
            if !rules.bounds.contains(*lon, *lat) {
                return None;
            }
        }
        Action::Interact { target } => {
            if target.trim().is_empty() {
                return None;
            }
        }
        Action::Wait => {}
    }
    Some(action)
}

/// Extract the first JSON object from a response that may wrap it in prose
fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}
