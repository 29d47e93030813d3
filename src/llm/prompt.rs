//! Encode agent state into a bounded natural-language request
//!
//! Encoding is a pure function of (agent, context, rules): identical
//! inputs always produce identical prompts, which is what makes mocked
//! runs and cached responses reproducible. The output-format section is
//! never truncated; when the state description exceeds the budget, it is
//! cut from the tail.

use crate::agent::Agent;
use crate::scenario::context::SpatialContext;
use crate::scenario::rules::{ActionKind, ScenarioRules};

/// The encoded prompt pair sent to the decision source
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    /// Name of the deciding agent (used for scripting and audit logs)
    pub agent: String,
    pub system: String,
    pub user: String,
}

/// Build the request for one agent's decision this tick
pub fn encode(
    agent: &Agent,
    ctx: &SpatialContext,
    rules: &ScenarioRules,
    global_info: &str,
) -> DecisionRequest {
    let system = system_prompt(agent, rules, global_info);
    let schema = output_schema(rules);
    let state = state_description(agent, ctx);

    // The schema always survives; the state description absorbs the cut.
    let budget = rules.max_prompt_chars.saturating_sub(schema.len());
    let mut user = truncate_chars(&state, budget);
    user.push_str(&schema);

    DecisionRequest {
        agent: agent.name.clone(),
        system,
        user,
    }
}

fn system_prompt(agent: &Agent, rules: &ScenarioRules, global_info: &str) -> String {
    let mut s = String::new();
    s.push_str(&format!(
        "You are {}, a {} in the {} scenario. {}\n",
        agent.name, agent.role, rules.name, agent.description
    ));
    s.push_str(&format!(
        "Your objective is to reach the location called '{}'.\n",
        agent.goal
    ));
    if !global_info.is_empty() {
        s.push_str(&format!("Background: {global_info}\n"));
    }
    s.push_str(
        "Each turn you are told where you are and what is nearby, and you \
         answer with exactly one action as JSON. Reply with the JSON object \
         only, no explanation.",
    );
    s
}

fn state_description(agent: &Agent, ctx: &SpatialContext) -> String {
    let mut s = String::new();
    s.push_str(&format!(
        "You are at longitude {:.6}, latitude {:.6}.\n",
        ctx.position.x(),
        ctx.position.y()
    ));
    s.push_str(&format!(
        "Your goal '{}' is {:.0}m away to the {}.\n",
        ctx.goal.name, ctx.goal.distance_m, ctx.goal.compass
    ));

    s.push_str("\nKnown locations:\n");
    for loc in &ctx.locations {
        s.push_str(&format!(
            "- {} at ({:.6}, {:.6}), {:.0}m {}\n",
            loc.name, loc.lon, loc.lat, loc.distance_m, loc.compass
        ));
    }

    if !ctx.neighbors.is_empty() {
        s.push_str("\nPeople nearby:\n");
        for n in &ctx.neighbors {
            s.push_str(&format!("- {} ({:.0}m away)\n", n.name, n.distance_m));
        }
    }

    if !agent.memory.is_empty() {
        s.push_str("\nYour recent decisions:\n");
        s.push_str(&agent.memory.recent_summary());
    }

    s
}

fn output_schema(rules: &ScenarioRules) -> String {
    let mut s = String::new();
    s.push_str("\nRespond with one JSON object choosing an action:\n");
    for kind in &rules.allowed_actions {
        match kind {
            ActionKind::MoveTo => s.push_str(&format!(
                "- {{\"action\": \"move_to\", \"lon\": <{:.4}..{:.4}>, \"lat\": <{:.4}..{:.4}>}}\n",
                rules.bounds.min_lon, rules.bounds.max_lon, rules.bounds.min_lat, rules.bounds.max_lat
            )),
            ActionKind::Wait => s.push_str("- {\"action\": \"wait\"}\n"),
            ActionKind::Interact => {
                s.push_str("- {\"action\": \"interact\", \"target\": \"<name of a person nearby>\"}\n")
            }
        }
    }
    s
}

/// Cut `s` to at most `max` characters on a char boundary
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
