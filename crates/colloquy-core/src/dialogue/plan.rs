//! Plan derivation from the last seen event or the recent conversation.

use colloquy_types::persona::Archetype;
use colloquy_types::plan::Plan;

const MAX_STEPS: usize = 5;
const SURVIVE_GOAL: &str = "Survive and get organized";

struct PlanRule {
    keywords: &'static [&'static str],
    goal: &'static str,
    steps: &'static [&'static str],
}

/// Checked in order against the last seen event; the first match wins.
const EVENT_PLANS: &[PlanRule] = &[
    PlanRule {
        keywords: &["rain", "storm", "wind", "tide", "flood", "washed"],
        goal: "Protect the group from the weather",
        steps: &["Find shelter", "Save the supplies", "Check everyone is safe"],
    },
    PlanRule {
        keywords: &["food", "hunger", "hungry", "coconut", "crab", "fruit", "ration"],
        goal: "Keep the group fed",
        steps: &["Count the supplies", "Organize a search", "Share it out"],
    },
    PlanRule {
        keywords: &["snake", "predator", "danger", "zombie", "meteor", "attack"],
        goal: "Keep everyone safe",
        steps: &["Assess the threat", "Take defensive measures", "Warn the others"],
    },
    PlanRule {
        keywords: &["signal", "radio", "ship", "contact", "radar"],
        goal: "Make contact and call for help",
        steps: &["Study the options", "Send a signal", "Set up a watch rota"],
    },
    PlanRule {
        keywords: &["sunset", "rest", "sleep", "night"],
        goal: "Organize some rest",
        steps: &["Set up a place to sleep", "Keep watch", "Talk things over"],
    },
    PlanRule {
        keywords: &["oxygen", "power", "panel", "system"],
        goal: "Repair the systems",
        steps: &["Diagnose the fault", "Find spare parts", "Repair"],
    },
    PlanRule {
        keywords: &["stranger", "strange", "mysterious", "appeared"],
        goal: "Deal with the stranger",
        steps: &["Assess the threat", "Ask questions", "Decide what to do"],
    },
    PlanRule {
        keywords: &["found", "discovered", "spotted"],
        goal: "Investigate the find",
        steps: &["Examine it", "Discuss how to use it", "Put it to use"],
    },
];

/// Checked against the recent conversation when there is no plan yet.
const TALK_PLANS: &[PlanRule] = &[
    PlanRule {
        keywords: &["split", "roles", "who does what"],
        goal: "Split up the roles",
        steps: &["Find out everyone's skills", "Make a proposal", "Agree on it"],
    },
    PlanRule {
        keywords: &["water", "drink", "thirst"],
        goal: "Find water",
        steps: &["Explore", "Find a source", "Collect it"],
    },
];

fn matching_rule<'a>(rules: &'a [PlanRule], text: &str) -> Option<&'a PlanRule> {
    let lower = text.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| lower.contains(k)))
}

fn archetype_step(archetype: Archetype) -> Option<&'static str> {
    match archetype {
        Archetype::Altruist => Some("Make sure everyone is all right"),
        Archetype::Rebel => Some("Try an unconventional solution"),
        Archetype::Machiavellian => Some("Secure an advantage for yourself"),
        Archetype::Stoic => Some("Keep a cool head and weigh the risks"),
        Archetype::Individual => None,
    }
}

/// Work out the plan a persona should follow.
///
/// Returns `None` when the current plan should stay: there is no better
/// goal, or the same goal is already under way.
pub fn derive_plan(
    current: Option<&Plan>,
    last_event: Option<&str>,
    recent: &[String],
    archetype: Archetype,
) -> Option<Plan> {
    let (goal, steps): (&str, Vec<&str>) = match last_event {
        Some(event) => match matching_rule(EVENT_PLANS, event) {
            Some(rule) => (rule.goal, rule.steps.to_vec()),
            None => {
                // A vague fallback never replaces a concrete plan.
                if current.is_some_and(|p| p.goal != SURVIVE_GOAL) {
                    return None;
                }
                (
                    "Figure out the situation",
                    vec!["Assess", "Discuss", "Act"],
                )
            }
        },
        None if current.is_none() => {
            let start = recent.len().saturating_sub(5);
            let joined = recent[start..].join(" ");
            match matching_rule(TALK_PLANS, &joined) {
                Some(rule) => (rule.goal, rule.steps.to_vec()),
                None => (
                    SURVIVE_GOAL,
                    vec!["Assess the situation", "Pool resources", "Band together"],
                ),
            }
        }
        None => return None,
    };

    if current.is_some_and(|p| p.goal == goal && p.cursor > 0) {
        return None;
    }

    let mut steps: Vec<String> = steps.into_iter().map(str::to_string).collect();
    if let Some(extra) = archetype_step(archetype) {
        steps.push(extra.to_string());
    }
    steps.truncate(MAX_STEPS);
    Some(Plan::new(goal, steps))
}

/// Strategy block appended to the persona prompt.
pub fn plan_context(plan: &Plan, observations: &[String], last_event: Option<&str>) -> String {
    let mut text = format!(
        "\n=== YOUR STRATEGY ===\nGoal: {}\nNow: {}\nNext: {}\n",
        plan.goal,
        plan.current_step().unwrap_or("none"),
        plan.upcoming().join("; ")
    );
    if !observations.is_empty() {
        let start = observations.len().saturating_sub(3);
        text.push_str(&format!(
            "You noticed: {}\n",
            observations[start..].join("; ")
        ));
    }
    if let Some(event) = last_event {
        text.push_str(&format!("IMPORTANT EVENT: {event}\n"));
    }
    text.push_str("Act! Speak and DO things.\n");
    text
}
