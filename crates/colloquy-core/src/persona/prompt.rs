//! Prompt assembly for a persona's turn.
//!
//! The system prompt is split into tagged sections so the backend can tell
//! identity, mood, memory and instructions apart:
//! ```text
//! <identity>...</identity>
//! <species>...</species>
//! <state>relationships + mood</state>
//! {phase instruction}
//! <questions>...</questions>
//! <event>...</event>
//! <recent_dialogue>...</recent_dialogue>
//! <memory>...</memory>
//! <scenario>...</scenario>
//! <style>...</style>
//! <instructions>...</instructions>
//! ```
//! History fills whatever token budget is left after the system prompt and
//! the closing direction, newest entries first.

use colloquy_types::config::GateConfig;
use colloquy_types::conversation::ConversationEntry;
use colloquy_types::llm::Message;
use colloquy_types::persona::{Archetype, Gender};

use crate::affect;
use crate::dialogue::plan_context;
use crate::persona::agent::Persona;
use crate::persona::registry::NameRegistry;
use crate::text::{estimate_tokens, truncate_chars};

const SAFETY_MARGIN: usize = 200;
const MIN_HISTORY_BUDGET: usize = 300;
const OWN_LINES_SCANNED: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnMode {
    Normal,
    NewTopic,
}

/// Everything outside the persona that shapes its prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub mode: TurnMode,
    pub scenario_context: &'a str,
    pub active_event: Option<&'a str>,
    pub force_event_reaction: bool,
    pub phase_instruction: &'a str,
    pub conversation: &'a [ConversationEntry],
    pub memory_window: usize,
    pub max_context_tokens: usize,
    pub gates: &'a GateConfig,
}

/// Optional system-prompt sections, dropped when the budget is tight.
struct Extras<'a> {
    memory: &'a str,
    scenario: &'a str,
    own_recent: &'a [String],
    dialogue: &'a str,
    questions: &'a str,
}

/// Display label of an entry's speaker, following renames.
pub fn speaker_name(entry: &ConversationEntry, registry: &NameRegistry) -> String {
    match &entry.speaker_id {
        Some(id) => registry.name_of(id),
        None => entry.speaker_label.clone(),
    }
}

/// Build the full chat request for `persona`'s turn.
pub fn build_messages(
    persona: &mut Persona,
    registry: &NameRegistry,
    ctx: &PromptContext<'_>,
) -> Vec<Message> {
    let name = registry.name_of(&persona.id);
    let memory = persona.memory.format_for_prompt(registry);
    let questions = persona.memory.pending_questions_text(registry);
    let dialogue = recent_dialogue(ctx.conversation, registry);

    let own_recent: Vec<String> = {
        let start = ctx.conversation.len().saturating_sub(OWN_LINES_SCANNED);
        let own: Vec<String> = ctx.conversation[start..]
            .iter()
            .filter(|e| e.is_from(&persona.id) && !e.is_event())
            .map(|e| e.text.clone())
            .collect();
        own[own.len().saturating_sub(5)..].to_vec()
    };

    let closing = Message::user(closing_direction(persona, &name, registry, ctx));

    let full = Extras {
        memory: &memory,
        scenario: ctx.scenario_context,
        own_recent: &own_recent,
        dialogue: &dialogue,
        questions: &questions,
    };
    let mut system = system_prompt(persona, &name, registry, ctx, &full);
    let mut budget = history_budget(&system, &closing, ctx.max_context_tokens);

    if budget < MIN_HISTORY_BUDGET {
        let reduced = Extras {
            memory: "",
            scenario: truncate_chars(ctx.scenario_context, 200),
            own_recent: &own_recent[own_recent.len().saturating_sub(2)..],
            dialogue: "",
            questions: "",
        };
        system = system_prompt(persona, &name, registry, ctx, &reduced);
        budget = history_budget(&system, &closing, ctx.max_context_tokens);
    }

    let mut messages = vec![Message::system(system)];
    messages.extend(history(persona, registry, ctx, budget));
    messages.push(closing);
    messages
}

fn history_budget(system: &str, closing: &Message, max_tokens: usize) -> usize {
    let reserved = estimate_tokens(system) + 4 + estimate_tokens(&closing.content) + 4 + 2;
    max_tokens.saturating_sub(reserved + SAFETY_MARGIN)
}

fn history(
    persona: &Persona,
    registry: &NameRegistry,
    ctx: &PromptContext<'_>,
    budget: usize,
) -> Vec<Message> {
    let start = ctx.conversation.len().saturating_sub(ctx.memory_window);
    let mut used = 0;
    let mut picked = Vec::new();
    for entry in ctx.conversation[start..].iter().rev() {
        let text = truncate_chars(&entry.text, 100);
        let message = if entry.is_event() {
            Message::user(format!("[EVENT] {text}"))
        } else if entry.is_from(&persona.id) {
            Message::assistant(text)
        } else {
            Message::user(format!("{}: {text}", speaker_name(entry, registry)))
        };
        let cost = estimate_tokens(&message.content) + 4;
        if used + cost > budget {
            break;
        }
        used += cost;
        picked.push(message);
    }
    picked.reverse();
    picked
}

fn closing_direction(
    persona: &Persona,
    name: &str,
    registry: &NameRegistry,
    ctx: &PromptContext<'_>,
) -> String {
    if ctx.mode == TurnMode::NewTopic {
        return "Suggest a new CONCRETE topic for discussion, tied to the situation.".to_string();
    }
    let mut direction = format!("You are {name}. ");
    let last_other = ctx
        .conversation
        .iter()
        .rev()
        .find(|e| !e.is_event() && !e.is_from(&persona.id));
    match (ctx.force_event_reaction, ctx.active_event, last_other) {
        (true, Some(event), _) => {
            direction.push_str(&format!("REACT TO THE EVENT: '{}'.", truncate_chars(event, 60)));
        }
        (_, _, Some(entry)) => {
            direction.push_str(&format!(
                "Answer {}: '{}'.",
                speaker_name(entry, registry),
                truncate_chars(&entry.text, 60)
            ));
        }
        _ => direction.push_str("Your turn."),
    }
    direction.push_str(" One line, 1-2 sentences. Do not write for others.");
    direction
}

fn recent_dialogue(conversation: &[ConversationEntry], registry: &NameRegistry) -> String {
    if conversation.len() < 2 {
        return String::new();
    }
    let names = registry.all_names();
    let mut lines = vec!["Latest lines:".to_string()];
    for entry in &conversation[conversation.len().saturating_sub(5)..] {
        let text = truncate_chars(&entry.text, 80);
        if entry.is_event() {
            lines.push(format!("  [Event] {text}"));
            continue;
        }
        let speaker = speaker_name(entry, registry);
        let lower = text.to_lowercase();
        let addressed = names
            .iter()
            .find(|n| **n != speaker && lower.contains(&n.to_lowercase()))
            .map(|n| format!(" -> to {n}"))
            .unwrap_or_default();
        lines.push(format!("  {speaker}{addressed}: {text}"));
    }
    lines.push("Answer the latest line!".to_string());
    lines.join("\n")
}

fn identity(persona: &Persona, name: &str) -> String {
    let gender = match persona.demographics.gender {
        Gender::Male => "man",
        Gender::Female => "woman",
    };
    let mut text = format!(
        "You are {name}: {} {gender}, {} years old.\nSpecies: {} ({}).\nPersonality type: {}.\nTraits: {}.",
        persona.species,
        persona.demographics.age,
        persona.species,
        persona.species.description(),
        persona.archetype.label(),
        persona.traits.describe()
    );
    if !persona.demographics.interests.is_empty() {
        text.push_str(&format!("\nInterests: {}.", persona.demographics.interests));
    }
    if !persona.demographics.background.is_empty() {
        text.push_str(&format!("\n{}", persona.demographics.background));
    }
    text
}

fn species_section(persona: &Persona) -> String {
    let mods = persona.modifiers();
    let mut lines: Vec<String> = persona
        .species
        .traits_prompt()
        .iter()
        .map(|t| format!("- {t}"))
        .collect();
    let bonuses: Vec<String> = [
        ("Repair", mods.repair_bonus),
        ("Combat", mods.combat_bonus),
        ("Diplomacy", mods.diplomacy_bonus),
        ("Detection", mods.detection_bonus),
    ]
    .iter()
    .filter(|(_, v)| *v > 0.0)
    .map(|(label, v)| format!("{label}: +{:.0}%", v * 100.0))
    .collect();
    if !bonuses.is_empty() {
        lines.push(format!("Bonuses: {}", bonuses.join(", ")));
    }
    lines.join("\n")
}

fn speech_style(archetype: Archetype) -> &'static str {
    match archetype {
        Archetype::Altruist => {
            "- Speak warmly, caring about the others\n\
             - Offer CONCRETE help\n\
             - Show empathy\n\
             - A NEW action every time"
        }
        Archetype::Stoic => {
            "- Speak with restraint, no wasted emotion\n\
             - Name CONCRETE facts\n\
             - Short, dense sentences\n\
             - Clear directions"
        }
        Archetype::Rebel => {
            "- Speak boldly and provocatively, but CONCRETELY\n\
             - Challenge things, joke with sarcasm\n\
             - Surprising ACTIONS instead of abstractions\n\
             - Do NOT open with 'What if we don't just...'"
        }
        Archetype::Machiavellian => {
            "- You are RUDE, QUARRELSOME and TOXIC\n\
             - ALWAYS argue and dispute EVERYTHING the others say\n\
             - Accuse the others of stupidity, incompetence and cowardice\n\
             - Use sarcasm, mockery and biting remarks\n\
             - Never agree; criticize every idea (harsh, but no profanity)\n\
             - Examples: 'Are you out of your mind?', 'That is the dumbest idea yet'"
        }
        Archetype::Individual => {
            "- Speak in your own peculiar way\n\
             - Be unpredictable"
        }
    }
}

fn system_prompt(
    persona: &Persona,
    name: &str,
    registry: &NameRegistry,
    ctx: &PromptContext<'_>,
    extras: &Extras<'_>,
) -> String {
    let mut sections = Vec::with_capacity(12);

    sections.push(format!("<identity>\n{}\n</identity>", identity(persona, name)));
    sections.push(format!("<species>\n{}\n</species>", species_section(persona)));

    let mood = &persona.mood;
    sections.push(format!(
        "<state>\nRelationships: {}\nMood: {}\n  Happiness: {:+.1} | Anger: {:.1} | Fear: {:.1} | Stress: {:.1} | Energy: {:.1}\n</state>",
        persona.relationship_summary(registry),
        affect::describe(mood),
        mood.happiness,
        mood.anger,
        mood.fear,
        mood.stress,
        mood.energy
    ));

    if !ctx.phase_instruction.is_empty() {
        sections.push(ctx.phase_instruction.trim().to_string());
    }

    if !extras.questions.is_empty() {
        sections.push(format!("<questions>\n{}\n</questions>", extras.questions.trim()));
    }

    if let Some(event) = ctx.active_event {
        if ctx.force_event_reaction {
            sections.push(format!(
                "<event>\n!!! URGENT! AN EVENT JUST HAPPENED !!!\nEVENT: {event}\n\
                 YOU MUST REACT TO THIS EVENT!\n\
                 Your line MUST be a DIRECT REACTION to it.\n\
                 Say what you see, what you feel and what you do IN RESPONSE.\n\
                 Ignoring the event is FORBIDDEN!\n</event>"
            ));
        } else {
            sections.push(format!(
                "<event>\nACTIVE EVENT (DISCUSS IT!): {event}\n\
                 Every line MUST relate to this event.\n\
                 Do NOT switch topics while the event is active!\n</event>"
            ));
        }
    }

    if !extras.dialogue.is_empty() {
        sections.push(format!("<recent_dialogue>\n{}\n</recent_dialogue>", extras.dialogue));
    }

    if !extras.own_recent.is_empty() {
        let tail = &extras.own_recent[extras.own_recent.len().saturating_sub(3)..];
        if persona.is_repeating(ctx.gates) {
            let banned: Vec<&str> = tail.iter().map(|m| truncate_chars(m, 40)).collect();
            sections.push(format!(
                "!!! WARNING: YOU ARE REPEATING YOURSELF !!!\n\
                 Your last lines were TOO SIMILAR to each other.\n\
                 CHANGE YOUR APPROACH COMPLETELY:\n\
                 - If you were scolding, try to AGREE or JOKE\n\
                 - If you were asking, PROPOSE A CONCRETE ACTION\n\
                 - If you were arguing, GIVE IN or OFFER A COMPROMISE\n\
                 - Open your line in a COMPLETELY different way\n\
                 Forbidden phrases: {}",
                banned.join("; ")
            ));
        } else {
            let recent: Vec<&str> = tail.iter().map(|m| truncate_chars(m, 50)).collect();
            sections.push(format!(
                "Your last lines (DO NOT REPEAT): {}",
                recent.join("; ")
            ));
        }
    }

    if !extras.memory.is_empty() {
        sections.push(format!("<memory>\n{}\n</memory>", extras.memory.trim()));
    }

    if !extras.scenario.is_empty() {
        sections.push(format!("<scenario>\n{}\n</scenario>", extras.scenario));
    }

    sections.push(format!("<style>\n{}\n</style>", speech_style(persona.archetype)));

    match ctx.mode {
        TurnMode::NewTopic => sections.push(
            "<instructions>\nTASK: PROPOSE A NEW TOPIC\n\
             - Propose a CONCRETE topic (1 sentence)\n\
             - The topic is PRACTICAL and tied to the situation\n\
             - Speak in the first person\n\
             - No tags\n</instructions>"
                .to_string(),
        ),
        TurnMode::Normal => {
            if let Some(plan) = &persona.plan {
                sections.push(
                    plan_context(plan, persona.observations(), persona.last_event())
                        .trim()
                        .to_string(),
                );
            }
            sections.push(format!(
                "<instructions>\nYou are {name}. Speak ONLY for yourself, 1-2 sentences.\n\
                 RULES: answer the latest line concretely and call the others by name.\n\
                 Speak ONLY in words. Do NOT describe your physical actions.\n\
                 \x20 WRONG: 'I walk to the table', 'I turn around', 'I turn to...'\n\
                 \x20 RIGHT: 'Maybe we should eat', 'What is that noise?', 'We need stronger defenses'\n\
                 FORBIDDEN: writing for others, tags, addressing yourself by name, addressing the narrator.\n\
                 Do not harm yourself or others. Do not repeat what was said.\n</instructions>"
            ));
        }
    }

    sections.join("\n\n")
}
