//! Terminal formatting for conversation entries and session events.

use console::style;

use colloquy_core::scheduler::SessionStats;
use colloquy_types::conversation::{ConversationEntry, EntryKind};
use colloquy_types::event::SessionEvent;

use super::list::table;

/// One line for a conversation entry.
pub fn entry_line(entry: &ConversationEntry) -> String {
    let tick = style(format!("[{:>3}]", entry.tick)).dim();
    match &entry.kind {
        EntryKind::Utterance { initiative, new_topic } => {
            let mut marks = String::new();
            if *initiative {
                marks.push_str(" *");
            }
            if *new_topic {
                marks.push_str(" +");
            }
            format!(
                "{tick} {}{}: {}",
                style(&entry.speaker_label).cyan().bold(),
                style(marks).dim(),
                entry.text
            )
        }
        EntryKind::ScenarioEvent | EntryKind::OperatorEvent => {
            format!("{tick} {} {}", style("EVENT").yellow().bold(), style(&entry.text).yellow())
        }
        EntryKind::WorldConsequence | EntryKind::ActionResult => {
            format!("{tick} {} {}", style("WORLD").magenta().bold(), entry.text)
        }
        EntryKind::OperatorMessage => {
            format!("{tick} {}: {}", style(&entry.speaker_label).green().bold(), entry.text)
        }
        EntryKind::TopicAnnouncement => {
            format!("{tick} {} {}", style("TOPIC").blue().bold(), entry.text)
        }
        EntryKind::Notice => format!("{tick} {}", style(&entry.text).dim().italic()),
    }
}

/// Bus events worth showing; `None` for the rest.
pub fn event_line(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::EntryAppended { entry } => Some(entry_line(entry)),
        SessionEvent::PhaseChanged { phase, .. } => Some(format!(
            "      {} {}",
            style("phase →").dim(),
            style(phase.label()).bold()
        )),
        SessionEvent::Stopped { tick } => {
            Some(format!("      {}", style(format!("session stopped at tick {tick}")).dim()))
        }
        _ => None,
    }
}

/// Table of personas with mood and their strongest bond.
pub fn personas_table(stats: &SessionStats) -> String {
    let mut t = table(&["Name", "Species", "Archetype", "Mood", "Spoken", "Closest"]);
    for p in &stats.personas {
        let closest = p
            .relationships
            .values()
            .max_by(|a, b| a.value.total_cmp(&b.value))
            .map(|r| format!("{} ({:+.2})", r.display_name, r.value))
            .unwrap_or_else(|| "-".into());
        t.add_row(vec![
            p.name.clone(),
            p.species.to_string(),
            p.archetype.to_string(),
            p.mood.dominant_emotion.to_string(),
            p.activity.messages_spoken.to_string(),
            closest,
        ]);
    }
    t.to_string()
}

pub fn stats_block(stats: &SessionStats) -> String {
    let mut lines = vec![
        format!("  tick        {}", stats.tick),
        format!("  scenario    {}", stats.scenario),
        format!("  phase       {}", stats.phase_label),
        format!("  topic       {}", stats.topic.as_deref().unwrap_or("-")),
        format!("  event       {}", stats.active_event.as_deref().unwrap_or("-")),
        format!("  entries     {}", stats.entries),
    ];
    if stats.tick_delay_secs == 0.0 {
        lines.push(format!("  delay       {}", style("paused").yellow()));
    } else {
        lines.push(format!("  delay       {:.1}s", stats.tick_delay_secs));
    }
    for r in &stats.renamed {
        lines.push(format!("  renamed     {} (was {})", r.name, r.former.join(", ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::scheduler::FormerNames;
    use colloquy_types::persona::PersonaId;

    fn plain(s: &str) -> String {
        console::strip_ansi_codes(s).into_owned()
    }

    #[test]
    fn test_utterance_shows_speaker_and_marks() {
        let entry = ConversationEntry {
            tick: 7,
            speaker_id: Some(PersonaId::new("agent_1")),
            speaker_label: "Alice".into(),
            text: "We need water.".into(),
            kind: EntryKind::Utterance {
                initiative: true,
                new_topic: false,
            },
        };
        assert_eq!(plain(&entry_line(&entry)), "[  7] Alice *: We need water.");
    }

    #[test]
    fn test_events_are_labelled() {
        let entry = ConversationEntry {
            tick: 12,
            speaker_id: None,
            speaker_label: "World".into(),
            text: "A storm rolls in.".into(),
            kind: EntryKind::OperatorEvent,
        };
        assert_eq!(plain(&entry_line(&entry)), "[ 12] EVENT A storm rolls in.");
    }

    #[test]
    fn test_stats_list_former_names() {
        let stats = SessionStats {
            owner_id: "local".into(),
            tick: 4,
            tick_delay_secs: 0.0,
            scenario: "desert_island".into(),
            phase: "discuss".into(),
            phase_label: "Discussion".into(),
            topic: None,
            active_event: None,
            entries: 9,
            personas: Vec::new(),
            renamed: vec![FormerNames {
                persona_id: PersonaId::new("agent_1"),
                name: "Gwen".into(),
                former: vec!["Alice".into(), "Ally".into()],
            }],
        };
        let block = plain(&stats_block(&stats));
        assert!(block.contains("delay       paused"));
        assert!(block.ends_with("renamed     Gwen (was Alice, Ally)"));
    }

    #[test]
    fn test_quiet_events_are_hidden() {
        assert!(event_line(&SessionEvent::TickStarted { tick: 3 }).is_none());
        assert!(event_line(&SessionEvent::Stopped { tick: 3 }).is_some());
    }
}
