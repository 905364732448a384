//! Sentiment of an utterance towards the personas it names.
//!
//! Only the sentence that names a persona is scanned, so "I am ready to
//! help you, Boris" does not read as praise coming from Boris.

use std::sync::LazyLock;

use regex::Regex;

use colloquy_types::persona::{PersonaId, Species};

use crate::persona::{NameRegistry, Persona};

static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?…]+").expect("valid regex"));

const POSITIVE: &[&str] = &[
    "thank",
    "well done",
    "great",
    "agree",
    "right",
    "good idea",
    "support",
    "helped",
    "grateful",
    "trust",
    "smart",
    "clever",
];

const NEGATIVE: &[&str] = &[
    "disagree",
    "don't agree",
    "stupid",
    "useless",
    "pointless",
    "mistake",
    "wrong",
    "your fault",
    "in the way",
    "enough",
    "sick of",
    "annoying",
    "don't trust",
    "suspect",
    "liar",
    "lying",
    "traitor",
];

const BRAVERY: &[&str] = &[
    "brave",
    "bold",
    "i'll go first",
    "not afraid",
    "i'll risk",
    "fearless",
    "courage",
    "hero",
    "fight",
];

const SHARING: &[&str] = &[
    "share",
    "split",
    "equally",
    "divide",
    "supplies",
    "resources",
    "rations",
    "hand out",
];

/// Relationship change the speaker feels towards one named persona.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentiment {
    pub target: PersonaId,
    pub delta: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentimentScan {
    pub sentiments: Vec<Sentiment>,
    /// Anger the speaker gains from the scan itself.
    pub speaker_anger: f64,
}

fn first_match<'a>(text: &str, table: &[&'a str]) -> Option<&'a str> {
    table.iter().copied().find(|p| text.contains(p))
}

fn named_sentence<'a>(text: &'a str, name: &str) -> &'a str {
    SENTENCE_RE
        .split(text)
        .find(|s| s.contains(name))
        .unwrap_or(text)
}

/// Scan `text` by `speaker` for praise or blame of every other named persona.
pub fn analyze(
    text: &str,
    speaker: &Persona,
    everyone: &[Persona],
    registry: &NameRegistry,
    change_rate: f64,
) -> SentimentScan {
    let lower = text.to_lowercase();
    let sharing = first_match(&lower, SHARING).is_some();
    let bravery = first_match(&lower, BRAVERY).is_some();
    let mut scan = SentimentScan::default();

    for target in everyone.iter().filter(|p| p.id != speaker.id) {
        let name = registry.name_of(&target.id).to_lowercase();
        if !lower.contains(&name) {
            continue;
        }
        let context = named_sentence(&lower, &name);

        // Negative phrases are checked first: "disagree" and "don't trust"
        // contain positive keywords.
        let (mut delta, mut reason) = if let Some(p) = first_match(context, NEGATIVE) {
            (-change_rate, format!("negative: '{p}'"))
        } else if let Some(p) = first_match(context, POSITIVE) {
            (change_rate, format!("positive: '{p}'"))
        } else {
            continue;
        };

        if target.species == Species::Orc && bravery {
            delta += 0.15;
            reason.push_str(" + bravery (orc is impressed)");
        }
        if speaker.species == Species::Dwarf && sharing {
            scan.speaker_anger = 0.10;
            delta -= 0.05;
            reason.push_str(" + greed (dwarf resents sharing)");
        }
        if speaker.species == Species::Goblin && sharing {
            delta -= 0.10;
            reason.push_str(" + greed (goblin wants more)");
        }

        if delta != 0.0 {
            scan.sentiments.push(Sentiment {
                target: target.id.clone(),
                delta,
                reason,
            });
        }
    }
    scan
}
