//! Speaker selection.

use std::collections::HashSet;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use colloquy_types::config::GateConfig;
use colloquy_types::persona::PersonaId;

use crate::persona::Persona;

const LAST_SPEAKER_DAMPING: f64 = 0.5;
const REPEATING_DAMPING: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub last_speaker: Option<&'a PersonaId>,
    /// An event is active and still inside its forced-reaction window.
    pub reaction_window_open: bool,
    pub reacted: &'a HashSet<PersonaId>,
    pub gates: &'a GateConfig,
}

/// Index of the next speaker.
///
/// Priority: anyone with a pending question, then anyone who has not yet
/// reacted to a fresh event, then a draw weighted by speak probability.
pub fn select_speaker<R: Rng>(
    personas: &[Persona],
    ctx: &SelectionContext<'_>,
    rng: &mut R,
) -> Option<usize> {
    if personas.is_empty() {
        return None;
    }

    let asked: Vec<usize> = indices(personas, |p| p.memory.has_pending_questions());
    if !asked.is_empty() {
        return Some(asked[rng.gen_range(0..asked.len())]);
    }

    if ctx.reaction_window_open {
        let unreacted = indices(personas, |p| !ctx.reacted.contains(&p.id));
        if !unreacted.is_empty() {
            return Some(unreacted[rng.gen_range(0..unreacted.len())]);
        }
    }

    let weights: Vec<f64> = personas
        .iter()
        .map(|p| {
            let mut w = p.speak_probability(rng);
            if ctx.last_speaker == Some(&p.id) {
                w *= LAST_SPEAKER_DAMPING;
            }
            if p.is_repeating(ctx.gates) {
                w *= REPEATING_DAMPING;
            }
            w
        })
        .collect();

    match WeightedIndex::new(&weights) {
        Ok(dist) => Some(dist.sample(rng)),
        Err(_) => Some(rng.gen_range(0..personas.len())),
    }
}

fn indices(personas: &[Persona], pred: impl Fn(&Persona) -> bool) -> Vec<usize> {
    personas
        .iter()
        .enumerate()
        .filter(|(_, p)| pred(p))
        .map(|(i, _)| i)
        .collect()
}
