//! Trait-driven mood simulation.
//!
//! Every function here is pure: it takes the current [`Mood`] plus inputs
//! and returns the next mood, clamped. The scheduler owns the state.

pub mod triggers;

use colloquy_types::config::MoodConfig;
use colloquy_types::mood::{Emotion, Mood, MoodBaseline};
use colloquy_types::persona::{BigFive, SpeciesModifiers};

pub use triggers::{EventCategory, classify};

/// Resting mood derived from personality; the current state starts there.
pub fn from_traits(traits: &BigFive) -> Mood {
    let (o, c, e, a, n) = (traits.o(), traits.c(), traits.e(), traits.a(), traits.n());

    let baseline = MoodBaseline {
        happiness: (e * 0.25 + a * 0.15 + o * 0.1 - n * 0.3).clamp(-0.8, 0.8),
        energy: (0.35 + e * 0.25 + o * 0.1 + c * 0.05).clamp(0.15, 0.9),
        stress: (n * 0.4 - c * 0.15 - a * 0.05).clamp(0.0, 0.7),
        anger: (n * 0.3 - a * 0.35).clamp(0.0, 0.7),
        fear: (n * 0.2 - e * 0.1 - o * 0.05).clamp(0.0, 0.5),
    };

    let mut mood = Mood {
        happiness: baseline.happiness,
        energy: baseline.energy,
        stress: baseline.stress,
        anger: baseline.anger,
        fear: baseline.fear,
        baseline,
        trauma: 0.0,
    };
    mood.clamp();
    mood
}

/// React to a world event.
pub fn apply_event(
    mood: &Mood,
    text: &str,
    traits: &BigFive,
    species: &SpeciesModifiers,
    config: &MoodConfig,
) -> Mood {
    let mut next = *mood;
    let (o, c, e, a, n) = (traits.o(), traits.c(), traits.e(), traits.a(), traits.n());

    let sensitivity = (0.6 + n * 0.6 - c * 0.15).clamp(0.4, 1.3);

    let Some(trigger) = classify(text) else {
        next.stress += 0.05 * sensitivity;
        next.energy += 0.03 + o * 0.04;
        next.clamp();
        return next;
    };

    let category = trigger.category;
    let curiosity = o * 0.4;
    let resilience = e * 0.25 + c * 0.15;
    let empathy = a * 0.3;
    let anger_dampening = a * 0.5;
    let impact = config.event_impact * sensitivity;

    let base = trigger.effects;
    let mut dh = base.happiness * impact;
    let mut de = base.energy * impact;
    let mut ds = base.stress * impact;
    let mut da = base.anger * impact;
    let mut df = base.fear * impact;

    // Curiosity turns part of the fear into energy and interest.
    if df > 0.0 {
        let converted = df * curiosity;
        df -= converted;
        de += converted * 0.5;
        dh += converted * 0.3;
    }
    if ds > 0.0 && category == EventCategory::Mystery {
        ds *= 1.0 - curiosity;
        de += curiosity * 0.15;
    }

    match category {
        EventCategory::Loss => {
            dh -= c * 0.1;
            ds += c * 0.08;
        }
        EventCategory::Danger => ds *= 1.0 - c * 0.3,
        _ => {}
    }

    if dh > 0.0 {
        dh *= 1.0 + resilience;
    } else if dh < 0.0 {
        dh *= 1.0 - resilience * 0.5;
    }
    if de < 0.0 {
        de *= 1.0 - e * 0.3;
    }

    if da > 0.0 {
        da *= 1.0 - anger_dampening;
    }
    if category == EventCategory::Positive {
        dh += empathy * 0.15;
        if ds < 0.0 {
            ds *= 0.6;
        }
        if df < 0.0 {
            df *= 0.5;
        }
    } else if category.is_traumatic() {
        ds += empathy * 0.1;
    }

    if dh < 0.0 {
        dh *= 1.0 + n * 0.3;
    }
    if ds > 0.0 {
        ds *= 1.0 + n * 0.2;
    }

    next.happiness += dh * species.happiness_mult;
    next.energy += de * species.energy_mult;
    next.stress += ds * species.stress_mult;
    next.anger += da * species.anger_mult;
    next.fear += df * species.fear_mult;

    if category.is_threat() {
        next.fear = next.fear.max(0.10);
        next.stress = next.stress.max(0.12);
        if next.happiness > 0.15 {
            next.happiness = (next.happiness - 0.10).max(0.0);
        }
    }

    if category.is_traumatic() {
        next.trauma = (next.trauma + 0.08 * sensitivity).min(1.0);
        next.baseline.stress = (next.baseline.stress + 0.03 * sensitivity).min(0.7);
        next.baseline.fear = (next.baseline.fear + 0.02 * sensitivity).min(0.5);
        next.baseline.happiness = (next.baseline.happiness - 0.02 * sensitivity).max(-0.8);
    }

    next.clamp();
    next
}

/// React to another persona's sentiment toward us.
///
/// Positive input lifts valence (more so for extraverted and agreeable
/// personas); negative input mostly costs valence, with anger inversely
/// scaled by agreeableness.
pub fn apply_interaction(mood: &Mood, delta: f64, traits: &BigFive, config: &MoodConfig) -> Mood {
    let mut next = *mood;
    let (o, c, e, a, n) = (traits.o(), traits.c(), traits.e(), traits.a(), traits.n());

    let sensitivity = (0.6 + n * 0.5 + e * 0.15).clamp(0.5, 1.4);
    let impact = config.interaction_impact * sensitivity;

    if delta > 0.0 {
        let pos = delta;
        next.happiness += pos * impact * (2.0 + e * 2.0);
        next.happiness += pos * impact * a * 1.5;
        next.anger = (next.anger - pos * impact * (1.5 + a * 1.5)).max(0.0);
        next.stress = (next.stress - pos * impact * (0.8 + c * 0.5)).max(0.0);
        next.energy += pos * impact * (0.5 + e);
        next.fear = (next.fear - pos * impact * 0.5).max(0.0);
    } else {
        let neg = delta.abs();
        next.happiness -= neg * impact * (1.5 + a);
        next.anger += (neg * impact * (3.0 - a * 2.5)).max(0.0);
        next.stress += (neg * impact * (1.5 + n - c * 0.5)).max(0.0);
        next.energy -= (neg * impact * (0.5 - e * 0.3)).max(0.0);
    }

    next.energy += o * 0.02;
    next.clamp();
    next
}

/// Move every scalar a trait-scaled fraction toward its baseline.
///
/// Elevated stress, anger and fear carry inertia; accumulated trauma slows
/// recovery of stress and fear. The distance to baseline strictly shrinks
/// whenever it is non-zero.
pub fn decay_toward_baseline(mood: &Mood, traits: &BigFive, config: &MoodConfig) -> Mood {
    let mut next = *mood;
    let (o, c, e, a, n) = (traits.o(), traits.c(), traits.e(), traits.a(), traits.n());
    let base = config.decay_rate;
    let b = mood.baseline;

    fn inertia(current: f64, baseline: f64) -> f64 {
        1.0 - (current - baseline).max(0.0) * 0.7
    }

    let trauma_slowdown = (1.0 - mood.trauma * 0.6).max(0.2);

    let h_rate = base * (1.0 + e * 0.3);
    next.happiness += (b.happiness - next.happiness) * h_rate;

    let e_rate = base * (1.0 + c * 0.15);
    next.energy += (b.energy - next.energy) * e_rate;

    let s_rate = (base * (1.0 + c * 0.4 - n * 0.3) * trauma_slowdown
        * inertia(next.stress, b.stress))
    .max(0.005);
    next.stress += (b.stress - next.stress) * s_rate;

    let a_rate = (base * (1.0 + a * 0.5 - n * 0.3) * inertia(next.anger, b.anger)).max(0.01);
    next.anger += (b.anger - next.anger) * a_rate;

    let f_rate = (base * (1.0 + o * 0.4 - n * 0.25) * trauma_slowdown
        * inertia(next.fear, b.fear))
    .max(0.005);
    next.fear += (b.fear - next.fear) * f_rate;

    next.trauma = (next.trauma - 0.01 * c).max(0.0);

    next.clamp();
    next
}

/// Small adjustments after the persona has spoken.
pub fn apply_speaking(mood: &Mood, traits: &BigFive) -> Mood {
    let mut next = *mood;
    let (e, n, a) = (traits.e(), traits.n(), traits.a());

    next.energy -= 0.06 - e * 0.08;
    next.stress = (next.stress - (0.01 + n * 0.03)).max(0.0);
    next.anger = (next.anger - a * 0.02).max(0.0);

    next.clamp();
    next
}

/// Strongest emotion, or [`Emotion::Neutral`] when nothing reaches 0.1.
pub fn dominant_emotion(mood: &Mood) -> Emotion {
    let m = mood;
    let candidates = [
        (Emotion::Joy, m.happiness),
        (
            Emotion::Sadness,
            if m.happiness < -0.2 { -m.happiness } else { -1.0 },
        ),
        (Emotion::Anger, m.anger),
        (Emotion::Fear, m.fear),
        (Emotion::Anxiety, m.stress),
        (
            Emotion::Fatigue,
            if m.energy < 0.25 { 1.0 - m.energy } else { -1.0 },
        ),
        (
            Emotion::Enthusiasm,
            if m.happiness > 0.3 && m.energy > 0.6 {
                (m.happiness + m.energy) / 2.0
            } else {
                -1.0
            },
        ),
        (
            Emotion::Irritation,
            if m.anger > 0.2 && m.stress > 0.3 {
                (m.anger + m.stress) / 2.0
            } else {
                -1.0
            },
        ),
        (
            Emotion::Determination,
            if m.energy > 0.6 && m.stress < 0.3 && m.fear < 0.2 {
                m.energy
            } else {
                -1.0
            },
        ),
        (
            Emotion::Interest,
            if m.happiness.abs() < 0.2 && m.energy > 0.4 { 0.3 } else { -1.0 },
        ),
    ];

    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.1 > best.1 {
            best = *candidate;
        }
    }
    if best.1 < 0.1 { Emotion::Neutral } else { best.0 }
}

/// Multiplier in [0.4, 1.6] applied to the speak probability.
pub fn talkativeness_modifier(mood: &Mood, traits: &BigFive) -> f64 {
    let (e, n, a) = (traits.e(), traits.n(), traits.a());
    let mut modifier = 1.0;

    if mood.happiness > 0.3 {
        modifier += 0.1 + e * 0.15;
    } else if mood.happiness < -0.3 {
        modifier -= 0.1 + (1.0 - e) * 0.15;
    }

    if mood.anger > 0.4 {
        modifier += if a < 0.3 { 0.25 } else { -0.1 };
    }

    if mood.fear > 0.5 {
        modifier += 0.1 + n * 0.1;
    } else if mood.fear > 0.3 && e < 0.4 {
        modifier -= 0.1;
    }

    if mood.energy < 0.25 {
        modifier -= 0.2 + (1.0 - e) * 0.1;
    } else if mood.energy > 0.7 {
        modifier += 0.05 + e * 0.1;
    }

    if mood.stress > 0.6 {
        modifier += 0.05 + n * 0.15;
    }

    modifier.clamp(0.4, 1.6)
}

/// Prompt guidance describing how the current mood should color speech.
pub fn describe(mood: &Mood) -> String {
    let mut parts = vec![format!("Dominant emotion: {}", dominant_emotion(mood))];

    if mood.happiness > 0.4 {
        parts.push("you are in a GOOD mood: joke, support others, be kinder than usual".into());
    } else if mood.happiness > 0.15 {
        parts.push("your mood is decent".into());
    } else if mood.happiness < -0.4 {
        parts.push("you are DEPRESSED: speak quietly, briefly, sadly; no jokes".into());
    } else if mood.happiness < -0.15 {
        parts.push("you are out of sorts: irritable and pessimistic".into());
    }

    if mood.fear > 0.5 {
        parts.push(
            "you are TERRIFIED: speak in a rush, ask for help, suggest hiding or running; \
             you are too scared to pick fights"
                .into(),
        );
    } else if mood.fear > 0.25 {
        parts.push(
            "you are uneasy: speak carefully, warn about danger; fear keeps your anger down".into(),
        );
    }

    if mood.fear > 0.3 && mood.anger > 0.3 {
        parts.push("fear beats anger: you may snap out of nerves, but do not insult anyone".into());
    } else if mood.anger > 0.6 && mood.fear < 0.2 {
        parts.push("you are FURIOUS: speak harshly and aggressively".into());
    } else if mood.anger > 0.35 && mood.fear < 0.2 {
        parts.push("you are annoyed: rude and argumentative".into());
    } else if mood.anger > 0.15 && mood.fear < 0.15 {
        parts.push("you are slightly irritated".into());
    }

    if mood.stress > 0.7 {
        parts.push("you are under HEAVY stress: nervous and fussy".into());
    } else if mood.stress > 0.4 {
        parts.push("you are tense: you talk fast and impatiently".into());
    }

    if mood.energy < 0.2 {
        parts.push("you are EXHAUSTED: say little, you want to rest".into());
    } else if mood.energy < 0.35 {
        parts.push("you are tired: no energy for long speeches".into());
    } else if mood.energy > 0.8 {
        parts.push("you are full of energy: active and busy".into());
    }

    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::persona::{Archetype, Species};

    fn config() -> MoodConfig {
        MoodConfig::default()
    }

    fn personas() -> Vec<(BigFive, SpeciesModifiers)> {
        Species::ALL
            .iter()
            .flat_map(|species| {
                [
                    Archetype::Altruist,
                    Archetype::Machiavellian,
                    Archetype::Rebel,
                    Archetype::Stoic,
                ]
                .into_iter()
                .map(move |arch| {
                    let mods = species.modifiers();
                    (arch.default_traits().with_offsets(&mods), mods)
                })
            })
            .collect()
    }

    #[test]
    fn baseline_starts_at_rest() {
        for (traits, _) in personas() {
            let mood = from_traits(&traits);
            assert!(mood.is_within_bounds());
            assert_eq!(mood.distance_to_baseline(), 0.0);
            assert!((-0.8..=0.8).contains(&mood.baseline.happiness));
            assert!((0.15..=0.9).contains(&mood.baseline.energy));
            assert!(mood.baseline.fear <= 0.5);
        }
    }

    #[test]
    fn danger_event_enforces_floor_and_lowers_happiness() {
        let cfg = config();
        for (traits, mods) in personas() {
            let mut mood = from_traits(&traits);
            mood.happiness = 0.6;
            let next = apply_event(&mood, "A pack of wolves is circling the camp!", &traits, &mods, &cfg);
            assert!(next.fear >= 0.10);
            assert!(next.stress >= 0.12);
            assert!(next.happiness < mood.happiness);
            assert!(next.trauma > 0.0);
            assert!(next.is_within_bounds());
        }
    }

    #[test]
    fn unmatched_event_nudges_stress_and_energy() {
        let traits = BigFive::default();
        let mood = from_traits(&traits);
        let next = apply_event(&mood, "Clouds drift by", &traits, &SpeciesModifiers::default(), &config());
        assert!(next.stress > mood.stress);
        assert!(next.energy > mood.energy);
        assert_eq!(next.trauma, 0.0);
    }

    #[test]
    fn positive_event_raises_happiness() {
        let traits = Archetype::Altruist.default_traits();
        let mood = from_traits(&traits);
        let next = apply_event(&mood, "A rescue boat is visible", &traits, &SpeciesModifiers::default(), &config());
        assert!(next.happiness > mood.happiness);
    }

    #[test]
    fn interaction_is_asymmetric() {
        let cfg = config();
        let traits = Archetype::Altruist.default_traits();
        let mood = from_traits(&traits);
        let up = apply_interaction(&mood, 0.05, &traits, &cfg);
        let down = apply_interaction(&mood, -0.05, &traits, &cfg);
        assert!(up.happiness > mood.happiness);
        assert!(down.happiness < mood.happiness);
        assert!(down.anger >= mood.anger);
        assert!(up.anger <= mood.anger);
    }

    #[test]
    fn decay_strictly_reduces_distance() {
        let cfg = config();
        for (traits, mods) in personas() {
            let mut mood = from_traits(&traits);
            mood = apply_event(&mood, "Zombie attack at the gate", &traits, &mods, &cfg);
            mood = apply_interaction(&mood, -0.3, &traits, &cfg);
            mood.happiness = -0.9;
            for _ in 0..50 {
                let before = mood.distance_to_baseline();
                let next = decay_toward_baseline(&mood, &traits, &cfg);
                if before > 0.0 {
                    assert!(next.distance_to_baseline() < before);
                }
                assert!(next.is_within_bounds());
                mood = next;
            }
        }
    }

    #[test]
    fn speaking_costs_introverts_energy() {
        let introvert = BigFive::new(50, 50, 10, 50, 50);
        let mood = from_traits(&introvert);
        assert!(apply_speaking(&mood, &introvert).energy < mood.energy);
    }

    #[test]
    fn dominant_emotion_neutral_when_flat() {
        let mut mood = from_traits(&BigFive::default());
        mood.happiness = 0.0;
        mood.energy = 0.3;
        mood.stress = 0.0;
        mood.anger = 0.0;
        mood.fear = 0.0;
        assert_eq!(dominant_emotion(&mood), Emotion::Neutral);
        mood.fear = 0.8;
        assert_eq!(dominant_emotion(&mood), Emotion::Fear);
    }

    #[test]
    fn talkativeness_modifier_is_bounded() {
        for (traits, mods) in personas() {
            let mut mood = from_traits(&traits);
            for text in ["Zombie attack", "rescue!", "lost supplies", "fever spreads"] {
                mood = apply_event(&mood, text, &traits, &mods, &config());
                let m = talkativeness_modifier(&mood, &traits);
                assert!((0.4..=1.6).contains(&m));
            }
        }
    }

    #[test]
    fn describe_mentions_dominant_emotion() {
        let mut mood = from_traits(&BigFive::default());
        mood.fear = 0.9;
        let text = describe(&mood);
        assert!(text.starts_with("Dominant emotion: fear"));
        assert!(text.contains("TERRIFIED"));
    }
}
