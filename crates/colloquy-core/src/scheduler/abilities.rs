//! Species abilities checked after every accepted utterance.

use rand::Rng;

use colloquy_types::persona::Species;

use crate::persona::Persona;

const DANGER_KEYWORDS: &[&str] = &["zombie", "danger", "predator", "snake", "bandit", "enemy", "wolves"];
const REPAIR_KEYWORDS: &[&str] = &["fix", "repair", "mend", "build", "craft", "forge", "smith"];
const COMBAT_KEYWORDS: &[&str] = &["zombie", "bandit", "fight", "battle", "attack", "raid", "horde"];

const FLIGHT_CHANCE: f64 = 0.4;
const BETRAYAL_FEAR: f64 = 0.7;
const BETRAYAL_CHANCE: f64 = 0.3;
const CRAFT_CHANCE: f64 = 0.5;
const BATTLE_CHANCE: f64 = 0.3;

/// Edge change everyone applies towards a traitor.
pub const BETRAYAL_EDGE: f64 = -0.5;
/// Anger everyone gains from a betrayal.
pub const BETRAYAL_ANGER: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ability {
    /// A frightened goblin tries to run.
    Flight { fear: f64 },
    /// A terrified goblin slips away with part of the supplies.
    Betrayal,
    /// An elf senses the danger first.
    EarlyDetection,
    /// A dwarf applies craftsmanship to a repair.
    Craftsmanship { bonus: f64 },
    /// An orc is fired up by a fight.
    BattleSpirit,
}

impl Ability {
    pub fn describe(&self, name: &str) -> String {
        match self {
            Ability::Flight { fear } => format!("{name} tries to run away (fear {fear:.2})"),
            Ability::Betrayal => {
                format!("{name} betrayed the group and ran off with the supplies!")
            }
            Ability::EarlyDetection => format!("{name} senses the danger before anyone else"),
            Ability::Craftsmanship { bonus } => {
                format!("{name} applies dwarven craftsmanship (+{:.0}% repair)", bonus * 100.0)
            }
            Ability::BattleSpirit => format!("{name} is fired up by the fight"),
        }
    }
}

fn mentions(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Roll `persona`'s species ability. Effects on the persona itself are
/// applied here; a betrayal's effect on the others is left to the caller.
pub fn check<R: Rng>(persona: &mut Persona, active_event: Option<&str>, rng: &mut R) -> Option<Ability> {
    let mods = persona.modifiers();
    match persona.species {
        Species::Goblin if persona.mood.fear > mods.flee_threshold => {
            if !rng.gen_bool(FLIGHT_CHANCE) {
                return None;
            }
            if mods.can_betray && persona.mood.fear > BETRAYAL_FEAR && rng.gen_bool(BETRAYAL_CHANCE) {
                return Some(Ability::Betrayal);
            }
            Some(Ability::Flight {
                fear: persona.mood.fear,
            })
        }
        Species::Elf => {
            let event = active_event?;
            (mentions(event, DANGER_KEYWORDS) && rng.gen_bool(mods.detection_bonus.clamp(0.0, 1.0)))
                .then_some(Ability::EarlyDetection)
        }
        Species::Dwarf => {
            let last = persona.memory.completed_actions().last()?;
            (mentions(last, REPAIR_KEYWORDS) && rng.gen_bool(CRAFT_CHANCE)).then_some(
                Ability::Craftsmanship {
                    bonus: mods.repair_bonus,
                },
            )
        }
        Species::Orc => {
            let event = active_event?;
            if mentions(event, COMBAT_KEYWORDS) && rng.gen_bool(BATTLE_CHANCE) {
                persona.mood.energy += 0.15;
                persona.mood.fear -= 0.1;
                persona.mood.clamp();
                return Some(Ability::BattleSpirit);
            }
            None
        }
        _ => None,
    }
}
