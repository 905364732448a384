//! Persona identity and static traits.
//!
//! A persona is keyed by a stable [`PersonaId`]; its display name lives in the
//! per-session registry so renames never touch stored history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable, opaque persona identifier (`agent_{n}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonaId(String);

impl PersonaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the id for the `n`-th persona of a session.
    pub fn numbered(n: usize) -> Self {
        Self(format!("agent_{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonaId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Five personality scores, each 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigFive {
    pub openness: u8,
    pub conscientiousness: u8,
    pub extraversion: u8,
    pub agreeableness: u8,
    pub neuroticism: u8,
}

impl Default for BigFive {
    fn default() -> Self {
        Self::new(50, 50, 50, 50, 50)
    }
}

impl BigFive {
    pub const fn new(o: u8, c: u8, e: u8, a: u8, n: u8) -> Self {
        Self {
            openness: o,
            conscientiousness: c,
            extraversion: e,
            agreeableness: a,
            neuroticism: n,
        }
    }

    pub fn o(&self) -> f64 {
        f64::from(self.openness) / 100.0
    }

    pub fn c(&self) -> f64 {
        f64::from(self.conscientiousness) / 100.0
    }

    pub fn e(&self) -> f64 {
        f64::from(self.extraversion) / 100.0
    }

    pub fn a(&self) -> f64 {
        f64::from(self.agreeableness) / 100.0
    }

    pub fn n(&self) -> f64 {
        f64::from(self.neuroticism) / 100.0
    }

    /// Apply additive species offsets, clamping each score to 0..=100.
    pub fn with_offsets(&self, mods: &SpeciesModifiers) -> Self {
        fn shift(base: u8, delta: i16) -> u8 {
            (i16::from(base) + delta).clamp(0, 100) as u8
        }
        Self {
            openness: shift(self.openness, mods.openness),
            conscientiousness: shift(self.conscientiousness, mods.conscientiousness),
            extraversion: shift(self.extraversion, mods.extraversion),
            agreeableness: shift(self.agreeableness, mods.agreeableness),
            neuroticism: shift(self.neuroticism, mods.neuroticism),
        }
    }

    /// Short natural-language rendering used in persona prompts.
    pub fn describe(&self) -> String {
        let mut traits = Vec::new();
        if self.openness > 70 {
            traits.push("very open to new ideas and experiences");
        } else if self.openness < 30 {
            traits.push("prefers proven methods");
        }
        if self.conscientiousness > 70 {
            traits.push("organized and disciplined");
        } else if self.conscientiousness < 30 {
            traits.push("spontaneous and flexible");
        }
        if self.extraversion > 70 {
            traits.push("energetic and sociable");
        } else if self.extraversion < 30 {
            traits.push("reserved and thoughtful");
        }
        if self.agreeableness > 70 {
            traits.push("friendly and helpful");
        } else if self.agreeableness < 15 {
            traits.push("hostile, picks fights and argues with everyone");
        } else if self.agreeableness < 30 {
            traits.push("critical and independent");
        }
        if self.neuroticism > 80 {
            traits.push("extremely irritable and quick-tempered");
        } else if self.neuroticism > 70 {
            traits.push("emotional and sensitive");
        } else if self.neuroticism < 30 {
            traits.push("calm and stable");
        }
        if traits.is_empty() {
            "a balanced personality".to_string()
        } else {
            traits.join(", ")
        }
    }
}

/// Archetype tag that selects default traits, speech style and plan flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Altruist,
    Machiavellian,
    Rebel,
    Stoic,
    Individual,
}

impl Archetype {
    pub fn default_traits(&self) -> BigFive {
        match self {
            Archetype::Altruist => BigFive::new(70, 60, 65, 85, 35),
            Archetype::Machiavellian => BigFive::new(55, 70, 75, 10, 85),
            Archetype::Rebel => BigFive::new(85, 30, 60, 40, 65),
            Archetype::Stoic => BigFive::new(45, 75, 30, 50, 20),
            Archetype::Individual => BigFive::default(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Archetype::Altruist => "Altruist (kind)",
            Archetype::Machiavellian => "Machiavellian (hostile)",
            Archetype::Rebel => "Rebel (unpredictable)",
            Archetype::Stoic => "Stoic (composed)",
            Archetype::Individual => "Individual (custom)",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Archetype::Altruist => write!(f, "altruist"),
            Archetype::Machiavellian => write!(f, "machiavellian"),
            Archetype::Rebel => write!(f, "rebel"),
            Archetype::Stoic => write!(f, "stoic"),
            Archetype::Individual => write!(f, "individual"),
        }
    }
}

impl FromStr for Archetype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "altruist" => Ok(Archetype::Altruist),
            "machiavellian" => Ok(Archetype::Machiavellian),
            "rebel" => Ok(Archetype::Rebel),
            "stoic" => Ok(Archetype::Stoic),
            "individual" => Ok(Archetype::Individual),
            other => Err(format!("invalid archetype: '{other}'")),
        }
    }
}

/// Additive trait offsets, mood multipliers and special abilities of a species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeciesModifiers {
    pub openness: i16,
    pub conscientiousness: i16,
    pub extraversion: i16,
    pub agreeableness: i16,
    pub neuroticism: i16,

    pub happiness_mult: f64,
    pub energy_mult: f64,
    pub stress_mult: f64,
    pub anger_mult: f64,
    pub fear_mult: f64,

    pub repair_bonus: f64,
    pub combat_bonus: f64,
    pub diplomacy_bonus: f64,
    pub detection_bonus: f64,

    pub can_betray: bool,
    pub flee_threshold: f64,
    pub stubborn: bool,
}

impl Default for SpeciesModifiers {
    fn default() -> Self {
        Self {
            openness: 0,
            conscientiousness: 0,
            extraversion: 0,
            agreeableness: 0,
            neuroticism: 0,
            happiness_mult: 1.0,
            energy_mult: 1.0,
            stress_mult: 1.0,
            anger_mult: 1.0,
            fear_mult: 1.0,
            repair_bonus: 0.0,
            combat_bonus: 0.0,
            diplomacy_bonus: 0.0,
            detection_bonus: 0.0,
            can_betray: false,
            flee_threshold: 1.0,
            stubborn: false,
        }
    }
}

/// Species tag carried by every persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Human,
    Elf,
    Dwarf,
    Orc,
    Goblin,
}

impl Species {
    pub const ALL: [Species; 5] = [
        Species::Human,
        Species::Elf,
        Species::Dwarf,
        Species::Orc,
        Species::Goblin,
    ];

    pub fn modifiers(&self) -> SpeciesModifiers {
        let base = SpeciesModifiers::default();
        match self {
            Species::Human => SpeciesModifiers {
                diplomacy_bonus: 0.20,
                ..base
            },
            Species::Elf => SpeciesModifiers {
                openness: 15,
                neuroticism: -15,
                energy_mult: 0.80,
                stress_mult: 0.50,
                detection_bonus: 0.10,
                ..base
            },
            Species::Dwarf => SpeciesModifiers {
                conscientiousness: 20,
                agreeableness: -10,
                energy_mult: 1.10,
                anger_mult: 1.30,
                repair_bonus: 0.30,
                stubborn: true,
                ..base
            },
            Species::Orc => SpeciesModifiers {
                extraversion: 20,
                agreeableness: -20,
                anger_mult: 1.50,
                fear_mult: 0.50,
                combat_bonus: 0.40,
                ..base
            },
            Species::Goblin => SpeciesModifiers {
                agreeableness: -25,
                neuroticism: 30,
                energy_mult: 1.20,
                fear_mult: 1.80,
                can_betray: true,
                flee_threshold: 0.6,
                ..base
            },
        }
    }

    /// Innate attitude of this species toward `other`, in [-1, 1].
    pub fn relation_to(&self, other: Species) -> f64 {
        use Species::*;
        match (self, other) {
            (Human, Human) => 0.10,
            (Human, Elf) | (Human, Dwarf) => 0.05,
            (Human, Orc) | (Human, Goblin) => 0.0,
            (Elf, Human) => 0.05,
            (Elf, Elf) => 0.15,
            (Elf, Dwarf) => -0.20,
            (Elf, Orc) => -0.30,
            (Elf, Goblin) => -0.15,
            (Dwarf, Human) => 0.10,
            (Dwarf, Elf) => -0.20,
            (Dwarf, Dwarf) => 0.20,
            (Dwarf, Orc) => -0.10,
            (Dwarf, Goblin) => -0.25,
            (Orc, Human) | (Orc, Dwarf) => 0.05,
            (Orc, Elf) => -0.15,
            (Orc, Orc) => 0.25,
            (Orc, Goblin) => -0.30,
            (Goblin, Goblin) => 0.10,
            (Goblin, _) => -0.10,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Species::Human => "versatile, adaptable, diplomatic",
            Species::Elf => "long-lived, wise, arrogant",
            Species::Dwarf => "stubborn, hard-working, a master craftsman",
            Species::Orc => "aggressive, blunt, respects strength",
            Species::Goblin => "cunning, cowardly, treacherous",
        }
    }

    /// Species-specific guidance appended to the persona prompt.
    pub fn traits_prompt(&self) -> &'static [&'static str] {
        match self {
            Species::Human => &[
                "You are versatile and adaptable",
                "You are diplomatic and mend relationships faster than others",
                "You are curious about every species",
                "You act as a mediator and help others reconcile",
            ],
            Species::Elf => &[
                "You have lived a long time and seen a lot",
                "You are calm and wise; stress affects you less",
                "You look down on orcs and goblins",
                "You cannot stand dwarves (an ancient feud)",
                "You sense danger earlier than others",
            ],
            Species::Dwarf => &[
                "You are stubborn and RARELY change your mind",
                "You are a master of repair and crafting",
                "You dislike elves (an ancient feud)",
                "You are greedy when resources are shared",
                "You are quick to anger",
            ],
            Species::Orc => &[
                "You are blunt and aggressive",
                "You respect ONLY strength and bravery",
                "You despise cowards and weaklings",
                "Elves are arrogant weaklings to you",
                "You are hardly afraid of danger",
            ],
            Species::Goblin => &[
                "You are cowardly and cunning",
                "You fear anyone stronger than you",
                "You may betray the group if you are too scared",
                "You are greedy and always look for personal gain",
                "When badly frightened you try to run away",
            ],
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Species::Human => write!(f, "human"),
            Species::Elf => write!(f, "elf"),
            Species::Dwarf => write!(f, "dwarf"),
            Species::Orc => write!(f, "orc"),
            Species::Goblin => write!(f, "goblin"),
        }
    }
}

impl FromStr for Species {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Species::Human),
            "elf" => Ok(Species::Elf),
            "dwarf" => Ok(Species::Dwarf),
            "orc" => Ok(Species::Orc),
            "goblin" => Ok(Species::Goblin),
            other => Err(format!("invalid species: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Demographic details rendered into the persona prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub gender: Gender,
    pub age: u32,
    #[serde(default)]
    pub interests: String,
    #[serde(default)]
    pub background: String,
}

impl Default for Demographics {
    fn default() -> Self {
        Self {
            gender: Gender::Male,
            age: 25,
            interests: String::new(),
            background: String::new(),
        }
    }
}

/// Everything needed to instantiate a persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub name: String,
    pub species: Species,
    pub archetype: Archetype,
    #[serde(default)]
    pub demographics: Demographics,
    /// Explicit traits; archetype defaults apply when absent.
    #[serde(default)]
    pub traits: Option<BigFive>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_id_numbered() {
        assert_eq!(PersonaId::numbered(3).as_str(), "agent_3");
        assert_eq!(PersonaId::from("agent_1").to_string(), "agent_1");
    }

    #[test]
    fn test_species_offsets_clamp() {
        let traits = BigFive::new(95, 50, 50, 10, 90);
        let goblin = traits.with_offsets(&Species::Goblin.modifiers());
        assert_eq!(goblin.agreeableness, 0);
        assert_eq!(goblin.neuroticism, 100);
        let elf = traits.with_offsets(&Species::Elf.modifiers());
        assert_eq!(elf.openness, 100);
        assert_eq!(elf.neuroticism, 75);
    }

    #[test]
    fn test_species_parse_roundtrip() {
        for species in Species::ALL {
            let parsed: Species = species.to_string().parse().unwrap();
            assert_eq!(parsed, species);
        }
        assert!("dragon".parse::<Species>().is_err());
    }

    #[test]
    fn test_archetype_parse_case_insensitive() {
        assert_eq!("Stoic".parse::<Archetype>().unwrap(), Archetype::Stoic);
        assert!("paladin".parse::<Archetype>().is_err());
    }

    #[test]
    fn test_relation_matrix_is_bounded() {
        for a in Species::ALL {
            for b in Species::ALL {
                let r = a.relation_to(b);
                assert!((-1.0..=1.0).contains(&r));
            }
        }
        assert!((Species::Elf.relation_to(Species::Orc) + 0.30).abs() < f64::EPSILON);
    }

    #[test]
    fn test_describe_balanced() {
        assert_eq!(BigFive::default().describe(), "a balanced personality");
        assert!(BigFive::new(50, 50, 50, 10, 50).describe().contains("hostile"));
    }
}
