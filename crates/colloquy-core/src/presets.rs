//! Static content: scenarios, persona presets and newcomer profiles.

use rand::Rng;
use rand::seq::SliceRandom;

use colloquy_types::error::SessionError;
use colloquy_types::persona::{Archetype, Demographics, Gender, PersonaProfile, Species};
use colloquy_types::scenario::Scenario;

pub const DEFAULT_SCENARIO: &str = "desert_island";
pub const DEFAULT_PRESET: &str = "humans";

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

struct ScenarioDef {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    context: &'static str,
    events: &'static [&'static str],
}

const SCENARIOS: &[ScenarioDef] = &[
    ScenarioDef {
        key: "desert_island",
        name: "Desert island",
        description: "Shipwreck survivors on an uncharted tropical island",
        context: "Your ship sank in a storm. You washed up on an uncharted island with \
                  white sand, dense jungle and a mountain in the middle. You have a few \
                  crates from the ship, a knife and a broken radio. Nobody knows where you are.",
        events: &[
            "A thunderstorm is rolling in from the sea, the wind is picking up",
            "Smoke from another fire has appeared on the far side of the island",
            "A crate washed ashore with canned food and a flare gun inside",
            "Someone noticed that half of the drinking water is gone",
            "A snake slithered out of the bushes right next to the camp",
            "A ship's silhouette is visible on the horizon",
            "The radio suddenly crackled and caught a fragment of a voice",
            "Strange footprints were found near the stream",
            "The tide is coming in faster than expected and flooding the beach",
            "A big crab stole the last piece of dried fish",
        ],
    },
    ScenarioDef {
        key: "zombie_apocalypse",
        name: "Zombie apocalypse",
        description: "Survivors barricaded in an abandoned supermarket",
        context: "The city has fallen to an infection that turns people into zombies. \
                  You are barricaded in an abandoned supermarket on the outskirts. The \
                  shelves are half empty, the generator runs on the last canister of fuel, \
                  and the moaning outside never stops.",
        events: &[
            "Zombies are banging on the back door, the barricade is creaking",
            "The generator coughed and the lights went out",
            "A helicopter flew over the roof and disappeared towards the center",
            "Someone is knocking on the front door and asking for help",
            "A first aid kit with antibiotics was found in the warehouse",
            "The radio broadcast coordinates of an evacuation point",
            "One of the group has a scratch of unknown origin",
            "A horde of zombies is moving down the street towards the supermarket",
            "The water pipes burst and the storage room is flooding",
            "A working car with half a tank was found in the parking lot",
        ],
    },
    ScenarioDef {
        key: "space_station",
        name: "Space station",
        description: "Crew of an orbital station after a systems failure",
        context: "You are the crew of a research station orbiting Jupiter. After a \
                  meteor strike the main systems are failing, contact with Earth is lost, \
                  and the oxygen reserve is enough for about two weeks.",
        events: &[
            "The oxygen level alarm went off in module B",
            "A meteor shower is approaching the station",
            "An unknown signal is coming from the planet's surface",
            "The main computer rebooted and lost part of the navigation data",
            "A crack appeared in the window of the observation deck",
            "The supply drone docked with a container of spare parts",
            "The artificial gravity system is failing",
            "Earth answered on the emergency channel, but the connection keeps breaking",
            "A fire broke out in the hydroponics bay",
            "One of the escape pods turned out to be damaged",
        ],
    },
    ScenarioDef {
        key: "fantasy_tavern",
        name: "Fantasy tavern",
        description: "Adventurers trapped in a tavern by a blizzard",
        context: "A blizzard has trapped you in the Prancing Griffin, a roadside tavern \
                  at a mountain pass. The innkeeper is nervous, the cellar is full of ale, \
                  and rumors say the pass is haunted.",
        events: &[
            "A hooded stranger entered the tavern and sat silently in the corner",
            "Wolves are howling right outside the walls",
            "The innkeeper found a treasure map hidden under the floorboards",
            "A bar fight broke out between two mercenaries",
            "The fire in the hearth suddenly turned blue",
            "A wounded messenger burst in with news of an orc raid",
            "The ale in the cellar has run out",
            "A bard began a song about a cursed sword lying in the mountains",
            "Someone's purse with gold disappeared from the table",
            "The roof began to collapse under the weight of the snow",
        ],
    },
];

pub fn scenario(key: &str) -> Result<Scenario, SessionError> {
    SCENARIOS
        .iter()
        .find(|s| s.key == key)
        .map(|s| Scenario {
            key: s.key.to_string(),
            name: s.name.to_string(),
            description: s.description.to_string(),
            context: s.context.to_string(),
            events: s.events.iter().map(|e| e.to_string()).collect(),
        })
        .ok_or_else(|| SessionError::UnknownScenario(key.to_string()))
}

/// `(key, name)` of every scenario.
pub fn scenario_keys() -> Vec<(&'static str, &'static str)> {
    SCENARIOS.iter().map(|s| (s.key, s.name)).collect()
}

// ---------------------------------------------------------------------------
// Persona presets
// ---------------------------------------------------------------------------

struct PersonaDef {
    name: &'static str,
    species: Species,
    archetype: Archetype,
    gender: Gender,
    age: u32,
    interests: &'static str,
    background: &'static str,
}

struct PresetDef {
    key: &'static str,
    name: &'static str,
    personas: &'static [PersonaDef],
}

const PRESETS: &[PresetDef] = &[
    PresetDef {
        key: "humans",
        name: "Humans (classic)",
        personas: &[
            PersonaDef {
                name: "Alice",
                species: Species::Human,
                archetype: Archetype::Altruist,
                gender: Gender::Female,
                age: 25,
                interests: "psychology, helping people, art",
                background: "Always ready to support and listen.",
            },
            PersonaDef {
                name: "Boris",
                species: Species::Human,
                archetype: Archetype::Stoic,
                gender: Gender::Male,
                age: 35,
                interests: "technology, science, logic",
                background: "Prefers facts to emotions and analyzes every situation.",
            },
            PersonaDef {
                name: "Vicky",
                species: Species::Human,
                archetype: Archetype::Machiavellian,
                gender: Gender::Female,
                age: 28,
                interests: "power, manipulation, criticizing everyone around",
                background: "Extremely toxic and quarrelsome. She is ALWAYS unhappy with \
                             others, scolds and insults them, and never agrees with anyone.",
            },
        ],
    },
    PresetDef {
        key: "fantasy_party",
        name: "Fantasy party (elf, dwarf, orc)",
        personas: &[
            PersonaDef {
                name: "Legolas",
                species: Species::Elf,
                archetype: Archetype::Stoic,
                gender: Gender::Male,
                age: 300,
                interests: "nature, wisdom, archery",
                background: "An ancient elf who has seen much. Arrogant towards other \
                             races, but fair.",
            },
            PersonaDef {
                name: "Gimli",
                species: Species::Dwarf,
                archetype: Archetype::Rebel,
                gender: Gender::Male,
                age: 140,
                interests: "smithing, mining, ale",
                background: "A stubborn dwarf craftsman. Greedy when sharing, reliable in \
                             a fight. Hates elves.",
            },
            PersonaDef {
                name: "Uruk",
                species: Species::Orc,
                archetype: Archetype::Machiavellian,
                gender: Gender::Male,
                age: 30,
                interests: "battle, weapons, strength",
                background: "An aggressive orc warrior. Respects only strength and courage \
                             and despises the weak.",
            },
        ],
    },
    PresetDef {
        key: "mixed_survival",
        name: "Mixed group (human, elf, goblin)",
        personas: &[
            PersonaDef {
                name: "Aragorn",
                species: Species::Human,
                archetype: Archetype::Altruist,
                gender: Gender::Male,
                age: 35,
                interests: "leadership, strategy, diplomacy",
                background: "A born leader and diplomat who tries to unite the group.",
            },
            PersonaDef {
                name: "Arwen",
                species: Species::Elf,
                archetype: Archetype::Stoic,
                gender: Gender::Female,
                age: 250,
                interests: "healing, nature, knowledge",
                background: "A wise elven healer. Calm, but despises rudeness.",
            },
            PersonaDef {
                name: "Fick",
                species: Species::Goblin,
                archetype: Archetype::Rebel,
                gender: Gender::Male,
                age: 15,
                interests: "stealing, cunning, survival",
                background: "A cowardly goblin trickster. Sly and greedy, may betray the \
                             group when danger comes.",
            },
        ],
    },
    PresetDef {
        key: "classic_party",
        name: "Classic party (four species)",
        personas: &[
            PersonaDef {
                name: "Anna",
                species: Species::Human,
                archetype: Archetype::Altruist,
                gender: Gender::Female,
                age: 28,
                interests: "diplomacy, medicine, negotiation",
                background: "A diplomat and mediator who finds common ground with everyone.",
            },
            PersonaDef {
                name: "Tauril",
                species: Species::Elf,
                archetype: Archetype::Stoic,
                gender: Gender::Male,
                age: 400,
                interests: "ancient lore, magic, nature",
                background: "An ancient sage. Arrogant, but indispensable in hard decisions.",
            },
            PersonaDef {
                name: "Thorin",
                species: Species::Dwarf,
                archetype: Archetype::Rebel,
                gender: Gender::Male,
                age: 160,
                interests: "smithing, mines, treasure",
                background: "A master smith. Stubborn as a rock and greedy when sharing, \
                             but a loyal companion.",
            },
            PersonaDef {
                name: "Grok",
                species: Species::Orc,
                archetype: Archetype::Machiavellian,
                gender: Gender::Male,
                age: 25,
                interests: "battle, weapons, hunting",
                background: "A fierce orc warrior. Respects only strength. Aggressive, but \
                             honest in battle.",
            },
        ],
    },
    PresetDef {
        key: "goblin_betrayal",
        name: "Goblin traitor",
        personas: &[
            PersonaDef {
                name: "John",
                species: Species::Human,
                archetype: Archetype::Altruist,
                gender: Gender::Male,
                age: 30,
                interests: "leadership, protection, strategy",
                background: "The group's leader. Believes in everyone, even the goblin.",
            },
            PersonaDef {
                name: "Grok",
                species: Species::Orc,
                archetype: Archetype::Stoic,
                gender: Gender::Male,
                age: 28,
                interests: "battle, endurance, weapons",
                background: "A silent orc warrior. Despises cowards and is ready to \
                             defend the group.",
            },
            PersonaDef {
                name: "Fick",
                species: Species::Goblin,
                archetype: Archetype::Rebel,
                gender: Gender::Male,
                age: 12,
                interests: "cunning, stealing, escape",
                background: "A cowardly goblin and the weak link of the group. May betray \
                             everyone at the first danger and steal the supplies.",
            },
        ],
    },
];

pub fn preset(key: &str) -> Result<Vec<PersonaProfile>, SessionError> {
    let preset = PRESETS
        .iter()
        .find(|p| p.key == key)
        .ok_or_else(|| SessionError::UnknownPreset(key.to_string()))?;
    Ok(preset
        .personas
        .iter()
        .map(|p| PersonaProfile {
            name: p.name.to_string(),
            species: p.species,
            archetype: p.archetype,
            demographics: Demographics {
                gender: p.gender,
                age: p.age,
                interests: p.interests.to_string(),
                background: p.background.to_string(),
            },
            traits: None,
        })
        .collect())
}

/// `(key, name)` of every persona preset.
pub fn preset_keys() -> Vec<(&'static str, &'static str)> {
    PRESETS.iter().map(|p| (p.key, p.name)).collect()
}

// ---------------------------------------------------------------------------
// Newcomers
// ---------------------------------------------------------------------------

struct NewcomerDef {
    interests: &'static [&'static str],
    backgrounds: &'static [&'static str],
    ages: (u32, u32),
}

fn newcomer_def(species: Species, archetype: Archetype) -> Option<NewcomerDef> {
    use Archetype::*;
    use Species::*;

    let def = match (species, archetype) {
        (Human, Altruist) => NewcomerDef {
            interests: &["psychology, helping people, art", "medicine, diplomacy, negotiation"],
            backgrounds: &[
                "Always ready to support and listen. Believes in the best in people.",
                "A peacemaker by calling who finds compromises where others see a dead end.",
            ],
            ages: (20, 40),
        },
        (Human, Stoic) => NewcomerDef {
            interests: &["technology, science, logic", "engineering, mathematics, tactics"],
            backgrounds: &[
                "Prefers facts to emotions and analyzes the situation coldly.",
                "Cool under pressure. Stays silent until the best option is found.",
            ],
            ages: (25, 45),
        },
        (Human, Machiavellian) => NewcomerDef {
            interests: &["power, manipulation, criticism", "intrigue, control, provocation"],
            backgrounds: &[
                "A manipulator by nature who sees weakness in everyone and uses it.",
                "A provocateur who sows discord for personal gain.",
            ],
            ages: (22, 38),
        },
        (Human, Rebel) => NewcomerDef {
            interests: &["freedom, unconventional ideas", "adventure, risk, improvisation"],
            backgrounds: &[
                "Recognizes no authority and always goes against the current.",
                "An adventurer who prefers acting to talking.",
            ],
            ages: (18, 35),
        },
        (Elf, Altruist) => NewcomerDef {
            interests: &["healing, nature, knowledge", "music, poetry, herbalism"],
            backgrounds: &["A wise elf who strives for harmony and healing."],
            ages: (100, 500),
        },
        (Elf, Stoic) => NewcomerDef {
            interests: &["nature, wisdom, archery", "ancient lore, magic, history"],
            backgrounds: &["A silent observer whose every word is worth its weight in gold."],
            ages: (200, 600),
        },
        (Elf, Machiavellian) => NewcomerDef {
            interests: &["secret knowledge, intrigue, power"],
            backgrounds: &["A dark elf schemer who considers everyone beneath them."],
            ages: (150, 500),
        },
        (Elf, Rebel) => NewcomerDef {
            interests: &["wandering, forbidden magic, freedom"],
            backgrounds: &["An exile from the elven woods who mocks the old traditions."],
            ages: (80, 300),
        },
        (Dwarf, Altruist) => NewcomerDef {
            interests: &["smithing, brewing, storytelling"],
            backgrounds: &["A kind-hearted smith who shares the last crust of bread."],
            ages: (80, 200),
        },
        (Dwarf, Stoic) => NewcomerDef {
            interests: &["mining, engineering, runes"],
            backgrounds: &["A gloomy master craftsman. Stubborn, but never lets the group down."],
            ages: (100, 250),
        },
        (Dwarf, Machiavellian) => NewcomerDef {
            interests: &["gold, trade, debts"],
            backgrounds: &["A greedy merchant who counts every coin and trusts no one."],
            ages: (90, 220),
        },
        (Dwarf, Rebel) => NewcomerDef {
            interests: &["explosives, ale, brawls"],
            backgrounds: &["A rowdy dwarf who solves problems with a hammer."],
            ages: (60, 180),
        },
        (Orc, Altruist) => NewcomerDef {
            interests: &["protecting the weak, hunting, honor"],
            backgrounds: &["An unusual orc who fights for others, not for glory."],
            ages: (18, 40),
        },
        (Orc, Stoic) => NewcomerDef {
            interests: &["battle, endurance, weapons"],
            backgrounds: &["A silent warrior who despises cowards."],
            ages: (20, 40),
        },
        (Orc, Machiavellian) => NewcomerDef {
            interests: &["conquest, strength, domination"],
            backgrounds: &["A warlord who respects only strength."],
            ages: (20, 40),
        },
        (Orc, Rebel) => NewcomerDef {
            interests: &["battle, pranks, freedom"],
            backgrounds: &["A reckless brawler who attacks first and thinks later."],
            ages: (16, 30),
        },
        (Goblin, Altruist) => NewcomerDef {
            interests: &["tinkering, scavenging, friendship"],
            backgrounds: &["A rare honest goblin who wants to be accepted."],
            ages: (8, 20),
        },
        (Goblin, Stoic) => NewcomerDef {
            interests: &["traps, observation, patience"],
            backgrounds: &["A quiet goblin who watches everything and says little."],
            ages: (10, 25),
        },
        (Goblin, Machiavellian) => NewcomerDef {
            interests: &["theft, blackmail, intrigue"],
            backgrounds: &["A scheming goblin who sells out anyone for a coin."],
            ages: (10, 25),
        },
        (Goblin, Rebel) => NewcomerDef {
            interests: &["stealing, cunning, escape"],
            backgrounds: &["A cowardly trickster who may betray the group at the first danger."],
            ages: (8, 20),
        },
        (_, Individual) => return None,
    };
    Some(def)
}

fn fallback_ages(species: Species) -> (u32, u32) {
    match species {
        Species::Human => (20, 40),
        Species::Elf => (100, 500),
        Species::Dwarf => (80, 200),
        Species::Orc => (18, 35),
        Species::Goblin => (8, 20),
    }
}

/// Randomized profile for a persona added mid-session without demographics.
pub fn newcomer_profile<R: Rng>(
    name: &str,
    species: Species,
    archetype: Archetype,
    rng: &mut R,
) -> PersonaProfile {
    let (interests, background, (min_age, max_age)) = match newcomer_def(species, archetype) {
        Some(def) => (
            def.interests.choose(rng).copied().unwrap_or_default(),
            def.backgrounds.choose(rng).copied().unwrap_or_default(),
            def.ages,
        ),
        None => (
            "survival, observation",
            "A new member of the group.",
            fallback_ages(species),
        ),
    };
    let gender = if rng.gen_bool(0.5) {
        Gender::Male
    } else {
        Gender::Female
    };

    PersonaProfile {
        name: name.to_string(),
        species,
        archetype,
        demographics: Demographics {
            gender,
            age: rng.gen_range(min_age..=max_age),
            interests: interests.to_string(),
            background: background.to_string(),
        },
        traits: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn every_scenario_has_events() {
        for (key, _) in scenario_keys() {
            let scenario = scenario(key).unwrap();
            assert!(scenario.events.len() >= 5, "{key}");
            assert!(!scenario.context.is_empty());
        }
        assert!(matches!(
            scenario("moon_base"),
            Err(SessionError::UnknownScenario(_))
        ));
    }

    #[test]
    fn presets_have_unique_names_and_two_personas() {
        for (key, _) in preset_keys() {
            let personas = preset(key).unwrap();
            assert!(personas.len() >= 2, "{key}");
            let mut names: Vec<_> = personas.iter().map(|p| p.name.clone()).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), personas.len(), "{key}");
        }
        assert!(matches!(preset("nobody"), Err(SessionError::UnknownPreset(_))));
    }

    #[test]
    fn goblin_betrayal_preset_has_goblin() {
        let personas = preset("goblin_betrayal").unwrap();
        assert!(personas.iter().any(|p| p.species == Species::Goblin));
    }

    #[test]
    fn newcomer_age_follows_species() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let elf = newcomer_profile("Nim", Species::Elf, Archetype::Stoic, &mut rng);
            assert!((200..=600).contains(&elf.demographics.age));
            assert!(!elf.demographics.interests.is_empty());
        }
        let custom = newcomer_profile("Zed", Species::Goblin, Archetype::Individual, &mut rng);
        assert_eq!(custom.demographics.interests, "survival, observation");
        assert!((8..=20).contains(&custom.demographics.age));
    }
}
