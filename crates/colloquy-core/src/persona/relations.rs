//! Initial relationship values between personas.

use rand::Rng;

use colloquy_types::config::RelationshipConfig;
use colloquy_types::persona::{Archetype, Species};

use super::agent::Persona;

const HUMAN_WARMTH: f64 = 0.05;

/// Starting opinion `from` holds of `to`.
///
/// Machiavellians start hostile; everyone else near neutral. Species
/// affinity, distrust of goblins and human warmth shift the result.
pub fn initial_relationship<R: Rng>(
    from: &Persona,
    to: &Persona,
    config: &RelationshipConfig,
    rng: &mut R,
) -> f64 {
    let base = if from.archetype == Archetype::Machiavellian {
        rng.gen_range(-0.8..=-0.5)
    } else {
        rng.gen_range(-0.1..=0.1)
    };
    let mut shift = from.species.relation_to(to.species);
    if to.species == Species::Goblin && from.species != Species::Goblin {
        shift += config.goblin_distrust;
    }
    if from.species == Species::Human {
        shift += HUMAN_WARMTH;
    }
    round2((round2(base) + shift).clamp(-1.0, 1.0))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Seed every directed edge of a freshly created group.
pub fn seed_relationships<R: Rng>(
    personas: &mut [Persona],
    config: &RelationshipConfig,
    rng: &mut R,
) {
    for i in 0..personas.len() {
        for j in 0..personas.len() {
            if i == j {
                continue;
            }
            let value = initial_relationship(&personas[i], &personas[j], config, rng);
            let other = personas[j].id.clone();
            personas[i].set_relationship(other, value);
        }
    }
}

/// Seed both directions between a newcomer and the existing group.
pub fn connect_newcomer<R: Rng>(
    newcomer: &mut Persona,
    group: &mut [Persona],
    config: &RelationshipConfig,
    rng: &mut R,
) {
    for existing in group.iter_mut() {
        let outgoing = initial_relationship(newcomer, existing, config, rng);
        newcomer.set_relationship(existing.id.clone(), outgoing);
        let incoming = initial_relationship(existing, newcomer, config, rng);
        existing.set_relationship(newcomer.id.clone(), incoming);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::config::MemoryConfig;
    use colloquy_types::persona::{Demographics, PersonaId, PersonaProfile};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn persona(id: &str, species: Species, archetype: Archetype) -> Persona {
        let profile = PersonaProfile {
            name: id.to_string(),
            species,
            archetype,
            demographics: Demographics::default(),
            traits: None,
        };
        let mut rng = StdRng::seed_from_u64(1);
        Persona::new(PersonaId::new(id), &profile, MemoryConfig::default(), &mut rng)
    }

    #[test]
    fn machiavellian_starts_hostile() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = RelationshipConfig::default();
        let villain = persona("a", Species::Human, Archetype::Machiavellian);
        let friend = persona("b", Species::Human, Archetype::Altruist);
        for _ in 0..20 {
            let v = initial_relationship(&villain, &friend, &config, &mut rng);
            assert!((-0.65..=-0.35).contains(&v), "{v}");
        }
    }

    #[test]
    fn goblins_are_distrusted() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = RelationshipConfig::default();
        let dwarf = persona("a", Species::Dwarf, Archetype::Stoic);
        let goblin = persona("b", Species::Goblin, Archetype::Stoic);
        for _ in 0..20 {
            let v = initial_relationship(&dwarf, &goblin, &config, &mut rng);
            assert!((-0.5..=-0.3).contains(&v), "{v}");
        }
    }

    #[test]
    fn seeding_covers_every_directed_pair() {
        let mut rng = StdRng::seed_from_u64(2);
        let config = RelationshipConfig::default();
        let mut group = vec![
            persona("a", Species::Human, Archetype::Stoic),
            persona("b", Species::Elf, Archetype::Rebel),
            persona("c", Species::Orc, Archetype::Altruist),
        ];
        seed_relationships(&mut group, &config, &mut rng);
        for p in &group {
            assert_eq!(p.relationships().len(), 2);
            assert!(!p.relationships().contains_key(&p.id));
        }

        let mut newcomer = persona("d", Species::Goblin, Archetype::Stoic);
        connect_newcomer(&mut newcomer, &mut group, &config, &mut rng);
        assert_eq!(newcomer.relationships().len(), 3);
        assert!(group.iter().all(|p| p.relationships().contains_key(&newcomer.id)));
    }
}
