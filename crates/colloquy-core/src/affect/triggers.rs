//! Ordered keyword table for world events.
//!
//! The first category whose keywords appear in the (lowercased) event text
//! decides the base mood deltas. Order matters: "found a strange crate" is
//! a positive event, not a mystery.

/// Category of a world event as seen by the affect model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Danger,
    Positive,
    Resource,
    Mystery,
    Loss,
    Sickness,
}

impl EventCategory {
    /// Categories that leave lasting trauma and shift the baseline.
    pub fn is_traumatic(&self) -> bool {
        matches!(
            self,
            EventCategory::Danger | EventCategory::Loss | EventCategory::Sickness
        )
    }

    /// Categories that enforce a fear/stress floor.
    pub fn is_threat(&self) -> bool {
        matches!(self, EventCategory::Danger | EventCategory::Sickness)
    }
}

/// Unscaled mood deltas fired by a category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseEffects {
    pub happiness: f64,
    pub energy: f64,
    pub stress: f64,
    pub anger: f64,
    pub fear: f64,
}

pub struct EventTrigger {
    pub category: EventCategory,
    pub keywords: &'static [&'static str],
    pub effects: BaseEffects,
}

pub static EVENT_TRIGGERS: &[EventTrigger] = &[
    EventTrigger {
        category: EventCategory::Danger,
        keywords: &[
            "danger", "predator", "snake", "zombie", "attack", "storm", "meteor", "bandit",
            "enemy", "explosion", "threat", "wolves", "shark", "hurricane", "collapse",
        ],
        effects: BaseEffects {
            happiness: -0.40,
            energy: 0.20,
            stress: 0.50,
            anger: 0.10,
            fear: 0.60,
        },
    },
    EventTrigger {
        category: EventCategory::Positive,
        keywords: &[
            "rescue", "found", "treasure", "success", "feast", "celebrat", "sunny", "gift",
            "good news", "reunion", "fresh water",
        ],
        effects: BaseEffects {
            happiness: 0.50,
            energy: 0.20,
            stress: -0.30,
            anger: -0.10,
            fear: -0.20,
        },
    },
    EventTrigger {
        category: EventCategory::Resource,
        keywords: &[
            "supplies", "resources", "crate", "ration", "tools", "fuel", "coconut", "fruit",
            "food",
        ],
        effects: BaseEffects {
            happiness: 0.20,
            energy: 0.10,
            stress: -0.10,
            anger: 0.05,
            fear: 0.0,
        },
    },
    EventTrigger {
        category: EventCategory::Mystery,
        keywords: &[
            "strange", "mysterious", "unknown", "stranger", "signal", "noise", "shadow", "glow",
            "appeared", "whisper",
        ],
        effects: BaseEffects {
            happiness: 0.0,
            energy: 0.15,
            stress: 0.20,
            anger: 0.0,
            fear: 0.25,
        },
    },
    EventTrigger {
        category: EventCategory::Loss,
        keywords: &[
            "lost", "broken", "destroyed", "stolen", "washed away", "died", "death", "ruined",
            "spoiled",
        ],
        effects: BaseEffects {
            happiness: -0.50,
            energy: -0.20,
            stress: 0.30,
            anger: 0.20,
            fear: 0.10,
        },
    },
    EventTrigger {
        category: EventCategory::Sickness,
        keywords: &[
            "sick", "fever", "poison", "injur", "wound", "infect", "disease", "bleeding",
        ],
        effects: BaseEffects {
            happiness: -0.30,
            energy: -0.30,
            stress: 0.35,
            anger: 0.0,
            fear: 0.30,
        },
    },
];

/// First trigger matching `text` (case-insensitive), if any.
pub fn classify(text: &str) -> Option<&'static EventTrigger> {
    let lower = text.to_lowercase();
    EVENT_TRIGGERS
        .iter()
        .find(|t| t.keywords.iter().any(|kw| lower.contains(kw)))
}
