//! Mood state owned by a persona.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait-derived resting point each mood scalar decays toward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodBaseline {
    pub happiness: f64,
    pub energy: f64,
    pub stress: f64,
    pub anger: f64,
    pub fear: f64,
}

/// Five bounded scalars plus baseline and accumulated trauma.
///
/// Happiness is in [-1, 1]; every other scalar is in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub happiness: f64,
    pub energy: f64,
    pub stress: f64,
    pub anger: f64,
    pub fear: f64,
    pub baseline: MoodBaseline,
    pub trauma: f64,
}

impl Mood {
    /// Clamp every scalar into its documented range.
    pub fn clamp(&mut self) {
        self.happiness = self.happiness.clamp(-1.0, 1.0);
        self.energy = self.energy.clamp(0.0, 1.0);
        self.stress = self.stress.clamp(0.0, 1.0);
        self.anger = self.anger.clamp(0.0, 1.0);
        self.fear = self.fear.clamp(0.0, 1.0);
        self.trauma = self.trauma.clamp(0.0, 1.0);
    }

    pub fn is_within_bounds(&self) -> bool {
        (-1.0..=1.0).contains(&self.happiness)
            && (0.0..=1.0).contains(&self.energy)
            && (0.0..=1.0).contains(&self.stress)
            && (0.0..=1.0).contains(&self.anger)
            && (0.0..=1.0).contains(&self.fear)
            && (0.0..=1.0).contains(&self.trauma)
    }

    /// L1 distance of the current state from its baseline.
    pub fn distance_to_baseline(&self) -> f64 {
        (self.happiness - self.baseline.happiness).abs()
            + (self.energy - self.baseline.energy).abs()
            + (self.stress - self.baseline.stress).abs()
            + (self.anger - self.baseline.anger).abs()
            + (self.fear - self.baseline.fear).abs()
    }
}

/// Dominant emotion label derived from a mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Anxiety,
    Fatigue,
    Enthusiasm,
    Irritation,
    Determination,
    Interest,
    Neutral,
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Anxiety => "anxiety",
            Emotion::Fatigue => "fatigue",
            Emotion::Enthusiasm => "enthusiasm",
            Emotion::Irritation => "irritation",
            Emotion::Determination => "determination",
            Emotion::Interest => "interest",
            Emotion::Neutral => "neutral",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Mood {
        Mood {
            happiness: 1.7,
            energy: -0.2,
            stress: 0.5,
            anger: 1.2,
            fear: 0.1,
            baseline: MoodBaseline {
                happiness: 0.0,
                energy: 0.5,
                stress: 0.2,
                anger: 0.0,
                fear: 0.0,
            },
            trauma: 0.0,
        }
    }

    #[test]
    fn test_clamp_restores_bounds() {
        let mut mood = sample();
        assert!(!mood.is_within_bounds());
        mood.clamp();
        assert!(mood.is_within_bounds());
        assert_eq!(mood.happiness, 1.0);
        assert_eq!(mood.energy, 0.0);
        assert_eq!(mood.anger, 1.0);
    }

    #[test]
    fn test_emotion_display() {
        assert_eq!(Emotion::Determination.to_string(), "determination");
        assert_eq!(Emotion::Neutral.to_string(), "neutral");
    }
}
