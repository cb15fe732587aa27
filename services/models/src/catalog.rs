//! Grouped animation listing shown to clients.
//!
//! Kept as its own literal next to the preset table: entries here carry an
//! icon and a short label that the presets don't have. Both must name the
//! same fifteen animations.

use serde::Serialize;

/// One entry in the grouped listing
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

/// Animations grouped as motion, effects and special
#[derive(Debug, Clone, Serialize)]
pub struct AnimationCatalog {
    pub motion: &'static [CatalogEntry],
    pub effects: &'static [CatalogEntry],
    pub special: &'static [CatalogEntry],
}

const fn entry(name: &'static str, icon: &'static str, description: &'static str) -> CatalogEntry {
    CatalogEntry {
        name,
        icon,
        description,
    }
}

static MOTION: [CatalogEntry; 6] = [
    entry("rotate", "sync-alt", "Smooth rotation"),
    entry("spin", "redo", "Fast spinning"),
    entry("bounce", "arrow-up", "Bouncing"),
    entry("float", "feather", "Hovering"),
    entry("jump", "arrow-up", "Jumping"),
    entry("walk", "walking", "Walking"),
];

static EFFECTS: [CatalogEntry; 6] = [
    entry("pulse", "heartbeat", "Pulsing"),
    entry("wave", "water", "Waving"),
    entry("shake", "hand-paper", "Shaking"),
    entry("swing", "bezier-curve", "Swinging"),
    entry("wobble", "random", "Wobbling"),
    entry("breathe", "lungs", "Breathing"),
];

static SPECIAL: [CatalogEntry; 3] = [
    entry("dance", "music", "Dancing"),
    entry("roll", "sync", "Rolling"),
    entry("flip", "retweet", "Flipping"),
];

/// The full grouped listing; static, independent of any registry state
pub fn list_all() -> AnimationCatalog {
    AnimationCatalog {
        motion: &MOTION,
        effects: &EFFECTS,
        special: &SPECIAL,
    }
}

impl AnimationCatalog {
    /// Every entry across the three groups
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.motion
            .iter()
            .chain(self.effects.iter())
            .chain(self.special.iter())
    }
}
