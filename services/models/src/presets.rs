//! Static animation preset table.
//!
//! Each preset is a named bag of heterogeneous parameters (axis, speed,
//! height, frequency, ...) plus a description. The table is built once on
//! first use and never mutated.

use crate::error::{ModelError, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

/// A named, fixed set of animation parameters
#[derive(Debug, Clone, Serialize)]
pub struct AnimationPreset {
    pub name: &'static str,
    pub parameters: Map<String, Value>,
    pub description: &'static str,
}

impl AnimationPreset {
    fn new(name: &'static str, parameters: Value, description: &'static str) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            name,
            parameters,
            description,
        }
    }

    /// Parameters as sent to clients, with the description folded in
    pub fn wire_parameters(&self) -> Map<String, Value> {
        let mut parameters = self.parameters.clone();
        parameters.insert(
            "description".to_string(),
            Value::String(self.description.to_string()),
        );
        parameters
    }
}

/// Lookup table of all presets, in declaration order
pub struct PresetTable {
    presets: Vec<AnimationPreset>,
    index: HashMap<&'static str, usize>,
}

impl PresetTable {
    fn build() -> Self {
        let preset = AnimationPreset::new;
        #[rustfmt::skip]
        let presets = vec![
            preset("rotate", json!({"axis": "y", "speed": 1.0}), "Smooth Y-axis rotation"),
            preset("spin", json!({"axis": "y", "speed": 3.0}), "Fast 360° spinning"),
            preset("bounce", json!({"height": 0.5, "frequency": 3}), "Vertical bouncing"),
            preset("float", json!({"height": 0.2, "frequency": 1.5}), "Gentle hovering"),
            preset("pulse", json!({"scale": 0.1, "frequency": 3}), "Breathing scale effect"),
            preset("wave", json!({"amplitude": 0.3, "frequency": 2}), "Oscillating motion"),
            preset("shake", json!({"amplitude": 0.05, "frequency": 20}), "Quick vibration"),
            preset("swing", json!({"angle": 0.5, "frequency": 2}), "Pendulum motion"),
            preset("jump", json!({"height": 0.8, "squash": 0.1}), "Jump with squash/stretch"),
            preset("dance", json!({"complexity": "high"}), "Fun dance moves"),
            preset("wobble", json!({"x_angle": 0.2, "z_angle": 0.2}), "Unstable wobbling"),
            preset("roll", json!({"axis": "x", "speed": 2}), "X-axis rotation"),
            preset("flip", json!({"axis": "x", "bounce": true}), "Flip with bounce"),
            preset("breathe", json!({"scale": 0.05, "frequency": 1.5}), "Subtle breathing"),
            preset("walk", json!({"step_height": 0.1, "sway": 0.1}), "Walking motion"),
        ];

        let index = presets
            .iter()
            .enumerate()
            .map(|(i, preset)| (preset.name, i))
            .collect();

        Self { presets, index }
    }

    /// Look up a preset by name
    pub fn resolve(&self, name: &str) -> Result<&AnimationPreset> {
        self.index
            .get(name)
            .map(|&i| &self.presets[i])
            .ok_or_else(|| ModelError::UnknownAnimation {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Preset names in table order
    pub fn names(&self) -> Vec<&'static str> {
        self.presets.iter().map(|p| p.name).collect()
    }
}

/// The process-wide preset table
pub fn presets() -> &'static PresetTable {
    static TABLE: OnceLock<PresetTable> = OnceLock::new();
    TABLE.get_or_init(PresetTable::build)
}
