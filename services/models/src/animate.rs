use crate::error::Result;
use crate::presets::PresetTable;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Body of an animate request; every field is optional
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AnimateRequest {
    /// Echoed back as-is; not checked against the registry
    #[serde(default)]
    pub model_id: Option<String>,
    /// Preset name
    #[serde(default = "default_animation")]
    pub animation: String,
    /// Playback speed multiplier
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Duration in seconds
    #[serde(default = "default_duration")]
    pub duration: f64,
}

fn default_animation() -> String {
    "rotate".to_string()
}

fn default_speed() -> f64 {
    1.0
}

fn default_duration() -> f64 {
    5.0
}

impl Default for AnimateRequest {
    fn default() -> Self {
        Self {
            model_id: None,
            animation: default_animation(),
            speed: default_speed(),
            duration: default_duration(),
        }
    }
}

/// Resolved animation settings
#[derive(Debug, Clone, Serialize)]
pub struct AppliedAnimation {
    #[serde(rename = "type")]
    pub animation_type: String,
    pub parameters: Map<String, Value>,
    pub speed: f64,
    pub duration: f64,
    pub model_id: Option<String>,
}

/// Animate response
#[derive(Debug, Clone, Serialize)]
pub struct AnimationResult {
    pub success: bool,
    pub animation: AppliedAnimation,
    pub message: String,
}

/// Resolve the requested preset and merge in the caller's settings
pub fn animate(presets: &PresetTable, request: AnimateRequest) -> Result<AnimationResult> {
    let preset = presets.resolve(&request.animation)?;

    debug!(
        animation = %preset.name,
        model_id = ?request.model_id,
        speed = request.speed,
        duration = request.duration,
        "Animation resolved"
    );

    Ok(AnimationResult {
        success: true,
        message: format!(
            "Animation '{}' applied: {}",
            preset.name, preset.description
        ),
        animation: AppliedAnimation {
            animation_type: preset.name.to_string(),
            parameters: preset.wire_parameters(),
            speed: request.speed,
            duration: request.duration,
            model_id: request.model_id,
        },
    })
}
