//! Core configuration for virtual-anim-core.

use serde::{Deserialize, Serialize};

/// Configuration for engine defaults and sizing.
/// Keep this minimal; expand as needed without breaking API.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Playback rate assigned to newly created sessions.
    pub default_playback_rate: f32,
    /// Initial capacity hint for the engine's scratch pose buffer.
    pub scratch_bones: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_playback_rate: 1.0,
            scratch_bones: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "default_playback_rate": 0.5 }"#).unwrap();
        assert_eq!(cfg.default_playback_rate, 0.5);
        assert_eq!(cfg.scratch_bones, Config::default().scratch_bones);
    }
}
