use serde::{Deserialize, Serialize};

use crate::CONFY_APP_NAME;

/// Paths for the two model slots. Positional CLI arguments override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSettings {
    pub model_a: String,
    pub model_b: String,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            model_a: "models/reap_the_whirlwind.glb".to_string(),
            model_b: "models/reap_the_whirlwind.glb".to_string(),
        }
    }
}

impl SceneSettings {
    pub fn load() -> Self {
        confy::load(CONFY_APP_NAME, "scene").unwrap_or_default()
    }

    pub fn save(&self) {
        let _ = confy::store(CONFY_APP_NAME, "scene", self);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    pub show_animation_panel: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            show_animation_panel: true,
        }
    }
}

impl UiSettings {
    pub fn load() -> Self {
        confy::load(CONFY_APP_NAME, "ui").unwrap_or_default()
    }

    pub fn save(&self) {
        let _ = confy::store(CONFY_APP_NAME, "ui", self);
    }
}

pub struct Settings {
    pub scene: SceneSettings,
    pub ui: UiSettings,
}

impl Settings {
    pub fn load() -> Self {
        Self {
            scene: SceneSettings::load(),
            ui: UiSettings::load(),
        }
    }
}
