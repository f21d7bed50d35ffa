use std::path::PathBuf;

use homesight_core::quality::DEFAULT_SHARPNESS_FLOOR;
use homesight_core::types::DEFAULT_MATCH_THRESHOLD;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Directory for all persisted state.
    pub data_dir: PathBuf,
    /// Path to the identity gallery document.
    pub gallery_path: PathBuf,
    /// Path to the device registry document.
    pub devices_path: PathBuf,
    /// Path to the per-user gesture overrides document.
    pub prefs_path: PathBuf,
    /// Path to the action-history database.
    pub history_db_path: PathBuf,
    /// Cosine similarity floor for accepting an identity match.
    pub match_threshold: f32,
    /// Laplacian-variance floor for the face quality gate.
    pub sharpness_floor: f32,
    /// Perception backend selector ("stub" until a model backend is wired).
    pub backend: String,
}

impl Config {
    /// Load configuration from `HOMESIGHT_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("HOMESIGHT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("homesight")
            });

        let path_var = |key: &str, default: &str| {
            std::env::var(key)
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join(default))
        };

        Self {
            gallery_path: path_var("HOMESIGHT_GALLERY_PATH", "gallery.json"),
            devices_path: path_var("HOMESIGHT_DEVICES_PATH", "devices.json"),
            prefs_path: path_var("HOMESIGHT_PREFS_PATH", "user_prefs.json"),
            history_db_path: path_var("HOMESIGHT_HISTORY_DB_PATH", "history.db"),
            match_threshold: env_f32("HOMESIGHT_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
            sharpness_floor: env_f32("HOMESIGHT_SHARPNESS_FLOOR", DEFAULT_SHARPNESS_FLOOR),
            backend: std::env::var("HOMESIGHT_BACKEND").unwrap_or_else(|_| "stub".to_string()),
            data_dir,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
