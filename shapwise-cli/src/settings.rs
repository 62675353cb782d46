//! Layered loading of explainer settings.
//!
//! Uses `figment`: defaults -> user config -> workspace config -> environment.
//! Command-line flags are applied on top by the caller.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use shapwise_core::ShapSettings;

/// File name of the workspace-local settings file.
pub const WORKSPACE_FILE: &str = "shapwise.toml";

/// Settings file under the user's configuration directory, if one can be located.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "shapwise", "shapwise")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load settings from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `SHAPWISE_`, nested with `__`)
/// 2. An explicit file passed with `--config`, else `<workspace>/shapwise.toml`
/// 3. User config (`~/.config/shapwise/config.toml`)
/// 4. Built-in defaults
pub fn load_settings(
    workspace: &Path,
    explicit: Option<&Path>,
) -> Result<ShapSettings, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ShapSettings::default()));

    if let Some(user_config) = user_config_path().filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(user_config));
    }

    match explicit {
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => {
            let ws_config = workspace.join(WORKSPACE_FILE);
            if ws_config.exists() {
                figment = figment.merge(Toml::file(ws_config));
            }
        }
    }

    // SHAPWISE_CONFIDENCE, SHAPWISE_PERTURBATION__SEED, ...
    figment = figment.merge(Env::prefixed("SHAPWISE_").split("__"));

    figment.extract().map_err(Box::new)
}
