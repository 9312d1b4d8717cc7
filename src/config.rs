use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buffer::MAX_BUFFER_LENGTH;
use crate::errors::ConfigError;
use crate::keys::KeyBinding;
use crate::Result;

pub const APP_DIR_NAME: &str = "slashkey";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STORE_FILE_NAME: &str = "snippets.toml";
pub const DEFAULT_TOAST_MS: u64 = 1000;

/// Engine settings, read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Key that expands the trigger before the caret.
    pub expansion_key: KeyBinding,
    /// Key that reverts the last expansion.
    pub undo_key: KeyBinding,
    /// How many trailing characters of a rich-edit region are remembered.
    pub buffer_capacity: usize,
    pub toast_duration_ms: u64,
    /// Drop a lookup result when the field changed while it was pending.
    pub fence_stale_expansions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            expansion_key: KeyBinding::tab(),
            undo_key: KeyBinding::ctrl_z(),
            buffer_capacity: MAX_BUFFER_LENGTH,
            toast_duration_ms: DEFAULT_TOAST_MS,
            fence_stale_expansions: true,
        }
    }
}

impl Settings {
    pub fn parse(input: &str) -> std::result::Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Validation("buffer_capacity must be at least 1".into()));
        }
        if self.expansion_key == self.undo_key {
            return Err(ConfigError::Validation(format!(
                "expansion_key and undo_key are both '{}'",
                self.expansion_key
            )));
        }
        Ok(())
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }
}

fn app_dir(base: Option<PathBuf>) -> std::result::Result<PathBuf, ConfigError> {
    Ok(base.ok_or(ConfigError::HomeDirectoryNotFound)?.join(APP_DIR_NAME))
}

pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = app_dir(dirs::config_dir())?;
    let config_file = config_dir.join(CONFIG_FILE_NAME);

    if config_file.exists() {
        return Ok(config_file);
    }

    fs::create_dir_all(&config_dir).map_err(|e| ConfigError::CreateConfigDir { source: e })?;
    create_default_config(&config_file)?;
    Ok(config_file)
}

/// Location of the snippet file; the file itself is created by the store.
pub fn get_store_path() -> Result<PathBuf> {
    Ok(app_dir(dirs::data_dir())?.join(STORE_FILE_NAME))
}

pub fn create_default_config(path: &Path) -> Result<()> {
    fs::write(path, DEFAULT_CONFIG).map_err(|e| ConfigError::WriteDefaultConfig { source: e })?;
    info!("Wrote default configuration to {:?}", path);
    Ok(())
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadConfig { path: path.to_path_buf(), source: e })?;
    let settings = Settings::parse(&contents)?;
    debug!(?settings, "Loaded settings from {:?}", path);
    Ok(settings)
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_config_path()?)
}

const DEFAULT_CONFIG: &str = r#"# slashkey configuration
#
# Type a trigger such as /demo in any text field and press the expansion key
# to replace it with the saved snippet. Manage snippets with `slashkey add`.

# key that expands the trigger before the caret
expansion_key = "Tab"

# key that puts the trigger back right after an expansion
undo_key = "Ctrl+z"

# characters remembered per rich-text editor when its caret cannot be read
buffer_capacity = 200

# how long the "Expanded '/demo'" notice stays on screen
toast_duration_ms = 1000

# ignore a lookup result if the field changed while it was pending
fence_stale_expansions = true
"#;
