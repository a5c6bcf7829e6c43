//! Debounce delays and the optional `~/.fieldcal/autosave.json` overrides.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use fieldcal_store::paths;

use crate::error::{io_err, AutosaveError};

pub const DRAFT_AUTOSAVE_DELAY: Duration = Duration::from_secs(5);
pub const SETTINGS_AUTOSAVE_DELAY: Duration = Duration::from_secs(2);

/// Repeated filesystem events for one file inside this window are collapsed.
pub const WATCH_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

pub const CONFIG_FILE: &str = "autosave.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub draft_delay: Duration,
    pub settings_delay: Duration,
    /// Home whose settings document is watched for edits made by other
    /// processes. `None` disables the watcher.
    pub watch_home: Option<PathBuf>,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            draft_delay: DRAFT_AUTOSAVE_DELAY,
            settings_delay: SETTINGS_AUTOSAVE_DELAY,
            watch_home: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    draft_delay_ms: Option<u64>,
    settings_delay_ms: Option<u64>,
    #[serde(default)]
    watch_settings: bool,
}

impl AutosaveConfig {
    pub fn config_path_at(home: &Path) -> PathBuf {
        paths::root_at(home).join(CONFIG_FILE)
    }

    /// Defaults overlaid with `~/.fieldcal/autosave.json` when it exists.
    pub fn load_at(home: &Path) -> Result<Self, AutosaveError> {
        let path = Self::config_path_at(home);
        let file: ConfigFile = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => ConfigFile::default(),
            Err(e) => return Err(io_err(path, e)),
        };

        let mut config = Self::default();
        if let Some(ms) = file.draft_delay_ms {
            config.draft_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.settings_delay_ms {
            config.settings_delay = Duration::from_millis(ms);
        }
        if file.watch_settings {
            config.watch_home = Some(home.to_path_buf());
        }
        Ok(config)
    }

    pub fn watching(mut self, home: impl Into<PathBuf>) -> Self {
        self.watch_home = Some(home.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let home = TempDir::new().expect("home");
        assert_eq!(AutosaveConfig::load_at(home.path()).unwrap(), AutosaveConfig::default());
    }

    #[test]
    fn file_overrides_delays() {
        let home = TempDir::new().expect("home");
        let path = AutosaveConfig::config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"draftDelayMs": 750, "watchSettings": true}"#).unwrap();

        let config = AutosaveConfig::load_at(home.path()).unwrap();
        assert_eq!(config.draft_delay, Duration::from_millis(750));
        assert_eq!(config.settings_delay, SETTINGS_AUTOSAVE_DELAY);
        assert_eq!(config.watch_home.as_deref(), Some(home.path()));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let home = TempDir::new().expect("home");
        let path = AutosaveConfig::config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"draftDelay": 1}"#).unwrap();
        assert!(matches!(AutosaveConfig::load_at(home.path()), Err(AutosaveError::Json(_))));
    }
}
