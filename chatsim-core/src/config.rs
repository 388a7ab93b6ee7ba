// Playback configuration
// Timing constants and editor limits, loadable from a TOML file

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Delay for steps that do not set one
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,
    /// How long a manual step shows the typing indicator
    #[serde(default = "default_typing_flash_ms")]
    pub typing_flash_ms: u64,
    /// Hold on the step-forward guard after a button batch, absorbs double clicks
    #[serde(default = "default_step_grace_ms")]
    pub step_grace_ms: u64,
    #[serde(default = "default_max_buttons_per_step")]
    pub max_buttons_per_step: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_delay_ms(),
            typing_flash_ms: default_typing_flash_ms(),
            step_grace_ms: default_step_grace_ms(),
            max_buttons_per_step: default_max_buttons_per_step(),
        }
    }
}

impl PlaybackConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn typing_flash(&self) -> Duration {
        Duration::from_millis(self.typing_flash_ms)
    }

    pub fn step_grace(&self) -> Duration {
        Duration::from_millis(self.step_grace_ms)
    }
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_typing_flash_ms() -> u64 {
    200
}

fn default_step_grace_ms() -> u64 {
    300
}

fn default_max_buttons_per_step() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg = PlaybackConfig::from_toml("default_delay_ms = 250\n").unwrap();
        assert_eq!(cfg.default_delay_ms, 250);
        assert_eq!(cfg.typing_flash_ms, 200);
        assert_eq!(cfg.max_buttons_per_step, 5);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = PlaybackConfig::from_toml("speed = 2\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "step_grace_ms = 50")?;
        let cfg = PlaybackConfig::load(file.path())?;
        assert_eq!(cfg.step_grace(), Duration::from_millis(50));
        Ok(())
    }
}
