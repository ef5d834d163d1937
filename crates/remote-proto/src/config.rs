use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ui: UiSettings,
}

/// Where the controlled application listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the remote control API, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Timing knobs of the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    /// Poll the server continuously.  When false, status is only refreshed
    /// after commands.
    #[serde(default = "default_true")]
    pub update_poll: bool,
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Animate at frame rate; otherwise tick every `animation_delay_ms`.
    #[serde(default = "default_true")]
    pub use_animation_frame: bool,
    #[serde(default = "default_animation_delay_ms")]
    pub animation_delay_ms: u64,
    /// Quiet period after the last edit before it is sent.
    #[serde(default = "default_edit_update_delay_ms")]
    pub edit_update_delay_ms: u64,
    /// A request must be in flight this long before the busy spinner shows.
    #[serde(default = "default_spinner_delay_ms")]
    pub spinner_delay_ms: u64,
}

/// Frame period used when `use_animation_frame` is set.
pub const ANIMATION_FRAME: Duration = Duration::from_millis(40);

impl UiSettings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn edit_update_delay(&self) -> Duration {
        Duration::from_millis(self.edit_update_delay_ms)
    }

    pub fn spinner_delay(&self) -> Duration {
        Duration::from_millis(self.spinner_delay_ms)
    }

    pub fn animation_period(&self) -> Duration {
        if self.use_animation_frame {
            ANIMATION_FRAME
        } else {
            Duration::from_millis(self.animation_delay_ms.max(1))
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            update_poll: true,
            update_interval_ms: default_update_interval_ms(),
            use_animation_frame: true,
            animation_delay_ms: default_animation_delay_ms(),
            edit_update_delay_ms: default_edit_update_delay_ms(),
            spinner_delay_ms: default_spinner_delay_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_update_interval_ms() -> u64 {
    1000
}

fn default_animation_delay_ms() -> u64 {
    500
}

fn default_edit_update_delay_ms() -> u64 {
    500
}

fn default_spinner_delay_ms() -> u64 {
    100
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.ui.update_poll);
        assert_eq!(config.ui.update_interval(), Duration::from_secs(1));
        assert_eq!(config.ui.edit_update_delay(), Duration::from_millis(500));
        assert_eq!(config.ui.spinner_delay(), Duration::from_millis(100));
        assert!(config.server.base_url.starts_with("http://"));
    }

    #[test]
    fn test_animation_period() {
        let mut ui = UiSettings::default();
        assert_eq!(ui.animation_period(), ANIMATION_FRAME);
        ui.use_animation_frame = false;
        assert_eq!(ui.animation_period(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            base_url = "http://10.0.0.5:8090"

            [ui]
            update_poll = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.base_url, "http://10.0.0.5:8090");
        assert_eq!(config.server.request_timeout_ms, 10_000);
        assert!(!config.ui.update_poll);
        assert_eq!(config.ui.edit_update_delay_ms, 500);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.ui.update_interval_ms, 1000);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.server.base_url, config.server.base_url);
    }
}
