use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Auto-hold instances in declaration order.
    #[serde(default, rename = "auto_hold")]
    pub auto_holds: Vec<AutoHoldEntry>,
    /// Keymap layers, layer 0 first.
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Used by instances that do not set their own `timeout_ms`.
    #[serde(default = "GeneralConfig::default_timeout")]
    pub default_timeout_ms: u64,
    #[serde(default = "GeneralConfig::default_max_instances")]
    pub max_instances: usize,
}

impl GeneralConfig {
    fn default_timeout() -> u64 { 200 }
    fn default_max_instances() -> usize { 8 }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 200,
            max_instances: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoHoldEntry {
    /// Name keymap bindings use to refer to this instance (`&name ...`).
    pub name: String,
    /// Wrapped action, e.g. `"&mo 1"` or `"&kp LEFTSHIFT"`.
    pub bindings: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl AutoHoldEntry {
    pub fn timeout_ms(&self, general: &GeneralConfig) -> u64 {
        self.timeout_ms.unwrap_or(general.default_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LayerConfig {
    #[serde(default)]
    pub name: String,
    /// Key name to binding, e.g. `CAPSLOCK = "&ah_nav 1"`.
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("autohold")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "parsing config TOML")
    }

    /// Number of keymap layers; there is always at least the base layer.
    pub fn layer_count(&self) -> usize {
        self.layers.len().max(1)
    }
}

pub fn socket_path() -> PathBuf {
    // AUTOHOLD_SOCK overrides for testing.
    if let Ok(path) = std::env::var("AUTOHOLD_SOCK") {
        return PathBuf::from(path);
    }
    PathBuf::from("/run/autohold/autohold.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- defaults ---

    #[test]
    fn default_timeout_is_200ms() {
        let config = Config::default();
        assert_eq!(config.general.default_timeout_ms, 200);
    }

    #[test]
    fn default_max_instances_is_8() {
        let config = Config::default();
        assert_eq!(config.general.max_instances, 8);
    }

    #[test]
    fn default_has_base_layer_only() {
        let config = Config::default();
        assert!(config.auto_holds.is_empty());
        assert_eq!(config.layer_count(), 1);
    }

    // --- TOML parsing ---

    #[test]
    fn parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.general.default_timeout_ms, 200);
        assert!(config.layers.is_empty());
    }

    #[test]
    fn parse_auto_hold_instances_in_order() {
        let toml = r#"
[general]
default_timeout_ms = 300

[[auto_hold]]
name = "ah_nav"
bindings = "&mo"
timeout_ms = 150

[[auto_hold]]
name = "ah_shift"
bindings = "&kp LEFTSHIFT"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let names: Vec<&str> = config.auto_holds.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["ah_nav", "ah_shift"]);
        assert_eq!(config.auto_holds[0].timeout_ms(&config.general), 150);
        assert_eq!(config.auto_holds[1].timeout_ms(&config.general), 300);
        assert_eq!(config.auto_holds[1].bindings, "&kp LEFTSHIFT");
    }

    #[test]
    fn parse_layers() {
        let toml = r#"
[[layer]]
name = "base"
[layer.bindings]
CAPSLOCK = "&ah_nav 1"

[[layer]]
name = "nav"
[layer.bindings]
H = "&kp LEFT"
L = "&kp RIGHT"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.layer_count(), 2);
        assert_eq!(config.layers[0].bindings["CAPSLOCK"], "&ah_nav 1");
        assert_eq!(config.layers[1].name, "nav");
        assert_eq!(config.layers[1].bindings.len(), 2);
    }

    #[test]
    fn auto_hold_without_bindings_is_an_error() {
        let toml = r#"
[[auto_hold]]
name = "broken"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn load_from_missing_file_fails_with_context() {
        let err = Config::load_from(Path::new("/nonexistent/autohold.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("reading config"));
    }

    // --- socket path ---

    #[test]
    fn socket_path_ends_with_autohold_sock() {
        let path = socket_path();
        assert_eq!(path.file_name().unwrap(), "autohold.sock");
    }
}
