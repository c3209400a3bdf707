//! Persisted settings consumed by the output session.
//!
//! The file holds two values: which output mode is selected and which port
//! was last connected. `SessionConfig` is an immutable snapshot; callers
//! compare snapshots by value to decide whether the session must be rebuilt.

use crate::connection::PortDescriptor;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "vkeys.toml";

const OUTPUT_MODE_KEY: &str = "output_mode";
const LEGACY_OUTPUT_KEY: &str = "midi_output";

/// Where performance events go. Only `System` is served by the MIDI session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    #[default]
    System,
    Network,
    InternalSynth,
}

impl OutputMode {
    fn as_str(&self) -> &'static str {
        match self {
            OutputMode::System => "system",
            OutputMode::Network => "network",
            OutputMode::InternalSynth => "internal-synth",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(OutputMode::System),
            "network" => Some(OutputMode::Network),
            "internal-synth" => Some(OutputMode::InternalSynth),
            _ => None,
        }
    }

    /// Old files stored the mode as its index
    fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(OutputMode::System),
            1 => Some(OutputMode::Network),
            2 => Some(OutputMode::InternalSynth),
            _ => None,
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the last selected port, as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPort {
    pub device: String,
    pub port: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub output_mode: OutputMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_port: Option<StoredPort>,
}

impl SessionConfig {
    /// Load from a TOML file. A missing file gives the default config.
    /// Never rewrites the file; see [`migrate_legacy_file`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml: &str) -> Result<Self> {
        toml::from_str(toml).context("Failed to parse TOML configuration")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize configuration to TOML")
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = self.to_toml()?;
        fs::write(path.as_ref(), contents)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    pub fn routes_through_system(&self) -> bool {
        self.output_mode == OutputMode::System
    }

    pub fn with_last_port(&self, port: Option<&PortDescriptor>) -> Self {
        Self {
            output_mode: self.output_mode,
            last_port: port.map(|p| StoredPort {
                device: p.device().to_string(),
                port: p.port(),
            }),
        }
    }
}

/// One-time upgrade of an old settings table.
///
/// An `output_mode` that is not one of the named modes is replaced: numeric
/// values map by index, anything else falls back to the legacy boolean
/// `midi_output` (`true` means internal synth, `false` network) or to internal
/// synth when that is absent too. The legacy key is always removed. Returns
/// whether the table changed.
///
/// A table with neither key is left untouched and loads as `system`. Older
/// releases treated that case as internal synth; a settings file without any
/// output setting is now read as a fresh install instead.
pub fn migrate_legacy(table: &mut toml::Table) -> bool {
    let legacy = table.remove(LEGACY_OUTPUT_KEY);

    let current = table.get(OUTPUT_MODE_KEY);
    let valid = matches!(current, Some(toml::Value::String(s)) if OutputMode::parse(s).is_some());
    if valid {
        return legacy.is_some();
    }
    if current.is_none() && legacy.is_none() {
        return false;
    }

    let by_index = match current {
        Some(toml::Value::Integer(i)) => OutputMode::from_index(*i),
        Some(toml::Value::String(s)) => s.trim().parse::<i64>().ok().and_then(OutputMode::from_index),
        _ => None,
    };

    let mode = by_index.unwrap_or(match legacy {
        Some(toml::Value::Boolean(false)) => OutputMode::Network,
        _ => OutputMode::InternalSynth,
    });

    table.insert(
        OUTPUT_MODE_KEY.to_string(),
        toml::Value::String(mode.as_str().to_string()),
    );
    true
}

/// Runs [`migrate_legacy`] on a settings file and rewrites it if needed.
pub fn migrate_legacy_file<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let mut table: toml::Table = contents
        .parse()
        .context("Failed to parse TOML configuration")?;

    if !migrate_legacy(&mut table) {
        return Ok(false);
    }

    let rewritten = toml::to_string(&table).context("Failed to serialize migrated configuration")?;
    fs::write(path, rewritten)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    info!(path = ?path, "migrated legacy output mode setting");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DeviceId;
    use tempfile::TempDir;

    fn table(src: &str) -> toml::Table {
        src.parse().unwrap()
    }

    #[test]
    fn test_parse_full_config() {
        let config = SessionConfig::from_toml(
            r#"
output_mode = "system"

[last_port]
device = "USB Keys"
port = 1
"#,
        )
        .unwrap();

        assert_eq!(config.output_mode, OutputMode::System);
        assert_eq!(
            config.last_port,
            Some(StoredPort { device: "USB Keys".into(), port: 1 })
        );
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::from_toml("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert!(config.routes_through_system());
    }

    #[test]
    fn test_invalid_mode_is_a_load_error() {
        assert!(SessionConfig::from_toml("output_mode = \"7\"").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vkeys.toml");

        let port = crate::connection::PortDescriptor::new(DeviceId::new("synth"), 0, "Synth [0]".into());
        let config = SessionConfig::default().with_last_port(Some(&port));
        config.save(&path).unwrap();

        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_ne!(loaded, SessionConfig::default());
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_migrate_numeric_mode() {
        let mut t = table("output_mode = \"1\"");
        assert!(migrate_legacy(&mut t));
        assert_eq!(t["output_mode"].as_str(), Some("network"));

        let mut t = table("output_mode = 0");
        assert!(migrate_legacy(&mut t));
        assert_eq!(t["output_mode"].as_str(), Some("system"));
    }

    #[test]
    fn test_migrate_from_legacy_boolean() {
        let mut t = table("output_mode = \"bogus\"\nmidi_output = false");
        assert!(migrate_legacy(&mut t));
        assert_eq!(t["output_mode"].as_str(), Some("network"));
        assert!(!t.contains_key("midi_output"));

        let mut t = table("midi_output = true");
        assert!(migrate_legacy(&mut t));
        assert_eq!(t["output_mode"].as_str(), Some("internal-synth"));

        let mut t = table("output_mode = \"9\"");
        assert!(migrate_legacy(&mut t));
        assert_eq!(t["output_mode"].as_str(), Some("internal-synth"));
    }

    #[test]
    fn test_migrate_leaves_valid_config_alone() {
        let mut t = table("output_mode = \"system\"");
        assert!(!migrate_legacy(&mut t));

        let mut t = table("[last_port]\ndevice = \"x\"\nport = 0");
        assert!(!migrate_legacy(&mut t));
    }

    #[test]
    fn test_table_without_output_keys_stays_system() {
        let mut t = table("");
        assert!(!migrate_legacy(&mut t));
        assert!(t.is_empty());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vkeys.toml");
        fs::write(&path, "[last_port]\ndevice = \"x\"\nport = 1\n").unwrap();
        assert!(!migrate_legacy_file(&path).unwrap());

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.output_mode, OutputMode::System);
        assert!(config.routes_through_system());
    }

    #[test]
    fn test_migrate_file_rewrites_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vkeys.toml");
        fs::write(&path, "output_mode = \"2\"\nmidi_output = true\n").unwrap();

        assert!(migrate_legacy_file(&path).unwrap());
        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.output_mode, OutputMode::InternalSynth);

        assert!(!migrate_legacy_file(&path).unwrap());
        assert!(!migrate_legacy_file(dir.path().join("none.toml")).unwrap());
    }
}
