//! The user preferences store (`preferences.json`).
//!
//! Loading never fails: a missing or corrupt file yields the defaults, the
//! same way the desktop front end always started with a usable store. Each
//! known key is decoded on its own, so one mistyped value only resets that
//! key. Keys this version does not know are kept and written back on save.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

/// Recognised preference keys, in display order.
pub const KNOWN_KEYS: &[&str] = &["autoplay", "api_port", "output_dir", "ui_lang", "debug"];

/// User preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Play generated audio as soon as a task finishes.
    pub autoplay: bool,
    /// Port of the local HTTP façade.
    pub api_port: u16,
    /// Directory generated files are written under.
    pub output_dir: PathBuf,
    /// UI locale code.
    pub ui_lang: String,
    /// Enable debug logging.
    pub debug: bool,
    /// Keys written by other versions, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            autoplay: true,
            api_port: 8000,
            output_dir: PathBuf::from("outputs"),
            ui_lang: "en".to_string(),
            debug: false,
            extra: serde_json::Map::new(),
        }
    }
}

impl Preferences {
    /// Load preferences from `path`, falling back to defaults.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => {
                debug!(path = %path.display(), "preferences not found, using defaults");
                Self::default()
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable preferences");
                Self::default()
            },
        }
    }

    /// Load preferences from `path`, reporting errors instead of hiding them.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid store.
    pub fn try_load(path: &Path) -> ConfigResult<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: path.display().to_string(),
                    source: e,
                });
            },
        };
        let map: Map<String, Value> =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(Some(Self::from_map(map, path)))
    }

    /// Decode known keys one by one; the rest go to `extra`.
    fn from_map(mut map: Map<String, Value>, path: &Path) -> Self {
        let defaults = Self::default();
        Self {
            autoplay: take_field(&mut map, "autoplay", defaults.autoplay, path),
            api_port: take_field(&mut map, "api_port", defaults.api_port, path),
            output_dir: take_field(&mut map, "output_dir", defaults.output_dir, path),
            ui_lang: take_field(&mut map, "ui_lang", defaults.ui_lang, path),
            debug: take_field(&mut map, "debug", defaults.debug, path),
            extra: map,
        }
    }

    /// Write the store to `path` as pretty JSON, creating the parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |e| ConfigError::WriteError {
            path: path.display().to_string(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(write_err)?;
        debug!(path = %path.display(), "saved preferences");
        Ok(())
    }

    /// Set a recognised key from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an unknown key or a value
    /// that does not parse as the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let invalid = |message: String| ConfigError::ValidationError {
            field: key.to_string(),
            message,
        };
        match key {
            "autoplay" => {
                self.autoplay = parse_bool(value).ok_or_else(|| invalid(bool_msg(value)))?;
            },
            "debug" => {
                self.debug = parse_bool(value).ok_or_else(|| invalid(bool_msg(value)))?;
            },
            "api_port" => {
                self.api_port = value
                    .parse()
                    .map_err(|_| invalid(format!("expected a port number, got '{value}'")))?;
            },
            "output_dir" => {
                if value.trim().is_empty() {
                    return Err(invalid("output directory must not be empty".to_string()));
                }
                self.output_dir = PathBuf::from(value);
            },
            "ui_lang" => {
                let is_locale = !value.is_empty()
                    && value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if !is_locale {
                    return Err(invalid(format!("expected a locale code, got '{value}'")));
                }
                self.ui_lang = value.to_string();
            },
            _ => {
                return Err(invalid(format!(
                    "unknown preference; expected one of: {}",
                    KNOWN_KEYS.join(", ")
                )));
            },
        }
        Ok(())
    }
}

fn take_field<T: DeserializeOwned>(
    map: &mut Map<String, Value>,
    key: &str,
    default: T,
    path: &Path,
) -> T {
    let Some(value) = map.remove(key) else {
        return default;
    };
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(path = %path.display(), key, error = %e, "ignoring invalid preference");
        default
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn bool_msg(value: &str) -> String {
    format!("expected true or false, got '{value}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load(&dir.path().join("preferences.json"));
        assert_eq!(prefs, Preferences::default());
        assert!(prefs.autoplay);
        assert_eq!(prefs.api_port, 8000);
        assert_eq!(prefs.output_dir, PathBuf::from("outputs"));
        assert_eq!(prefs.ui_lang, "en");
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Preferences::load(&path), Preferences::default());
        assert!(Preferences::try_load(&path).is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, r#"{"autoplay": false, "output_dir": "/tmp/out"}"#).unwrap();
        let prefs = Preferences::load(&path);
        assert!(!prefs.autoplay);
        assert_eq!(prefs.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(prefs.api_port, 8000);
    }

    #[test]
    fn test_mistyped_key_only_resets_that_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(
            &path,
            r#"{"output_dir": "/data/tts", "theme": "dark", "api_port": "8000", "debug": 70000}"#,
        )
        .unwrap();

        let mut prefs = Preferences::load(&path);
        assert_eq!(prefs.output_dir, PathBuf::from("/data/tts"));
        assert_eq!(prefs.api_port, 8000);
        assert!(!prefs.debug);
        assert_eq!(prefs.extra["theme"], "dark");
        assert!(!prefs.extra.contains_key("api_port"));

        prefs.set("autoplay", "false").unwrap();
        prefs.save(&path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["output_dir"], "/data/tts");
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["api_port"], 8000);
        assert_eq!(raw["autoplay"], false);
    }

    #[test]
    fn test_out_of_range_port_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, r#"{"api_port": 70000, "ui_lang": "de"}"#).unwrap();
        let prefs = Preferences::try_load(&path).unwrap().unwrap();
        assert_eq!(prefs.api_port, 8000);
        assert_eq!(prefs.ui_lang, "de");
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"theme": "dark", "debug": true}"#).unwrap();

        let mut prefs = Preferences::load(&path);
        assert!(prefs.debug);
        prefs.set("api_port", "9001").unwrap();
        prefs.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["api_port"], 9001);
    }

    #[test]
    fn test_set_validates() {
        let mut prefs = Preferences::default();
        prefs.set("autoplay", "off").unwrap();
        assert!(!prefs.autoplay);
        prefs.set("ui_lang", "fr").unwrap();
        assert_eq!(prefs.ui_lang, "fr");

        assert!(matches!(
            prefs.set("api_port", "http"),
            Err(ConfigError::ValidationError { .. })
        ));
        assert!(prefs.set("autoplay", "maybe").is_err());
        assert!(prefs.set("volume", "11").is_err());
        assert!(prefs.set("output_dir", "  ").is_err());
    }
}
