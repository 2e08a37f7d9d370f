//! Application-level configuration loading, including the puzzle event catalog.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CUBE_ROOMS_BACK_CONFIG_PATH";

/// Scramble parameters for one puzzle discipline.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EventConfig {
    /// Human readable label (e.g. "3x3x3").
    pub label: String,
    /// Cube dimension; drives whether wide moves appear in scrambles.
    pub cube_size: u8,
    /// Number of moves in a generated scramble.
    pub scramble_moves: usize,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    events: IndexMap<String, EventConfig>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the baked-in event catalog.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        count = app_config.events.len(),
                        "loaded puzzle event catalog from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Scramble parameters for `event`, or `None` when the discipline is not in the catalog.
    pub fn event(&self, event: &str) -> Option<&EventConfig> {
        self.events.get(event)
    }

    /// Whether `event` names a supported puzzle discipline.
    pub fn supports_event(&self, event: &str) -> bool {
        self.events.contains_key(event)
    }

    /// The full event catalog in declaration order.
    pub fn events(&self) -> &IndexMap<String, EventConfig> {
        &self.events
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut events = IndexMap::new();
        events.insert(
            "222".to_owned(),
            EventConfig {
                label: "2x2x2".to_owned(),
                cube_size: 2,
                scramble_moves: 11,
            },
        );
        events.insert(
            "333".to_owned(),
            EventConfig {
                label: "3x3x3".to_owned(),
                cube_size: 3,
                scramble_moves: 20,
            },
        );
        events.insert(
            "444".to_owned(),
            EventConfig {
                label: "4x4x4".to_owned(),
                cube_size: 4,
                scramble_moves: 44,
            },
        );
        events.insert(
            "555".to_owned(),
            EventConfig {
                label: "5x5x5".to_owned(),
                cube_size: 5,
                scramble_moves: 60,
            },
        );
        Self { events }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    events: IndexMap<String, EventConfig>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        if raw.events.is_empty() {
            warn!("config declares no events; using built-in defaults");
            return Self::default();
        }
        Self { events: raw.events }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_contains_standard_cubes() {
        let config = AppConfig::default();
        assert!(config.supports_event("333"));
        assert!(config.supports_event("222"));
        assert!(!config.supports_event("999"));
        assert_eq!(config.event("333").unwrap().scramble_moves, 20);
    }

    #[test]
    fn empty_event_catalog_falls_back_to_defaults() {
        let raw = RawConfig {
            events: IndexMap::new(),
        };
        let config: AppConfig = raw.into();
        assert!(config.supports_event("333"));
    }
}
