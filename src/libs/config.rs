//! Configuration management for pomogroup.
//!
//! The configuration lives in `config.json` inside the platform data
//! directory (see [`DataStorage`]). It is modular: each optional section can
//! be configured through the interactive `pomogroup init` wizard, and absent
//! sections fall back to their defaults.
//!
//! ## Engine Settings
//!
//! [`EngineConfig`] holds every tunable of the timer engine. All durations
//! are in seconds.
//!
//! | Field | Default | Meaning |
//! |---|---|---|
//! | `max_warnings` | 1 | inactivity warnings before removal |
//! | `loop_wait_cap` | 600 | longest single wait of a timer loop |
//! | `label_update_interval` | 600 | minimum gap between label renames |
//! | `stale_transition_window` | 3600 | transitions further off than this are not announced |
//! | `min_session_duration` | 60 | shorter sessions are not recorded |
//! | `message_history` | 5 | tracked announcement ids per timer |
//! | `pin_failure_threshold` | 5 | status failures before refreshes pause |
//! | `status_budget` | 30 | one status refresh cycle over all channels |
//! | `status_idle_sleep` | 30 | status loop sleep when nothing runs |
//! | `save_interval` | 60 | snapshot period |
//! | `pattern_cache_size` | 1000 | live patterns kept in memory |
//! | `default_pattern` | `50/10` | pattern for timers without their own default |
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use pomogroup::libs::config::Config;
//!
//! let config = Config::read()?;
//! let engine = config.engine.unwrap_or_default();
//! println!("Default pattern: {}", engine.default_pattern);
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::data_storage::DataStorage;
use crate::libs::messages::Message;
use crate::msg_print;
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration module descriptor shown in the setup wizard.
#[derive(Debug, Clone)]
pub struct ConfigModule {
    pub key: String,
    pub name: String,
}

/// Tunables of the timer engine.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub max_warnings: u32,
    pub loop_wait_cap: u64,
    pub label_update_interval: u64,
    pub stale_transition_window: u64,
    pub min_session_duration: u64,
    pub message_history: usize,
    pub pin_failure_threshold: u32,
    pub status_budget: u64,
    pub status_idle_sleep: u64,
    pub save_interval: u64,
    pub pattern_cache_size: usize,
    pub default_pattern: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_warnings: 1,
            loop_wait_cap: 600,
            label_update_interval: 600,
            stale_transition_window: 3600,
            min_session_duration: 60,
            message_history: 5,
            pin_failure_threshold: 5,
            status_budget: 30,
            status_idle_sleep: 30,
            save_interval: 60,
            pattern_cache_size: 1000,
            default_pattern: "50/10".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn module() -> ConfigModule {
        ConfigModule {
            key: "engine".to_string(),
            name: "Timer engine".to_string(),
        }
    }

    /// Interactive setup of the most commonly changed engine settings.
    pub fn init(config: &Option<EngineConfig>) -> Result<EngineConfig> {
        let default = config.clone().unwrap_or_default();
        msg_print!(Message::ConfigModuleEngine);

        Ok(EngineConfig {
            max_warnings: Input::with_theme(&ColorfulTheme::default())
                .with_prompt(Message::PromptMaxWarnings.to_string())
                .default(default.max_warnings)
                .interact_text()?,
            default_pattern: Input::with_theme(&ColorfulTheme::default())
                .with_prompt(Message::PromptDefaultPattern.to_string())
                .default(default.default_pattern.clone())
                .interact_text()?,
            min_session_duration: Input::with_theme(&ColorfulTheme::default())
                .with_prompt(Message::PromptMinSessionDuration.to_string())
                .default(default.min_session_duration)
                .interact_text()?,
            status_budget: Input::with_theme(&ColorfulTheme::default())
                .with_prompt(Message::PromptStatusBudget.to_string())
                .default(default.status_budget)
                .interact_text()?,
            save_interval: Input::with_theme(&ColorfulTheme::default())
                .with_prompt(Message::PromptSaveInterval.to_string())
                .default(default.save_interval)
                .interact_text()?,
            pin_failure_threshold: Input::with_theme(&ColorfulTheme::default())
                .with_prompt(Message::PromptPinFailureThreshold.to_string())
                .default(default.pin_failure_threshold)
                .interact_text()?,
            ..default
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineConfig>,
}

impl Config {
    /// Reads the configuration file, or returns the default configuration
    /// when none has been saved yet.
    pub fn read() -> Result<Config> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        if !config_file_path.exists() {
            return Ok(Config::default());
        }

        let config_str = fs::read_to_string(config_file_path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        let config_file = File::create(config_file_path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        Ok(())
    }

    /// Runs the setup wizard, starting from the saved configuration.
    pub fn init() -> Result<Self> {
        let mut config = Self::read().unwrap_or_default();

        let modules = vec![EngineConfig::module()];
        let selected = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptSelectModules.to_string())
            .items(&modules.iter().map(|module| &module.name).collect::<Vec<_>>())
            .interact()?;

        for &selection in &selected {
            match modules[selection].key.as_str() {
                "engine" => config.engine = Some(EngineConfig::init(&config.engine)?),
                _ => {}
            }
        }

        Ok(config)
    }

    /// Engine settings with defaults applied.
    pub fn engine(&self) -> EngineConfig {
        self.engine.clone().unwrap_or_default()
    }
}
