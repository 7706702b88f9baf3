//! Configuration management for the tag broker.
//!
//! This module handles loading and saving configuration from disk,
//! including the scan capability floor and driver timeouts.

use std::{
   env, fs,
   path::{Path, PathBuf},
   time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, Result};

/// Main configuration structure for the broker.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
   /// Lowest platform capability level at which scanning is attempted.
   #[serde(default = "default_min_platform_level")]
   pub min_platform_level: u32,

   #[serde(default = "default_connect_timeout")]
   pub connect_timeout_ms: u64,

   #[serde(default = "default_operation_timeout")]
   pub operation_timeout_ms: u64,

   #[serde(default = "default_channel_capacity")]
   pub channel_capacity: usize,
}

const fn default_min_platform_level() -> u32 {
   19
}

const fn default_connect_timeout() -> u64 {
   5000
}

const fn default_operation_timeout() -> u64 {
   5000
}

const fn default_channel_capacity() -> usize {
   256
}

impl Default for Config {
   fn default() -> Self {
      Self {
         min_platform_level: default_min_platform_level(),
         connect_timeout_ms: default_connect_timeout(),
         operation_timeout_ms: default_operation_timeout(),
         channel_capacity: default_channel_capacity(),
      }
   }
}

impl Config {
   /// Loads configuration from disk or creates default if not exists.
   pub fn load() -> Result<Self> {
      Self::load_from(&Self::config_path()?)
   }

   /// Saves the current configuration to disk.
   pub fn save(&self) -> Result<()> {
      self.save_to(&Self::config_path()?)
   }

   pub fn load_from(path: &Path) -> Result<Self> {
      if path.exists() {
         let contents = fs::read_to_string(path)?;
         Ok(toml::from_str(&contents)?)
      } else {
         let config = Self::default();
         config.save_to(path)?;
         Ok(config)
      }
   }

   pub fn save_to(&self, path: &Path) -> Result<()> {
      if let Some(parent) = path.parent() {
         fs::create_dir_all(parent)?;
      }

      let contents = toml::to_string_pretty(self)?;
      fs::write(path, contents)?;

      Ok(())
   }

   fn config_path() -> Result<PathBuf> {
      let config_dir = if let Ok(broker_home) = env::var("NFC_BROKER_HOME") {
         PathBuf::from(broker_home)
      } else if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
         PathBuf::from(config_home)
      } else if let Some(dir) = dirs::config_dir() {
         dir
      } else {
         return Err(BrokerError::ConfigDirNotFound);
      };

      Ok(config_dir.join("nfc-broker").join("config.toml"))
   }

   pub const fn connect_timeout(&self) -> Duration {
      Duration::from_millis(self.connect_timeout_ms)
   }

   pub const fn operation_timeout(&self) -> Duration {
      Duration::from_millis(self.operation_timeout_ms)
   }
}
