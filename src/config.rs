// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::bluetooth::{READ_BUFFER_SIZE, SPP_UUID};
use crate::platform::PermissionConfig;

const APP_DIR: &str = "btsms-bridge";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for preferences.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Serial peer settings.
    pub bluetooth: BluetoothConfig,

    /// Reconnect policy.
    pub reconnect: ReconnectConfig,

    /// Alert composition.
    pub alert: AlertConfig,

    /// SMS backend.
    pub sms: SmsConfig,

    /// Location backend.
    pub location: LocationConfig,

    /// Capabilities granted to the bridge.
    pub permissions: PermissionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Name of the paired serial peer.
    pub peer_name: String,

    /// Service UUID of the serial port profile.
    pub service_uuid: Uuid,

    /// Fixed RFCOMM channel; resolved through SDP when unset.
    pub channel: Option<u8>,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Read buffer size in bytes.
    pub read_buffer_size: usize,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            peer_name: "HC-06".to_string(),
            service_uuid: SPP_UUID,
            channel: None,
            connect_timeout_secs: 15,
            read_buffer_size: READ_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before reconnecting after a disconnect, in seconds.
    pub delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { delay_secs: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Attach the current location to alerts.
    pub location_enabled: bool,

    /// How long to wait for a location fix, in seconds.
    pub location_timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            location_enabled: true,
            location_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsBackend {
    Mmcli,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Backend: "mmcli" or "log".
    pub backend: SmsBackend,

    /// ModemManager modem selector.
    pub modem: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            backend: SmsBackend::Mmcli,
            modem: "any".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationBackend {
    Mmcli,
    Fixed,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Backend: "mmcli", "fixed" or "none".
    pub backend: LocationBackend,

    /// Latitude for the fixed backend.
    pub latitude: f64,

    /// Longitude for the fixed backend.
    pub longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            backend: LocationBackend::Mmcli,
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl ReconnectConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl AlertConfig {
    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }
}

impl BluetoothConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default location or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `config_path`, writing defaults if missing.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(config_path, content)?;
            config
        };

        // Created on first use by the preference store
        config.data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Ok(config)
    }
}
