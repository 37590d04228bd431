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

//! Persisted user preferences.
//!
//! Holds the single `phoneNumber` slot. Other processes (the CLI, an editor)
//! may rewrite the file at any time; [`PreferenceStore::spawn_watch`] picks
//! those edits up and notifies subscribers.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read access to the destination number, with change notification.
pub trait ConfigurationStore: Send + Sync {
    /// Current destination number, empty when unset.
    fn destination_number(&self) -> String;

    /// Receiver that always holds the latest destination number.
    fn subscribe(&self) -> watch::Receiver<String>;
}

/// On-disk preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub phone_number: String,
}

/// JSON-file preference store.
pub struct PreferenceStore {
    path: PathBuf,
    number_tx: watch::Sender<String>,
    modified: Mutex<Option<SystemTime>>,
}

impl PreferenceStore {
    /// Create or open the store in `data_dir`.
    ///
    /// A corrupt file is treated as an unset number.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("prefs.json");
        let prefs = Self::read(&path).unwrap_or_else(|e| {
            warn!(
                "Unreadable preferences at {}, starting without a number: {}",
                path.display(),
                e
            );
            Preferences::default()
        });
        let modified = Self::mtime(&path);

        let (number_tx, _) = watch::channel(prefs.phone_number);

        Ok(Self {
            path,
            number_tx,
            modified: Mutex::new(modified),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save a new destination number.
    pub fn set_destination_number(&self, number: &str) -> Result<()> {
        let number = number.trim();
        if number.is_empty() {
            return Err(anyhow!("Phone number must not be empty"));
        }

        let prefs = Preferences {
            phone_number: number.to_string(),
        };
        let content = serde_json::to_string_pretty(&prefs)?;
        std::fs::write(&self.path, content)?;
        *self.modified.lock() = Self::mtime(&self.path);

        self.update(prefs.phone_number);
        info!("Destination number saved");
        Ok(())
    }

    /// Re-read the file. Returns whether the number changed.
    pub fn reload(&self) -> Result<bool> {
        let prefs = Self::read(&self.path)?;
        *self.modified.lock() = Self::mtime(&self.path);
        Ok(self.update(prefs.phone_number))
    }

    /// Poll the file for external edits every `interval`.
    pub fn spawn_watch(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                let current = Self::mtime(&self.path);
                if current == *self.modified.lock() {
                    continue;
                }

                match self.reload() {
                    Ok(true) => info!("Destination number changed on disk"),
                    Ok(false) => debug!("Preferences touched, number unchanged"),
                    Err(e) => warn!("Failed to reload preferences: {}", e),
                }
            }
        })
    }

    fn update(&self, number: String) -> bool {
        self.number_tx.send_if_modified(|current| {
            if *current == number {
                false
            } else {
                *current = number;
                true
            }
        })
    }

    fn read(path: &Path) -> Result<Preferences> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Preferences::default())
        }
    }

    fn mtime(path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

impl ConfigurationStore for PreferenceStore {
    fn destination_number(&self) -> String {
        self.number_tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<String> {
        self.number_tx.subscribe()
    }
}
