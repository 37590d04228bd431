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

//! Connectivity status publishing.
//!
//! The publisher owns the only copy of the current status. Subscribers get a
//! [`watch::Receiver`], so they always see the latest value and never a
//! backlog; one that attaches late still reads the current value at once.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::platform::{Capability, NotificationSink, PermissionOracle};

/// Title of the status notification.
pub const NOTIFICATION_TITLE: &str = "Bluetooth SMS Bridge";

/// Connectivity as seen by the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityStatus {
    Disconnected,
    Connected,
}

impl ConnectivityStatus {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            ConnectivityStatus::Connected
        } else {
            ConnectivityStatus::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectivityStatus::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityStatus::Disconnected => "Disconnected",
            ConnectivityStatus::Connected => "Connected",
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            ConnectivityStatus::Disconnected => "network-offline",
            ConnectivityStatus::Connected => "network-transmit-receive",
        }
    }

    /// Body of the status notification.
    pub fn notification_text(&self) -> &'static str {
        match self {
            ConnectivityStatus::Disconnected => "Bluetooth status: trying to connect...",
            ConnectivityStatus::Connected => "Bluetooth status: connected",
        }
    }
}

/// Wire form of a status change on the internal channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub event: String,
    pub is_connected: bool,
}

impl From<ConnectivityStatus> for StatusEvent {
    fn from(status: ConnectivityStatus) -> Self {
        Self {
            event: "connectionStatus".to_string(),
            is_connected: status.is_connected(),
        }
    }
}

impl StatusEvent {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Broadcast point for connectivity changes.
pub struct StatusPublisher {
    status_tx: watch::Sender<ConnectivityStatus>,
    publish_lock: Mutex<()>,
    sink: Arc<dyn NotificationSink>,
    permissions: Arc<dyn PermissionOracle>,
}

impl StatusPublisher {
    pub fn new(sink: Arc<dyn NotificationSink>, permissions: Arc<dyn PermissionOracle>) -> Arc<Self> {
        let (status_tx, _) = watch::channel(ConnectivityStatus::Disconnected);
        Arc::new(Self {
            status_tx,
            publish_lock: Mutex::new(()),
            sink,
            permissions,
        })
    }

    /// Store `status`, wake subscribers and refresh the notification.
    pub fn publish(&self, status: ConnectivityStatus) {
        let _guard = self.publish_lock.lock();

        self.status_tx.send_replace(status);
        debug!("Status published: {}", status.as_str());

        if self.permissions.has(Capability::PostNotification) {
            self.sink.upsert(NOTIFICATION_TITLE, status.notification_text());
        } else {
            debug!("Notification skipped: post-notification not held");
        }
    }

    /// Last published status.
    pub fn current_status(&self) -> ConnectivityStatus {
        *self.status_tx.borrow()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status_tx.subscribe()
    }
}
