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

//! Capability checks.
//!
//! The bridge only ever asks whether a capability is held; acquiring one is
//! somebody else's business.

use serde::{Deserialize, Serialize};

/// Capabilities the bridge checks before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SerialConnect,
    MessageSend,
    FineLocation,
    BackgroundLocation,
    PostNotification,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SerialConnect => "serial_connect",
            Self::MessageSend => "message_send",
            Self::FineLocation => "fine_location",
            Self::BackgroundLocation => "background_location",
            Self::PostNotification => "post_notification",
        }
    }
}

/// Answers whether a capability is currently held.
pub trait PermissionOracle: Send + Sync {
    fn has(&self, capability: Capability) -> bool;
}

/// Capability grants read from the `[permissions]` config table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    pub serial_connect: bool,
    pub message_send: bool,
    pub fine_location: bool,
    pub background_location: bool,
    pub post_notification: bool,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            serial_connect: true,
            message_send: true,
            fine_location: true,
            background_location: true,
            post_notification: true,
        }
    }
}

impl PermissionOracle for PermissionConfig {
    fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::SerialConnect => self.serial_connect,
            Capability::MessageSend => self.message_send,
            Capability::FineLocation => self.fine_location,
            Capability::BackgroundLocation => self.background_location,
            Capability::PostNotification => self.post_notification,
        }
    }
}
