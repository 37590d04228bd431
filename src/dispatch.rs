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

//! Alert composition and dispatch.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bluetooth::TriggerEvent;
use crate::config::AlertConfig;
use crate::error::{LocationError, SendError};
use crate::platform::{
    split_message, Accuracy, Capability, ConfigurationStore, Location, LocationProvider,
    MessageTransport, PermissionOracle,
};

/// Sent when no location could be attached.
pub const FALLBACK_MESSAGE: &str = "Emergency. Location unavailable.";

/// Sent by the test command.
pub const TEST_MESSAGE: &str = "This is a test message from Bluetooth SMS Bridge.";

/// Build the alert text for a known position.
pub fn compose_alert(location: Location) -> String {
    let Location {
        latitude,
        longitude,
    } = location;
    let map_link = format!("https://maps.google.com/?q={},{}", latitude, longitude);

    format!(
        "[Emergency alert]\n\
         I need help.\n\
         \n\
         Current location:\n\
         Latitude: {latitude}\n\
         Longitude: {longitude}\n\
         \n\
         Google Maps link:\n\
         {map_link}\n\
         \n\
         This message was sent automatically.\n\
         Please get in touch as soon as possible."
    )
}

/// What a single dispatch ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// No destination number saved.
    Unconfigured,
    /// A required capability is missing.
    NotPermitted,
    /// Handed to the transport.
    Sent { parts: usize, with_location: bool },
    /// The transport refused.
    Failed(SendError),
}

/// Turns triggers into SMS alerts.
pub struct AlertDispatcher {
    number_rx: watch::Receiver<String>,
    permissions: Arc<dyn PermissionOracle>,
    transport: Arc<dyn MessageTransport>,
    location: Arc<dyn LocationProvider>,
    location_enabled: bool,
    location_timeout: Duration,
}

impl AlertDispatcher {
    /// Create a new dispatcher.
    pub fn new(
        store: &dyn ConfigurationStore,
        permissions: Arc<dyn PermissionOracle>,
        transport: Arc<dyn MessageTransport>,
        location: Arc<dyn LocationProvider>,
        alert: &AlertConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            number_rx: store.subscribe(),
            permissions,
            transport,
            location,
            location_enabled: alert.location_enabled,
            location_timeout: alert.location_timeout(),
        })
    }

    /// Start a dispatch in the background and return immediately.
    pub fn fire(self: &Arc<Self>, _event: TriggerEvent) -> JoinHandle<DispatchOutcome> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.dispatch().await })
    }

    /// Run one dispatch to completion.
    pub async fn dispatch(&self) -> DispatchOutcome {
        let destination = self.number_rx.borrow().clone();
        if destination.is_empty() {
            info!("Trigger ignored: no destination number saved");
            return DispatchOutcome::Unconfigured;
        }

        if let Some(missing) = self.missing_capability() {
            warn!("Trigger ignored: {} not held", missing.as_str());
            return DispatchOutcome::NotPermitted;
        }

        let (message, with_location) = match self.locate().await {
            Some(location) => (compose_alert(location), true),
            None => (FALLBACK_MESSAGE.to_string(), false),
        };

        let parts = split_message(&message);
        debug!("Sending alert in {} part(s)", parts.len());

        match self.transport.send_message(&destination, &parts).await {
            Ok(()) => {
                info!(
                    "Alert sent via {} ({} part(s), location: {})",
                    self.transport.backend_name(),
                    parts.len(),
                    with_location
                );
                DispatchOutcome::Sent {
                    parts: parts.len(),
                    with_location,
                }
            }
            Err(e) => {
                error!("Failed to send alert: {}", e);
                DispatchOutcome::Failed(e)
            }
        }
    }

    /// Send the fixed test message to the saved number.
    pub async fn send_test(&self) -> Result<()> {
        let destination = self.number_rx.borrow().clone();
        if destination.is_empty() {
            return Err(anyhow!("Save a phone number first"));
        }
        if !self.permissions.has(Capability::MessageSend) {
            return Err(anyhow!(
                "{} is required",
                Capability::MessageSend.as_str()
            ));
        }

        let parts = split_message(TEST_MESSAGE);
        self.transport.send_message(&destination, &parts).await?;
        info!("Test message sent");
        Ok(())
    }

    /// First required capability that is not held.
    fn missing_capability(&self) -> Option<Capability> {
        let required: &[Capability] = if self.location_enabled {
            &[
                Capability::MessageSend,
                Capability::FineLocation,
                Capability::BackgroundLocation,
            ]
        } else {
            &[Capability::MessageSend]
        };

        required
            .iter()
            .copied()
            .find(|capability| !self.permissions.has(*capability))
    }

    async fn locate(&self) -> Option<Location> {
        if !self.location_enabled {
            return None;
        }

        let request = self.location.current_location(Accuracy::High);
        let result = match tokio::time::timeout(self.location_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        };

        match result {
            Ok(location) => Some(location),
            Err(e) => {
                warn!("Sending alert without location: {}", e);
                None
            }
        }
    }
}
