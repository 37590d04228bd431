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

//! Location providers.

use async_trait::async_trait;
use tracing::debug;

use super::modem::Mmcli;
use crate::config::{LocationBackend, LocationConfig, SmsConfig};
use crate::error::LocationError;

/// A position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Accuracy requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    High,
}

/// Source of the device's current position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Get one fix. Callers bound the wait themselves.
    async fn current_location(&self, accuracy: Accuracy) -> Result<Location, LocationError>;
}

/// Create the provider selected in the config.
pub fn create_provider(config: &LocationConfig, sms: &SmsConfig) -> Box<dyn LocationProvider> {
    match config.backend {
        LocationBackend::Mmcli => Box::new(ModemLocation::new(Mmcli::new(&sms.modem))),
        LocationBackend::Fixed => Box::new(FixedLocation(Location {
            latitude: config.latitude,
            longitude: config.longitude,
        })),
        LocationBackend::None => Box::new(NoLocation),
    }
}

/// GPS fix from the modem through ModemManager.
pub struct ModemLocation {
    mmcli: Mmcli,
}

impl ModemLocation {
    pub fn new(mmcli: Mmcli) -> Self {
        Self { mmcli }
    }
}

#[async_trait]
impl LocationProvider for ModemLocation {
    async fn current_location(&self, accuracy: Accuracy) -> Result<Location, LocationError> {
        debug!("Requesting modem location ({:?})", accuracy);

        match self.mmcli.location().await {
            Ok(Some((latitude, longitude))) => Ok(Location {
                latitude,
                longitude,
            }),
            Ok(None) => Err(LocationError::LocationUnavailable("no GPS fix".to_string())),
            Err(e) => Err(LocationError::LocationUnavailable(e.to_string())),
        }
    }
}

/// Fixed position for stationary installations.
pub struct FixedLocation(pub Location);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self, _accuracy: Accuracy) -> Result<Location, LocationError> {
        Ok(self.0)
    }
}

/// No position source.
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_location(&self, _accuracy: Accuracy) -> Result<Location, LocationError> {
        Err(LocationError::LocationUnavailable(
            "no location backend configured".to_string(),
        ))
    }
}
