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

//! Error types for the link, dispatch and host adapters.

use thiserror::Error;

/// Errors raised while opening the serial link.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Bluetooth adapter is disabled")]
    AdapterDisabled,

    #[error("No paired device named '{0}'")]
    PeerNotFound(String),

    #[error("Permission denied for serial connections")]
    PermissionDenied,

    #[error("Connection failed: {0}")]
    ConnectFailed(String),
}

impl From<bluer::Error> for ConnectError {
    fn from(err: bluer::Error) -> Self {
        use bluer::ErrorKind;

        match err.kind {
            ErrorKind::NotReady => ConnectError::AdapterDisabled,
            ErrorKind::NotAuthorized | ErrorKind::NotPermitted => ConnectError::PermissionDenied,
            _ => ConnectError::ConnectFailed(err.to_string()),
        }
    }
}

impl From<std::io::Error> for ConnectError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ConnectError::PermissionDenied,
            _ => ConnectError::ConnectFailed(err.to_string()),
        }
    }
}

/// Error raised by a chunk read on an open link.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Read error: {0}")]
pub struct ReadError(pub String);

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        ReadError(err.to_string())
    }
}

/// Message transport failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("SMS send failed: {0}")]
    SendFailed(String),
}

/// Location lookup failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Location request timed out")]
    Timeout,
}
