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

//! Serial link to the paired peer.
//!
//! [`SerialLink`] opens one stream at a time and never retries; retrying is
//! the supervisor's job. [`RfcommLink`] is the BlueZ implementation.

use async_trait::async_trait;
use bluer::rfcomm::{Profile, ProfileHandle, Role, SocketAddr, Stream};
use bluer::{Adapter, Address, Device, Session};
use futures::StreamExt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConnectError, ReadError};

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Default read buffer size.
pub const READ_BUFFER_SIZE: usize = 1024;

/// An open byte stream to the peer.
#[async_trait]
pub trait LinkStream: Send {
    /// Read the next chunk into `buf`.
    ///
    /// `Ok(0)` means the peer closed the stream cleanly.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ReadError>;

    /// Close the stream. Pending reads on it fail.
    async fn close(&mut self);
}

/// Opens streams to a named peer.
#[async_trait]
pub trait SerialLink: Send + Sync {
    /// Whether the local radio is powered.
    async fn adapter_enabled(&self) -> bool;

    /// Open a stream to the paired peer called `peer_name`.
    async fn open(
        &self,
        peer_name: &str,
        service_id: Uuid,
    ) -> Result<Box<dyn LinkStream>, ConnectError>;
}

/// A paired Bluetooth device.
#[derive(Debug, Clone)]
pub struct PairedDevice {
    pub address: Address,
    pub name: String,
}

/// RFCOMM stream plus the profile registration that produced it.
///
/// The profile stays registered for as long as the stream lives.
pub struct RfcommStream {
    stream: Stream,
    _profile: Option<ProfileHandle>,
}

#[async_trait]
impl LinkStream for RfcommStream {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        Ok(self.stream.read(buf).await?)
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("RFCOMM shutdown: {}", e);
        }
    }
}

/// BlueZ-backed serial link.
pub struct RfcommLink {
    session: Session,
    channel: Option<u8>,
    connect_timeout: Duration,
}

impl RfcommLink {
    /// Create a new link bound to a BlueZ session.
    ///
    /// With `channel` set, the RFCOMM socket is connected directly on that
    /// channel. Otherwise an RFCOMM client profile is registered for the
    /// service UUID and BlueZ resolves the channel through SDP.
    pub async fn new(channel: Option<u8>, connect_timeout: Duration) -> anyhow::Result<Self> {
        let session = Session::new().await?;
        info!("BlueZ session created");

        Ok(Self {
            session,
            channel,
            connect_timeout,
        })
    }

    /// Paired devices on the default adapter.
    pub async fn list_paired_devices(&self) -> bluer::Result<Vec<PairedDevice>> {
        let adapter = self.session.default_adapter().await?;
        self.paired_devices(&adapter).await
    }

    async fn paired_devices(&self, adapter: &Adapter) -> bluer::Result<Vec<PairedDevice>> {
        let mut devices = Vec::new();

        for addr in adapter.device_addresses().await? {
            let device = adapter.device(addr)?;
            if device.is_paired().await? {
                let name = match device.name().await? {
                    Some(name) => name,
                    None => device.alias().await.unwrap_or_else(|_| addr.to_string()),
                };
                devices.push(PairedDevice {
                    address: addr,
                    name,
                });
            }
        }

        Ok(devices)
    }

    async fn find_peer(&self, adapter: &Adapter, peer_name: &str) -> Result<Device, ConnectError> {
        let devices = self.paired_devices(adapter).await?;

        match devices.iter().find(|d| d.name == peer_name) {
            Some(peer) => {
                debug!("Found paired peer {} at {}", peer.name, peer.address);
                Ok(adapter.device(peer.address)?)
            }
            None => {
                let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
                warn!("No paired device named '{}' (paired: {:?})", peer_name, names);
                Err(ConnectError::PeerNotFound(peer_name.to_string()))
            }
        }
    }

    async fn connect_channel(&self, address: Address, channel: u8) -> Result<RfcommStream, ConnectError> {
        debug!("Connecting RFCOMM {} channel {}", address, channel);
        let stream = Stream::connect(SocketAddr::new(address, channel)).await?;

        Ok(RfcommStream {
            stream,
            _profile: None,
        })
    }

    async fn connect_profile(&self, device: &Device, service_id: Uuid) -> Result<RfcommStream, ConnectError> {
        let profile = Profile {
            uuid: service_id,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };

        let mut handle = self.session.register_profile(profile).await?;
        debug!("Registered RFCOMM client profile {}", service_id);

        let connect = device.connect_profile(&service_id);
        tokio::pin!(connect);
        let mut connect_returned = false;

        loop {
            tokio::select! {
                res = &mut connect, if !connect_returned => {
                    connect_returned = true;
                    res?;
                }
                req = handle.next() => {
                    let req = req.ok_or_else(|| {
                        ConnectError::ConnectFailed("profile unregistered".to_string())
                    })?;
                    debug!("Profile connection from {}", req.device());
                    let stream = req.accept()?;
                    return Ok(RfcommStream {
                        stream,
                        _profile: Some(handle),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl SerialLink for RfcommLink {
    async fn adapter_enabled(&self) -> bool {
        match self.session.default_adapter().await {
            Ok(adapter) => adapter.is_powered().await.unwrap_or(false),
            Err(e) => {
                warn!("No Bluetooth adapter: {}", e);
                false
            }
        }
    }

    async fn open(
        &self,
        peer_name: &str,
        service_id: Uuid,
    ) -> Result<Box<dyn LinkStream>, ConnectError> {
        let adapter = self
            .session
            .default_adapter()
            .await
            .map_err(|_| ConnectError::AdapterDisabled)?;

        if !adapter.is_powered().await? {
            return Err(ConnectError::AdapterDisabled);
        }

        let device = self.find_peer(&adapter, peer_name).await?;
        let address = device.address();

        let attempt = async {
            match self.channel {
                Some(channel) => self.connect_channel(address, channel).await,
                None => self.connect_profile(&device, service_id).await,
            }
        };

        let stream = tokio::time::timeout(self.connect_timeout, attempt)
            .await
            .map_err(|_| {
                ConnectError::ConnectFailed(format!(
                    "timed out after {}s",
                    self.connect_timeout.as_secs()
                ))
            })??;

        info!("RFCOMM link open to {} ({})", peer_name, address);
        Ok(Box::new(stream))
    }
}
