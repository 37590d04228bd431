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

//! Connection supervisor.
//!
//! A single task owns the whole lifecycle: connect, read until the link
//! drops, wait, connect again. Because attempts run one after another on
//! that task, there is never more than one attempt in flight and none while
//! connected.
//!
//! ```text
//!   Idle -> Connecting -> Connected -> Disconnected --delay--> Connecting
//!    |                                      ^
//!    +------------- adapter off ------------+
//! ```
//!
//! Every state change is published before the task moves on. A panic inside
//! a cycle is caught and handled as a read error, so the retry still follows.

use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bluetooth::{decode_chunk, LinkStream, SerialLink};
use crate::config::Config;
use crate::dispatch::AlertDispatcher;
use crate::error::ConnectError;
use crate::platform::{Capability, PermissionOracle};
use crate::status::{ConnectivityStatus, StatusPublisher};

/// Why the link is down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    AdapterDisabled,
    PeerNotFound,
    PermissionDenied,
    ConnectFailed(String),
    ReadError(String),
    RemoteClosed,
}

impl DisconnectReason {
    /// Whether a retry is scheduled automatically.
    ///
    /// The rest wait for [`SupervisorHandle::reconnect`].
    pub fn retries(&self) -> bool {
        matches!(
            self,
            DisconnectReason::ConnectFailed(_)
                | DisconnectReason::ReadError(_)
                | DisconnectReason::RemoteClosed
        )
    }
}

impl From<ConnectError> for DisconnectReason {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::AdapterDisabled => DisconnectReason::AdapterDisabled,
            ConnectError::PeerNotFound(_) => DisconnectReason::PeerNotFound,
            ConnectError::PermissionDenied => DisconnectReason::PermissionDenied,
            ConnectError::ConnectFailed(msg) => DisconnectReason::ConnectFailed(msg),
        }
    }
}

/// Supervisor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Connected,
    Disconnected(DisconnectReason),
}

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub peer_name: String,
    pub service_id: Uuid,
    pub read_buffer_size: usize,
    pub reconnect_delay: Duration,
}

impl From<&Config> for SupervisorConfig {
    fn from(config: &Config) -> Self {
        Self {
            peer_name: config.bluetooth.peer_name.clone(),
            service_id: config.bluetooth.service_uuid,
            read_buffer_size: config.bluetooth.read_buffer_size.max(1),
            reconnect_delay: config.reconnect.delay(),
        }
    }
}

#[derive(Debug)]
enum Control {
    Reconnect,
}

/// Result of one connect-and-read cycle.
enum Cycle {
    Down(DisconnectReason),
    Shutdown,
}

/// Owns the serial link and keeps it connected.
pub struct Supervisor {
    link: Arc<dyn SerialLink>,
    dispatcher: Arc<AlertDispatcher>,
    publisher: Arc<StatusPublisher>,
    permissions: Arc<dyn PermissionOracle>,
    config: SupervisorConfig,
    state: Arc<RwLock<LinkState>>,
}

/// Control handle for a running supervisor.
pub struct SupervisorHandle {
    state: Arc<RwLock<LinkState>>,
    control_tx: mpsc::UnboundedSender<Control>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Current supervisor state.
    pub fn state(&self) -> LinkState {
        self.state.read().clone()
    }

    /// Ask for an immediate attempt.
    ///
    /// Only acted on while disconnected; ignored while an attempt is in
    /// flight or the link is up.
    pub fn reconnect(&self) {
        let _ = self.control_tx.send(Control::Reconnect);
    }

    /// Stop the supervisor, closing any open stream. Dispatches already
    /// started are left to finish.
    pub async fn shutdown(self) {
        self.shutdown_tx.send_replace(true);
        if let Err(e) = self.task.await {
            error!("Supervisor task failed: {}", e);
        }
    }
}

impl Supervisor {
    /// Create a new supervisor.
    pub fn new(
        link: Arc<dyn SerialLink>,
        dispatcher: Arc<AlertDispatcher>,
        publisher: Arc<StatusPublisher>,
        permissions: Arc<dyn PermissionOracle>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            link,
            dispatcher,
            publisher,
            permissions,
            config,
            state: Arc::new(RwLock::new(LinkState::Idle)),
        }
    }

    /// Spawn the supervisor task.
    pub fn start(self) -> SupervisorHandle {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(self.run(control_rx, shutdown_rx));

        SupervisorHandle {
            state,
            control_tx,
            shutdown_tx,
            task,
        }
    }

    async fn run(
        self,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!(
            "Supervisor started for peer '{}' ({})",
            self.config.peer_name, self.config.service_id
        );

        loop {
            let cycle = AssertUnwindSafe(self.cycle(&mut control_rx, &mut shutdown_rx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    // The stream was dropped during unwinding, which closes it.
                    let msg = panic_message(panic.as_ref());
                    error!("Link task panicked: {}", msg);
                    self.down(DisconnectReason::ReadError(format!("panic: {}", msg)))
                });

            let reason = match cycle {
                Cycle::Down(reason) => reason,
                Cycle::Shutdown => break,
            };

            let delay = if reason.retries() {
                info!("Reconnecting in {}s", self.config.reconnect_delay.as_secs());
                Some(self.config.reconnect_delay)
            } else {
                warn!("Not retrying ({:?}); waiting for a reconnect request", reason);
                None
            };

            let retry = async {
                match delay {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = wait_shutdown(&mut shutdown_rx) => break,
                Some(Control::Reconnect) = control_rx.recv() => {
                    info!("Reconnect requested");
                }
                _ = retry => {}
            }
        }

        self.transition(LinkState::Idle);
        info!("Supervisor stopped");
    }

    /// One connect attempt, then the read loop if it succeeded.
    async fn cycle(
        &self,
        control_rx: &mut mpsc::UnboundedReceiver<Control>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Cycle {
        if *shutdown_rx.borrow() {
            return Cycle::Shutdown;
        }

        if !self.link.adapter_enabled().await {
            warn!("Bluetooth adapter is disabled");
            return self.down(DisconnectReason::AdapterDisabled);
        }

        if !self.permissions.has(Capability::SerialConnect) {
            warn!("Capability not held: {}", Capability::SerialConnect.as_str());
            return self.down(DisconnectReason::PermissionDenied);
        }

        self.transition(LinkState::Connecting);

        let mut open = self
            .link
            .open(&self.config.peer_name, self.config.service_id);
        let opened = loop {
            tokio::select! {
                biased;
                _ = wait_shutdown(shutdown_rx) => return Cycle::Shutdown,
                opened = &mut open => break opened,
                Some(_) = control_rx.recv() => debug!("Reconnect ignored: attempt in flight"),
            }
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Connect to '{}' failed: {}", self.config.peer_name, e);
                return self.down(e.into());
            }
        };

        self.transition(LinkState::Connected);
        info!("Connected to '{}'", self.config.peer_name);

        let outcome = self.read_loop(stream.as_mut(), control_rx, shutdown_rx).await;
        stream.close().await;

        match outcome {
            Some(reason) => self.down(reason),
            None => Cycle::Shutdown,
        }
    }

    /// Read until the stream fails or shutdown is requested.
    ///
    /// Returns `None` on shutdown.
    async fn read_loop(
        &self,
        stream: &mut dyn LinkStream,
        control_rx: &mut mpsc::UnboundedReceiver<Control>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Option<DisconnectReason> {
        let mut buf = vec![0u8; self.config.read_buffer_size];

        loop {
            let read = tokio::select! {
                biased;
                _ = wait_shutdown(shutdown_rx) => return None,
                Some(_) = control_rx.recv() => {
                    debug!("Reconnect ignored: already connected");
                    continue;
                }
                read = stream.read_chunk(&mut buf) => read,
            };

            match read {
                Ok(0) => {
                    info!("Connection closed by remote");
                    return Some(DisconnectReason::RemoteClosed);
                }
                Ok(n) => {
                    debug!("Received {} bytes: {:?}", n, String::from_utf8_lossy(&buf[..n]));
                    if let Some(event) = decode_chunk(&buf[..n]) {
                        info!("Trigger received");
                        // Detached; the read loop does not wait for the send.
                        drop(self.dispatcher.fire(event));
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    return Some(DisconnectReason::ReadError(e.0));
                }
            }
        }
    }

    fn down(&self, reason: DisconnectReason) -> Cycle {
        self.transition(LinkState::Disconnected(reason.clone()));
        Cycle::Down(reason)
    }

    fn transition(&self, next: LinkState) {
        let connected = next == LinkState::Connected;
        {
            let mut state = self.state.write();
            debug!("Link state: {:?} -> {:?}", *state, next);
            *state = next;
        }
        self.publisher
            .publish(ConnectivityStatus::from_connected(connected));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Resolves once shutdown is requested or the handle is gone.
async fn wait_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
