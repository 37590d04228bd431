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

//! System tray implementation using ksni.
//!
//! The tray doubles as the status notification: its tooltip carries the
//! latest notification title and body.

use anyhow::{anyhow, Result};
use ksni::{self, menu::StandardItem, Handle, MenuItem, Tray, TrayService};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{error, info};

use crate::platform::NotificationSink;
use crate::status::{ConnectivityStatus, NOTIFICATION_TITLE};

/// Actions that can be triggered from the tray menu.
#[derive(Debug, Clone)]
pub enum TrayAction {
    Reconnect,
    SendTest,
    Quit,
}

/// System tray icon and menu.
pub struct BridgeTray {
    status: ConnectivityStatus,
    title: String,
    body: String,
    action_tx: mpsc::UnboundedSender<TrayAction>,
}

impl BridgeTray {
    pub fn new(action_tx: mpsc::UnboundedSender<TrayAction>) -> Self {
        Self {
            status: ConnectivityStatus::Disconnected,
            title: NOTIFICATION_TITLE.to_string(),
            body: ConnectivityStatus::Disconnected.notification_text().to_string(),
            action_tx,
        }
    }
}

impl Tray for BridgeTray {
    fn icon_name(&self) -> String {
        self.status.icon_name().to_string()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        ksni::ToolTip {
            icon_name: String::new(),
            icon_pixmap: Vec::new(),
            title: self.title.clone(),
            description: self.body.clone(),
        }
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        let mut items = vec![];

        // Status header
        let status_text = match self.status {
            ConnectivityStatus::Connected => "● Connected".to_string(),
            ConnectivityStatus::Disconnected => "○ Disconnected".to_string(),
        };

        items.push(MenuItem::Standard(StandardItem {
            label: status_text,
            enabled: false,
            ..Default::default()
        }));

        items.push(MenuItem::Separator);

        items.push(MenuItem::Standard(StandardItem {
            label: "Reconnect".to_string(),
            enabled: !self.status.is_connected(),
            activate: Box::new(|tray: &mut Self| {
                let _ = tray.action_tx.send(TrayAction::Reconnect);
            }),
            ..Default::default()
        }));

        items.push(MenuItem::Standard(StandardItem {
            label: "Send Test SMS".to_string(),
            activate: Box::new(|tray: &mut Self| {
                let _ = tray.action_tx.send(TrayAction::SendTest);
            }),
            ..Default::default()
        }));

        items.push(MenuItem::Separator);

        // Quit
        items.push(MenuItem::Standard(StandardItem {
            label: "Quit".to_string(),
            activate: Box::new(|tray: &mut Self| {
                let _ = tray.action_tx.send(TrayAction::Quit);
            }),
            ..Default::default()
        }));

        items
    }

    fn id(&self) -> String {
        "btsms-bridge".to_string()
    }

    fn category(&self) -> ksni::Category {
        ksni::Category::Communications
    }
}

/// Notification sink that rewrites the tray tooltip.
#[derive(Clone)]
pub struct TrayNotifier {
    handle: Handle<BridgeTray>,
}

impl NotificationSink for TrayNotifier {
    fn upsert(&self, title: &str, body: &str) {
        let title = title.to_string();
        let body = body.to_string();
        self.handle.update(move |tray| {
            tray.title = title;
            tray.body = body;
        });
    }
}

/// How long the tray service gets to fail before it counts as started.
const STARTUP_GRACE: Duration = Duration::from_millis(500);

/// Run the system tray service.
///
/// Returns the menu action receiver and the notifier backed by the tray, or
/// an error when the service stops during startup (no session bus).
pub async fn run_tray() -> Result<(mpsc::UnboundedReceiver<TrayAction>, TrayNotifier)> {
    let (action_tx, action_rx) = mpsc::unbounded_channel();

    let tray = BridgeTray::new(action_tx);
    let service = TrayService::new(tray);
    let handle = service.handle();

    // Spawn the tray service; `run` only returns when it stops.
    let (stopped_tx, stopped_rx) = oneshot::channel();
    std::thread::spawn(move || {
        let reason = match service.run() {
            Ok(()) => "service exited".to_string(),
            Err(e) => e.to_string(),
        };
        error!("System tray stopped: {}", reason);
        let _ = stopped_tx.send(reason);
    });

    await_startup(stopped_rx, STARTUP_GRACE).await?;
    info!("System tray started");

    Ok((action_rx, TrayNotifier { handle }))
}

/// Ok when nothing reports a stop within `grace`.
async fn await_startup(stopped_rx: oneshot::Receiver<String>, grace: Duration) -> Result<()> {
    match tokio::time::timeout(grace, stopped_rx).await {
        Err(_) => Ok(()),
        Ok(Ok(reason)) => Err(anyhow!("System tray failed to start: {}", reason)),
        Ok(Err(_)) => Err(anyhow!("System tray thread exited during startup")),
    }
}

/// Keep the tray icon in step with the published status.
pub fn follow_status(notifier: &TrayNotifier, mut status_rx: watch::Receiver<ConnectivityStatus>) {
    let handle = notifier.handle.clone();
    tokio::spawn(async move {
        loop {
            let status = *status_rx.borrow_and_update();
            handle.update(move |tray| tray.status = status);
            if status_rx.changed().await.is_err() {
                break;
            }
        }
    });
}
