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

//! Bluetooth SMS Bridge daemon

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use btsms_bridge::bluetooth::RfcommLink;
use btsms_bridge::config::Config;
use btsms_bridge::platform::{
    create_provider, create_transport, ConfigurationStore, LocationProvider, LogNotifier,
    MessageTransport, NotificationSink, PermissionOracle, PreferenceStore,
};
use btsms_bridge::status::StatusEvent;
use btsms_bridge::ui::{self, TrayAction};
use btsms_bridge::{AlertDispatcher, StatusPublisher, Supervisor, SupervisorConfig};

/// How often the preference file is checked for external edits.
const PREFS_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "btsms-bridge", version, about = "Bluetooth serial trigger to SMS alert bridge")]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge (default)
    Run,
    /// Save the destination phone number
    SetNumber { number: String },
    /// Print the saved destination phone number
    ShowNumber,
    /// Send the test message to the saved number
    TestSms,
    /// List paired Bluetooth devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("btsms_bridge=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::SetNumber { number } => {
            let store = PreferenceStore::new(&config.data_dir)?;
            store.set_destination_number(&number)?;
            println!("Saved: {}", store.destination_number());
            Ok(())
        }
        Command::ShowNumber => {
            let store = PreferenceStore::new(&config.data_dir)?;
            let number = store.destination_number();
            if number.is_empty() {
                println!("No phone number saved");
            } else {
                println!("{}", number);
            }
            Ok(())
        }
        Command::TestSms => {
            let store = PreferenceStore::new(&config.data_dir)?;
            let dispatcher = build_dispatcher(&config, &store);
            dispatcher.send_test().await?;
            println!("Test message sent");
            Ok(())
        }
        Command::Devices => {
            let link = RfcommLink::new(config.bluetooth.channel, config.bluetooth.connect_timeout()).await?;
            for device in link.list_paired_devices().await? {
                println!("{}  {}", device.address, device.name);
            }
            Ok(())
        }
    }
}

fn build_dispatcher(config: &Config, store: &dyn ConfigurationStore) -> Arc<AlertDispatcher> {
    let permissions: Arc<dyn PermissionOracle> = Arc::new(config.permissions.clone());
    let transport: Arc<dyn MessageTransport> = Arc::from(create_transport(&config.sms));
    let location: Arc<dyn LocationProvider> = Arc::from(create_provider(&config.location, &config.sms));
    info!("SMS backend: {}", transport.backend_name());

    AlertDispatcher::new(store, permissions, transport, location, &config.alert)
}

async fn run(config: Config) -> Result<()> {
    info!("Starting Bluetooth SMS Bridge v{}...", env!("CARGO_PKG_VERSION"));

    // Preferences
    let store = Arc::new(PreferenceStore::new(&config.data_dir)?);
    info!("Preferences: {}", store.path().display());
    if store.destination_number().is_empty() {
        warn!("No destination number saved; triggers will be ignored until one is set");
    }
    let watcher = Arc::clone(&store).spawn_watch(PREFS_POLL_INTERVAL);

    let permissions: Arc<dyn PermissionOracle> = Arc::new(config.permissions.clone());
    let dispatcher = build_dispatcher(&config, store.as_ref());

    // Start system tray
    let (mut action_rx, sink, tray) = match ui::run_tray().await {
        Ok((action_rx, notifier)) => {
            let sink: Arc<dyn NotificationSink> = Arc::new(notifier.clone());
            (action_rx, sink, Some(notifier))
        }
        Err(e) => {
            warn!("System tray unavailable, logging status instead: {}", e);
            let (_, action_rx) = mpsc::unbounded_channel();
            let sink: Arc<dyn NotificationSink> = Arc::new(LogNotifier);
            (action_rx, sink, None)
        }
    };

    let publisher = StatusPublisher::new(sink, Arc::clone(&permissions));
    if let Some(tray) = &tray {
        ui::follow_status(tray, publisher.subscribe());
    }

    // Status subscriber
    let mut status_rx = publisher.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let event = StatusEvent::from(*status_rx.borrow_and_update());
            match event.to_json() {
                Ok(json) => info!("Status: {}", json),
                Err(e) => error!("Failed to encode status: {}", e),
            }
        }
    });

    // Serial link supervisor
    let link = Arc::new(RfcommLink::new(config.bluetooth.channel, config.bluetooth.connect_timeout()).await?);
    let supervisor = Supervisor::new(
        link,
        Arc::clone(&dispatcher),
        publisher,
        permissions,
        SupervisorConfig::from(&config),
    );
    let handle = supervisor.start();

    info!("Ready. Waiting for '{}'.", config.bluetooth.peer_name);

    // Handle tray actions
    loop {
        tokio::select! {
            Some(action) = action_rx.recv() => {
                match action {
                    TrayAction::Reconnect => {
                        info!("Reconnect requested from tray");
                        handle.reconnect();
                    }
                    TrayAction::SendTest => {
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move {
                            if let Err(e) = dispatcher.send_test().await {
                                error!("Test message failed: {}", e);
                            }
                        });
                    }
                    TrayAction::Quit => {
                        info!("Quit requested");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    handle.shutdown().await;
    watcher.abort();

    info!("Bluetooth SMS Bridge stopped");
    Ok(())
}
