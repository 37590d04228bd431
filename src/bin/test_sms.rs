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

//! Test utility for the SMS and location backends.
//!
//! Usage: cargo run --bin test_sms -- [test|alert|location]

use anyhow::Result;
use btsms_bridge::config::Config;
use btsms_bridge::dispatch::{AlertDispatcher, DispatchOutcome};
use btsms_bridge::platform::{
    create_provider, create_transport, Accuracy, ConfigurationStore, LocationProvider,
    MessageTransport, PermissionOracle, PreferenceStore,
};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(|s| s.as_str()).unwrap_or("test");

    let config = Config::load()?;
    let store = PreferenceStore::new(&config.data_dir)?;
    println!("Destination: {:?}", store.destination_number());

    let permissions: Arc<dyn PermissionOracle> = Arc::new(config.permissions.clone());
    let location: Arc<dyn LocationProvider> = Arc::from(create_provider(&config.location, &config.sms));
    let transport: Arc<dyn MessageTransport> = Arc::from(create_transport(&config.sms));
    println!("Using backend: {}", transport.backend_name());

    let dispatcher = AlertDispatcher::new(
        &store,
        permissions,
        transport,
        Arc::clone(&location),
        &config.alert,
    );

    match mode {
        "test" => {
            println!("Sending test message...");
            dispatcher.send_test().await?;
            println!("Done!");
        }
        "alert" => {
            println!("Sending a full alert, as if the trigger fired...");
            match dispatcher.dispatch().await {
                DispatchOutcome::Sent { parts, with_location } => {
                    println!("Done! {} part(s), location attached: {}", parts, with_location);
                }
                other => println!("Not sent: {:?}", other),
            }
        }
        "location" => {
            println!("Requesting location...");
            match location.current_location(Accuracy::High).await {
                Ok(loc) => println!("Latitude {}, longitude {}", loc.latitude, loc.longitude),
                Err(e) => println!("No location: {}", e),
            }
        }
        _ => {
            println!("Unknown mode: {}", mode);
            println!("Usage: test_sms [test|alert|location]");
        }
    }

    Ok(())
}
