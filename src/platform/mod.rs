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

//! Host services the bridge depends on: capabilities, preferences, SMS,
//! location and notifications.

pub mod location;
pub mod modem;
pub mod notify;
pub mod permissions;
pub mod prefs;
pub mod sms;

pub use location::{create_provider, Accuracy, Location, LocationProvider};
pub use notify::{LogNotifier, NotificationSink};
pub use permissions::{Capability, PermissionConfig, PermissionOracle};
pub use prefs::{ConfigurationStore, PreferenceStore, Preferences};
pub use sms::{create_transport, split_message, MessageTransport};
