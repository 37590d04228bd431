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

//! Bluetooth serial trigger to SMS alert bridge.
//!
//! Keeps an RFCOMM link to a paired HC-06 module open, and sends an SMS
//! alert (with the current location when available) whenever the module
//! writes the trigger payload.

pub mod bluetooth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod platform;
pub mod status;
pub mod supervisor;
pub mod ui;

pub use dispatch::{AlertDispatcher, DispatchOutcome};
pub use status::{ConnectivityStatus, StatusPublisher};
pub use supervisor::{DisconnectReason, LinkState, Supervisor, SupervisorConfig, SupervisorHandle};
