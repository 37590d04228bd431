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

//! SMS transport abstraction and backends.

use async_trait::async_trait;
use tracing::info;

use super::modem::Mmcli;
use crate::config::{SmsBackend, SmsConfig};
use crate::error::SendError;

/// Septets in a single GSM-7 message.
const GSM7_SINGLE: usize = 160;
/// Septets per part of a concatenated GSM-7 message.
const GSM7_PART: usize = 153;
/// UTF-16 units in a single UCS-2 message.
const UCS2_SINGLE: usize = 70;
/// UTF-16 units per part of a concatenated UCS-2 message.
const UCS2_PART: usize = 67;

/// GSM 03.38 basic character set.
const GSM7_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞ\u{1b}ÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?\
¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";

/// GSM 03.38 extension table; each costs two septets.
const GSM7_EXTENDED: &str = "^{}\\[~]|€\u{0c}";

/// Trait for SMS backends.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Get the backend name.
    fn backend_name(&self) -> &'static str;

    /// Send `parts` in order as one (possibly concatenated) message.
    async fn send_message(&self, destination: &str, parts: &[String]) -> Result<(), SendError>;
}

/// Create the transport selected in the config.
pub fn create_transport(config: &SmsConfig) -> Box<dyn MessageTransport> {
    match config.backend {
        SmsBackend::Mmcli => Box::new(MmcliTransport::new(Mmcli::new(&config.modem))),
        SmsBackend::Log => Box::new(LogTransport),
    }
}

/// Sends through ModemManager.
///
/// ModemManager does its own concatenation, so the parts are joined back
/// into one SMS object.
pub struct MmcliTransport {
    mmcli: Mmcli,
}

impl MmcliTransport {
    pub fn new(mmcli: Mmcli) -> Self {
        Self { mmcli }
    }
}

#[async_trait]
impl MessageTransport for MmcliTransport {
    fn backend_name(&self) -> &'static str {
        "ModemManager"
    }

    async fn send_message(&self, destination: &str, parts: &[String]) -> Result<(), SendError> {
        let text = parts.concat();

        let path = self
            .mmcli
            .create_sms(destination, &text)
            .await
            .map_err(|e| SendError::SendFailed(e.to_string()))?;

        self.mmcli
            .send_sms(&path)
            .await
            .map_err(|e| SendError::SendFailed(e.to_string()))?;

        info!("SMS {} sent to {} ({} parts)", path, destination, parts.len());
        Ok(())
    }
}

/// Log-only transport for running without a modem.
pub struct LogTransport;

#[async_trait]
impl MessageTransport for LogTransport {
    fn backend_name(&self) -> &'static str {
        "Log (no-op)"
    }

    async fn send_message(&self, destination: &str, parts: &[String]) -> Result<(), SendError> {
        for (i, part) in parts.iter().enumerate() {
            info!("[LOG] Would send to {} part {}/{}: {}", destination, i + 1, parts.len(), part);
        }
        Ok(())
    }
}

/// Septet cost of `c` in GSM-7, or `None` if it needs UCS-2.
fn gsm7_cost(c: char) -> Option<usize> {
    if GSM7_BASIC.contains(c) {
        Some(1)
    } else if GSM7_EXTENDED.contains(c) {
        Some(2)
    } else {
        None
    }
}

/// Split `text` into the parts a phone would send it as.
///
/// Text that fits the GSM-7 alphabet is measured in septets (160 for a
/// single message, 153 per part otherwise); anything else is measured in
/// UTF-16 units (70, then 67 per part). Parts never split a character.
pub fn split_message(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }

    let gsm7 = text.chars().all(|c| gsm7_cost(c).is_some());
    let cost = |c: char| -> usize {
        if gsm7 {
            gsm7_cost(c).unwrap_or(1)
        } else {
            c.len_utf16()
        }
    };
    let (single, part) = if gsm7 {
        (GSM7_SINGLE, GSM7_PART)
    } else {
        (UCS2_SINGLE, UCS2_PART)
    };

    let total: usize = text.chars().map(cost).sum();
    if total <= single {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut used = 0;

    for c in text.chars() {
        let n = cost(c);
        if used + n > part {
            parts.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += n;
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
}
