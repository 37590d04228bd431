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

//! ModemManager access through the `mmcli` command line tool.

use anyhow::{anyhow, Result};
use tokio::process::Command;
use tracing::debug;

/// Handle to one modem as selected by `mmcli -m`.
#[derive(Debug, Clone)]
pub struct Mmcli {
    modem: String,
}

impl Mmcli {
    /// `modem` is an mmcli modem selector: an index, a DBus path or "any".
    pub fn new(modem: impl Into<String>) -> Self {
        Self {
            modem: modem.into(),
        }
    }

    /// Run mmcli with the given arguments and return stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        debug!("mmcli {:?}", args);

        let output = Command::new("mmcli")
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow!("failed to run mmcli: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("mmcli exited with {}: {}", output.status, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Create an SMS on the modem and return its DBus path.
    pub async fn create_sms(&self, number: &str, text: &str) -> Result<String> {
        let fields = format!(
            "text='{}',number='{}'",
            sanitize_value(text),
            sanitize_value(number)
        );
        let create = format!("--messaging-create-sms={}", fields);
        let stdout = self.run(&["-m", &self.modem, &create]).await?;

        parse_sms_path(&stdout).ok_or_else(|| anyhow!("unexpected mmcli output: {}", stdout.trim()))
    }

    /// Send a previously created SMS.
    pub async fn send_sms(&self, path: &str) -> Result<()> {
        self.run(&["-s", path, "--send"]).await?;
        Ok(())
    }

    /// Read the modem's current GPS location, if it has one.
    pub async fn location(&self) -> Result<Option<(f64, f64)>> {
        let stdout = self.run(&["-m", &self.modem, "--location-get"]).await?;
        Ok(parse_location(&stdout))
    }
}

/// mmcli's key-value syntax quotes values with `'` and has no escape.
fn sanitize_value(value: &str) -> String {
    value.replace('\'', "\u{2019}")
}

/// Extract the SMS path from `Successfully created new SMS: /org/.../SMS/3`.
fn parse_sms_path(stdout: &str) -> Option<String> {
    stdout
        .split_whitespace()
        .find(|token| token.contains("/SMS/"))
        .map(|token| token.to_string())
}

/// Extract latitude and longitude from `mmcli --location-get` output.
fn parse_location(stdout: &str) -> Option<(f64, f64)> {
    let mut latitude = None;
    let mut longitude = None;

    for line in stdout.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        // "  GPS  |   latitude" -> "latitude"
        let key = key.rsplit('|').next().unwrap_or(key).trim();
        match key {
            "latitude" => latitude = value.trim().parse::<f64>().ok(),
            "longitude" => longitude = value.trim().parse::<f64>().ok(),
            _ => {}
        }
    }

    Some((latitude?, longitude?))
}
