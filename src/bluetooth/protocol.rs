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

//! Trigger protocol spoken by the serial peer.
//!
//! The peer writes ASCII text. A single read chunk whose trimmed content is
//! exactly [`TRIGGER_PAYLOAD`] is a trigger; everything else is ignored.
//!
//! Each chunk is judged on its own. Nothing is buffered across reads, so a
//! payload that arrives split over two reads, or glued to another payload in
//! one read, is not recognized. The HC-06 firmware sends the digit as its own
//! write, which in practice lands in one chunk.

/// Payload that fires an alert.
pub const TRIGGER_PAYLOAD: &str = "1";

/// A recognized trigger. Carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent;

/// Decode one read chunk.
pub fn decode_chunk(chunk: &[u8]) -> Option<TriggerEvent> {
    let text = String::from_utf8_lossy(chunk);
    if text.trim() == TRIGGER_PAYLOAD {
        Some(TriggerEvent)
    } else {
        None
    }
}
