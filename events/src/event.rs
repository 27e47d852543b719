// Copyright (c) 2024 The Gimbal developers
// SPDX-License-Identifier: MIT
// Licensed under the MIT License;
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://spdx.org/licenses/MIT
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{any::Any, sync::Arc};

use unit::capability::DisplayMode;

use crate::{input::InputEvent, measurement::Measurement};

/// A display was reconfigured.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DisplayChange {
    pub display: String,
    pub mode: Option<DisplayMode>,
}

/// The event body. Well-known payloads are enumerated so consumers can
/// match without downcasting; anything else travels as [Payload::Opaque].
#[derive(Clone)]
pub enum Payload {
    Input(InputEvent),
    Measurement(Measurement),
    Display(DisplayChange),
    Heartbeat,
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Input(e) => f.debug_tuple("Input").field(e).finish(),
            Payload::Measurement(m) => f.debug_tuple("Measurement").field(m).finish(),
            Payload::Display(d) => f.debug_tuple("Display").field(d).finish(),
            Payload::Heartbeat => f.write_str("Heartbeat"),
            Payload::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

/// A named occurrence published on the bus.
#[derive(Clone, Debug)]
pub struct Event {
    pub name: String,
    pub payload: Payload,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// The measurement carried by this event, if any.
    pub fn measurement(&self) -> Option<&Measurement> {
        match &self.payload {
            Payload::Measurement(m) => Some(m),
            _ => None,
        }
    }

    /// The input event carried by this event, if any.
    pub fn input(&self) -> Option<&InputEvent> {
        match &self.payload {
            Payload::Input(e) => Some(e),
            _ => None,
        }
    }
}
