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

use std::time::SystemTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    KeyDown,
    KeyUp,
    ButtonDown,
    ButtonUp,
    Axis,
}

/// A user input event as reported by an input driver unit.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InputEvent {
    /// Logical name, e.g. `volume-up`.
    pub name: String,
    pub kind: InputKind,
    /// Key or button label, empty for axis events.
    pub key: String,
    /// Originating device, e.g. `/dev/input/event0`.
    pub device: String,
    pub scancode: u32,
    pub timestamp: SystemTime,
}
