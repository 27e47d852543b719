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

//! The typed event bus and its payload types.
//!
//! Producers publish [Event]s through the [Broker] capability; consumers
//! hold [bus::Subscription]s with bounded buffers. A slow consumer never
//! stalls a non-blocking publisher: its events are dropped and counted
//! instead.

pub mod bus;
pub mod event;
pub mod input;
pub mod measurement;

pub use bus::{Broker, Bus, Subscription};
pub use event::{DisplayChange, Event, Payload};
pub use input::{InputEvent, InputKind};
pub use measurement::{Field, FieldKind, FieldValue, Measurement};
