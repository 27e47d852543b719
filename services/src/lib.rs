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

//! The standard RPC services: ping, metrics and input.
//!
//! Each service is a unit that depends on the [rpc::Rpc] server unit and
//! registers its method handlers during construct. Server streams emit a
//! `null` heartbeat once per second while no real item is available, so
//! clients can distinguish a quiet stream from a dead one.

pub mod input;
pub mod metrics;
pub mod ping;

use std::time::Duration;

pub use input::{InputService, InputStub};
pub use metrics::{MetricsService, MetricsStub};
pub use ping::{PingService, PingStub};

/// Interval between `null` keep-alive items on idle server streams.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);
