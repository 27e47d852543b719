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

//! Process assembly: registry population, lifecycle driving and exit
//! codes, shared between the daemon and any embedding executable (GUI,
//! test harness).

mod controller;
mod log_unit;
mod options;
mod runner;

pub use controller::Controller;
pub use log_unit::LogUnit;
pub use options::Options;
pub use runner::{register_standard_units, setup, App};
