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

use std::sync::atomic::{AtomicBool, Ordering};

/// A boolean flag that can only ever go from unset to set.
///
/// Used to latch phase transitions, e.g. "configuration is sealed". Once
/// set, the flag never reverts.
#[derive(Debug, Default)]
pub struct SetFlag(AtomicBool);

impl SetFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Set the flag. Returns whether this call was the one that set it.
    pub fn set(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn test(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
