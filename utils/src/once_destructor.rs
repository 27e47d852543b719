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

/// Calls the given closure when dropped, unless disarmed first.
pub struct OnceDestructor<F: FnOnce()> {
    call: Option<F>,
}

impl<F: FnOnce()> OnceDestructor<F> {
    pub fn new(call: F) -> Self {
        Self { call: Some(call) }
    }

    /// Drop without invoking the closure.
    pub fn disarm(mut self) {
        self.call = None;
    }
}

impl<F: FnOnce()> Drop for OnceDestructor<F> {
    fn drop(&mut self) {
        if let Some(call) = self.call.take() {
            call()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_on_drop() {
        let mut called = false;
        {
            let _guard = OnceDestructor::new(|| called = true);
        }
        assert!(called);
    }

    #[test]
    fn disarmed_does_not_run() {
        let mut called = false;
        {
            let guard = OnceDestructor::new(|| called = true);
            guard.disarm();
        }
        assert!(!called);
    }
}
