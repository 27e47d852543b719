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

//! Process termination signals as a shutdown source.

use crate::Error;

/// Why shutdown was initiated. Logged once when the first cause fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Trigger,
    RunError,
    RunsFinished,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ShutdownReason::Interrupt => "interrupt signal",
            ShutdownReason::Terminate => "termination signal",
            ShutdownReason::Trigger => "shutdown trigger",
            ShutdownReason::RunError => "unit failure",
            ShutdownReason::RunsFinished => "all foreground work finished",
        };
        f.write_str(text)
    }
}

#[cfg(unix)]
pub struct SignalWatcher {
    streams: Option<(tokio::signal::unix::Signal, tokio::signal::unix::Signal)>,
}

#[cfg(unix)]
impl SignalWatcher {
    pub fn new(enabled: bool) -> Result<Self, Error> {
        use tokio::signal::unix::{signal, SignalKind};
        let streams = if enabled {
            Some((signal(SignalKind::interrupt())?, signal(SignalKind::terminate())?))
        } else {
            None
        };
        Ok(Self { streams })
    }

    pub fn disabled() -> Self {
        Self { streams: None }
    }

    /// The next delivered signal; pending forever when handlers are off.
    pub async fn recv(&mut self) -> ShutdownReason {
        match &mut self.streams {
            Some((interrupt, terminate)) => tokio::select! {
                _ = interrupt.recv() => ShutdownReason::Interrupt,
                _ = terminate.recv() => ShutdownReason::Terminate,
            },
            None => std::future::pending().await,
        }
    }
}

#[cfg(not(unix))]
pub struct SignalWatcher {
    enabled: bool,
}

#[cfg(not(unix))]
impl SignalWatcher {
    pub fn new(enabled: bool) -> Result<Self, Error> {
        Ok(Self { enabled })
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub async fn recv(&mut self) -> ShutdownReason {
        if !self.enabled {
            return std::future::pending().await;
        }
        // Ctrl-C is the only portable signal; failure to install the
        // handler leaves shutdown to the other sources.
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownReason::Interrupt,
            Err(_) => std::future::pending().await,
        }
    }
}
