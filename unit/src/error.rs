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

//! The framework-wide error taxonomy.

/// Errors surfaced by the framework and by unit implementations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied an invalid argument.
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// The requested binding, service, or device does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not supported on this platform or transport.
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// API called in the wrong lifecycle phase.
    #[error("Called out of order: {0}")]
    OutOfOrder(&'static str),

    /// Conflicting registration.
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// A framework invariant was broken.
    #[error("[{component}] internal error: {message}")]
    Internal {
        component: &'static str,
        message: String,
    },

    /// Sentinel returned by a command handler to request usage output.
    #[error("Help requested")]
    Help,

    /// The operation was interrupted by shutdown.
    #[error("Cancelled")]
    Cancelled,

    /// Low-level I/O returned data violating the driver contract.
    #[error("Unexpected device response: {0}")]
    UnexpectedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unit-specific failure that does not fit the taxonomy.
    #[error("{0}")]
    Unit(String),
}

impl Error {
    pub fn internal(component: &'static str, message: impl Into<String>) -> Self {
        Error::Internal {
            component,
            message: message.into(),
        }
    }

    /// Whether this error is the benign shutdown marker.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
