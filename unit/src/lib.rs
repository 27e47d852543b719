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

//! The unit graph runtime: registry, resolver and lifecycle orchestrator.
//!
//! Applications are composed of *units*, singleton components that declare
//! the capabilities they need in a [Manifest]. The [registry::Registry]
//! maps capability interfaces to concrete unit types, the resolver
//! ([resolver::resolve]) instantiates and wires the dependency graph, and
//! the [manager::Manager] drives every unit through the define → construct
//! → run → dispose lifecycle with shared shutdown.

pub mod capability;
pub mod config;
pub mod error;
pub mod manager;
pub mod registry;
pub mod resolver;

pub use config::{CommandContext, Config, Flag, VersionInfo};
pub use error::Error;
pub use manager::{
    Manager, ManagerConfig, Report, ShutdownRequest, ShutdownTrigger, UnitFailure, Verdict,
};
pub use registry::{Iface, Manifest, Registry, Slots};
pub use resolver::{resolve, ResolvedUnit};

/// A singleton lifecycle-managed component.
///
/// Units are instantiated at most once per process and shared between all
/// dependents, so lifecycle methods take `&self`; a unit is responsible
/// for its own interior synchronisation.
///
/// All methods except [Unit::manifest] are optional. A unit that only
/// needs configuration and resources implements `define`/`construct` and
/// keeps the default `run`, which waits for shutdown.
#[async_trait::async_trait]
pub trait Unit: Send + Sync + 'static {
    /// The unit's name and the ordered list of capabilities it needs.
    fn manifest(&self) -> Manifest;

    /// Receive the shared instances for every capability declared in the
    /// manifest. Called once, before any other lifecycle method.
    fn wire(&self, slots: &Slots) -> Result<(), Error> {
        let _ = slots;
        Ok(())
    }

    /// Declare flags and commands. Configuration may only be mutated here.
    fn define(&self, config: &mut Config) -> Result<(), Error> {
        let _ = config;
        Ok(())
    }

    /// Acquire resources. Flags are parsed and dependencies are wired by
    /// the time this runs.
    async fn construct(&self, config: &Config) -> Result<(), Error> {
        let _ = config;
        Ok(())
    }

    /// Long-lived work, executed on its own task concurrently with every
    /// other unit's `run`. Implementations must return promptly once the
    /// shutdown request fires; the default implementation just waits for
    /// it.
    async fn run(&self, mut shutdown: ShutdownRequest) -> Result<(), Error> {
        shutdown.recv().await;
        Ok(())
    }

    /// Background units run for as long as the process does; their `run`
    /// returning does not end the application. Foreground units (command
    /// handlers and similar) trigger shutdown once they have all finished.
    fn background(&self) -> bool {
        true
    }

    /// Release resources. Invoked in reverse dependency order, exactly
    /// once for every unit that was constructed, regardless of how the
    /// run phase ended.
    async fn dispose(&self) -> Result<(), Error> {
        Ok(())
    }
}
