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

//! Application initialization routine.

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};

use events::{Broker, Bus};
use logging::log;
use rpc::{Pool, Rpc};
use services::{InputService, MetricsService, PingService};
use unit::{
    bind_unit, capability::Logger, resolve, Config, Error, Manager, ManagerConfig, Manifest,
    Registry, Slots, Unit, Verdict, VersionInfo,
};

use crate::{controller::Controller, log_unit::LogUnit, options::Options};

/// Bind the core framework units and the standard services. Embedders
/// that build their own registry call this before adding platform
/// bindings of their own.
pub fn register_standard_units(registry: &mut Registry) -> Result<(), Error> {
    bind_unit!(registry, Rpc)?;
    bind_unit!(registry, Pool)?;
    bind_unit!(registry, dyn Broker, Bus)?;
    bind_unit!(registry, dyn Logger, LogUnit)?;
    bind_unit!(registry, PingService)?;
    bind_unit!(registry, MetricsService)?;
    bind_unit!(registry, InputService)?;
    registry.bind_service_stub(services::ping::SERVICE_NAME, services::ping::stub_ctor)?;
    registry.bind_service_stub(services::metrics::SERVICE_NAME, services::metrics::stub_ctor)?;
    registry.bind_service_stub(services::input::SERVICE_NAME, services::input::stub_ctor)?;
    Ok(())
}

/// Root unit pulling in the standard stack, so that applications get the
/// RPC server, event bus and built-in services without declaring them.
#[derive(Default)]
struct CoreRoot {
    rpc: OnceLock<Arc<Rpc>>,
    broker: OnceLock<Arc<dyn Broker>>,
    pool: OnceLock<Arc<Pool>>,
}

impl Unit for CoreRoot {
    fn manifest(&self) -> Manifest {
        Manifest::new("core")
            .requires::<Rpc>()
            .requires::<Pool>()
            .requires::<dyn Broker>()
            .requires::<dyn Logger>()
            .requires::<PingService>()
            .requires::<MetricsService>()
            .requires::<InputService>()
    }

    fn wire(&self, slots: &Slots) -> Result<(), Error> {
        self.rpc
            .set(slots.get::<Rpc>()?)
            .map_err(|_| Error::OutOfOrder("core root wired twice"))?;
        self.broker
            .set(slots.get::<dyn Broker>()?)
            .map_err(|_| Error::OutOfOrder("core root wired twice"))?;
        self.pool
            .set(slots.get::<Pool>()?)
            .map_err(|_| Error::OutOfOrder("core root wired twice"))
    }
}

/// A fully assembled application, ready to run.
pub struct App {
    program: String,
    verbose: bool,
    manager: Manager,
    config: Config,
    controller: Controller,
}

impl App {
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Drive the unit graph to completion and map the outcome to the
    /// process exit code: 0 for success, help output or cancellation,
    /// 2 for a usage error, 1 for anything else.
    pub async fn main(self) -> i32 {
        let report = self.manager.main(self.config).await;

        match report.verdict {
            Verdict::Help(text) => {
                println!("{text}");
                0
            }
            Verdict::Usage(text) => {
                eprintln!("{text}");
                2
            }
            Verdict::Ran => {
                let mut failed = false;
                for failure in &report.errors {
                    if failure.error.is_cancelled() {
                        continue;
                    }
                    failed = true;
                    if self.verbose {
                        eprintln!("{}: {}: {:?}", self.program, failure.unit, failure.error);
                    } else {
                        eprintln!("{}: {}: {}", self.program, failure.unit, failure.error);
                    }
                }
                if failed {
                    1
                } else {
                    0
                }
            }
        }
    }
}

/// Assemble the application: logging, registry, resolved unit graph and
/// the lifecycle manager. `roots` are the application's own units; the
/// standard stack is added automatically.
pub fn setup(options: Options, version: VersionInfo, roots: Vec<Arc<dyn Unit>>) -> Result<App> {
    if options.debug() && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug");
    }
    logging::init_logging();
    log::info!("Starting {} {}", options.program(), version.tag);

    let mut registry = Registry::new();
    register_standard_units(&mut registry).context("registering the standard units failed")?;

    let core = Arc::new(CoreRoot::default());
    let mut all_roots: Vec<Arc<dyn Unit>> = vec![Arc::clone(&core) as Arc<dyn Unit>];
    all_roots.extend(roots);
    let order = resolve(&registry, all_roots).context("unit graph resolution failed")?;

    let manager_config = ManagerConfig::new(options.program()).enable_signal_handlers();
    let manager = Manager::new(manager_config, order);

    let wired = |name: &'static str| Error::internal("runner", format!("{name} not wired"));
    let controller = Controller::new(
        manager.make_shutdown_trigger(),
        Arc::clone(core.rpc.get().ok_or_else(|| wired("rpc"))?),
        Arc::clone(core.broker.get().ok_or_else(|| wired("broker"))?),
        Arc::clone(core.pool.get().ok_or_else(|| wired("pool"))?),
    );

    let config = Config::new(options.program(), version, options.raw_args().to_vec());

    Ok(App {
        program: options.program().to_owned(),
        verbose: options.verbose(),
        manager,
        config,
        controller,
    })
}
