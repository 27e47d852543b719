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

//! The lifecycle orchestrator.
//!
//! Drives every resolved unit through define → construct → run → dispose.
//! Define and construct happen sequentially in dependency order; run
//! happens concurrently, one task per unit; dispose happens sequentially
//! in reverse order for every unit that got past define, no matter how
//! the earlier phases ended.

pub mod shutdown_signal;

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinSet,
};

use logging::log;

use crate::{
    config::{CommandContext, Config, ParseOutcome},
    resolver::ResolvedUnit,
    Error, Unit,
};

use shutdown_signal::{ShutdownReason, SignalWatcher};

/// Default per-unit time budget for dispose before it is abandoned.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Orchestrator settings.
pub struct ManagerConfig {
    name: String,
    enable_signal_handlers: bool,
    shutdown_timeout_per_unit: Duration,
}

impl ManagerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enable_signal_handlers: false,
            shutdown_timeout_per_unit: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Initiate shutdown on SIGINT/SIGTERM. A second signal while
    /// shutting down forces the process to exit.
    pub fn enable_signal_handlers(mut self) -> Self {
        self.enable_signal_handlers = true;
        self
    }

    pub fn with_shutdown_timeout_per_unit(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_per_unit = timeout;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum State {
    Registered,
    Defined,
    Constructed,
    Running,
    Disposed,
}

struct Node {
    name: String,
    unit: Arc<dyn Unit>,
    state: State,
}

/// Handed to every unit's run phase; resolves once shutdown is initiated.
pub struct ShutdownRequest(broadcast::Receiver<()>);

impl ShutdownRequest {
    /// Wait for the shutdown request. All error outcomes on the underlying
    /// channel also count as shutdown.
    pub async fn recv(&mut self) {
        let _ = self.0.recv().await;
    }
}

/// Cloneable handle that initiates application shutdown from anywhere.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl ShutdownTrigger {
    pub fn initiate(&self) {
        // A dropped receiver means the manager is already gone.
        let _ = self.tx.send(());
    }
}

/// How the application's argument handling concluded.
pub enum Verdict {
    /// The unit graph executed.
    Ran,
    /// Help or version text to print to stdout; exit 0.
    Help(String),
    /// Usage error text to print to stderr; exit 2.
    Usage(String),
}

/// A unit failure recorded during any phase.
pub struct UnitFailure {
    pub unit: String,
    pub error: Error,
}

/// The aggregated outcome of [Manager::main].
pub struct Report {
    pub verdict: Verdict,
    pub errors: Vec<UnitFailure>,
}

/// Drives the unit graph through its lifecycle.
pub struct Manager {
    config: ManagerConfig,
    nodes: Vec<Node>,
    trigger_tx: mpsc::UnboundedSender<()>,
    trigger_rx: mpsc::UnboundedReceiver<()>,
}

impl Manager {
    /// `units` must come from [crate::resolver::resolve]: dependencies
    /// first, already wired.
    pub fn new(config: ManagerConfig, units: Vec<ResolvedUnit>) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let nodes = units
            .into_iter()
            .map(|resolved| Node {
                name: resolved.name,
                unit: resolved.unit,
                state: State::Registered,
            })
            .collect();
        Self {
            config,
            nodes,
            trigger_tx,
            trigger_rx,
        }
    }

    pub fn make_shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            tx: self.trigger_tx.clone(),
        }
    }

    /// Run the whole lifecycle to completion.
    pub async fn main(mut self, mut config: Config) -> Report {
        let mut errors = Vec::new();
        log::info!("Starting {}", self.config.name);

        // Define phase: units declare flags and commands.
        for node in self.nodes.iter_mut() {
            log::debug!("Defining {}", node.name);
            match node.unit.define(&mut config) {
                Ok(()) => node.state = State::Defined,
                Err(e) => {
                    log::error!("Defining {} failed: {e}", node.name);
                    errors.push(UnitFailure {
                        unit: node.name.clone(),
                        error: e,
                    });
                    self.dispose_all(&mut errors, State::Defined).await;
                    return Report {
                        verdict: Verdict::Ran,
                        errors,
                    };
                }
            }
        }

        match config.parse() {
            Ok(ParseOutcome::Ready) => (),
            Ok(ParseOutcome::Help(text)) => {
                self.dispose_all(&mut errors, State::Defined).await;
                return Report {
                    verdict: Verdict::Help(text),
                    errors,
                };
            }
            Ok(ParseOutcome::Usage(text)) => {
                self.dispose_all(&mut errors, State::Defined).await;
                return Report {
                    verdict: Verdict::Usage(text),
                    errors,
                };
            }
            Err(e) => {
                errors.push(UnitFailure {
                    unit: self.config.name.clone(),
                    error: e,
                });
                self.dispose_all(&mut errors, State::Defined).await;
                return Report {
                    verdict: Verdict::Ran,
                    errors,
                };
            }
        }

        // Construct phase: units acquire resources.
        for node in self.nodes.iter_mut() {
            log::debug!("Constructing {}", node.name);
            match node.unit.construct(&config).await {
                Ok(()) => node.state = State::Constructed,
                Err(e) => {
                    log::error!("Constructing {} failed: {e}", node.name);
                    errors.push(UnitFailure {
                        unit: node.name.clone(),
                        error: e,
                    });
                    self.dispose_all(&mut errors, State::Constructed).await;
                    return Report {
                        verdict: Verdict::Ran,
                        errors,
                    };
                }
            }
        }

        let help_requested = self.run_phase(&config, &mut errors).await;
        self.dispose_all(&mut errors, State::Constructed).await;
        log::info!("{} stopped", self.config.name);

        let verdict = if help_requested {
            Verdict::Help(config.usage().to_owned())
        } else {
            Verdict::Ran
        };
        Report { verdict, errors }
    }

    /// Run all units concurrently until shutdown; returns whether a
    /// handler requested help output.
    async fn run_phase(&mut self, config: &Config, errors: &mut Vec<UnitFailure>) -> bool {
        let (shutdown_tx, _keep_alive) = broadcast::channel::<()>(1);
        let mut join_set: JoinSet<(String, bool, Result<(), Error>)> = JoinSet::new();
        let mut foreground_total: usize = 0;

        for node in self.nodes.iter_mut() {
            node.state = State::Running;
            let unit = Arc::clone(&node.unit);
            let name = node.name.clone();
            let foreground = !unit.background();
            if foreground {
                foreground_total += 1;
            }
            let request = ShutdownRequest(shutdown_tx.subscribe());
            log::debug!("Running {name}");
            join_set.spawn(async move {
                let result = unit.run(request).await;
                (name, foreground, result)
            });
        }

        if let Some(selected) = config.selected_command() {
            match config.command_handler(selected) {
                Some(handler) => {
                    let context = CommandContext {
                        command: selected.to_owned(),
                        args: config.command_args().to_vec(),
                    };
                    let name = format!("command:{selected}");
                    foreground_total += 1;
                    log::debug!("Running {name}");
                    let future: BoxFuture<'static, Result<(), Error>> = handler(context);
                    join_set.spawn(async move { (name, true, future.await) });
                }
                None => errors.push(UnitFailure {
                    unit: self.config.name.clone(),
                    error: Error::internal(
                        "manager",
                        format!("command {selected:?} has no handler"),
                    ),
                }),
            }
        }

        let mut watcher = match SignalWatcher::new(self.config.enable_signal_handlers) {
            Ok(watcher) => watcher,
            Err(e) => {
                log::error!("Installing signal handlers failed: {e}");
                errors.push(UnitFailure {
                    unit: self.config.name.clone(),
                    error: e,
                });
                SignalWatcher::disabled()
            }
        };

        let mut shutdown_initiated = false;
        let mut signal_seen = false;
        let mut help_requested = false;
        let mut foreground_done: usize = 0;

        let initiate = |reason: ShutdownReason, initiated: &mut bool| {
            if !*initiated {
                *initiated = true;
                log::info!("Shutting down: {reason}");
                let _ = shutdown_tx.send(());
            }
        };

        loop {
            if join_set.is_empty() && shutdown_initiated {
                break;
            }
            tokio::select! {
                joined = join_set.join_next(), if !join_set.is_empty() => match joined {
                    None => break,
                    Some(Ok((name, foreground, result))) => {
                        match result {
                            Ok(()) => log::debug!("{name} finished"),
                            Err(Error::Help) => {
                                help_requested = true;
                                initiate(ShutdownReason::RunsFinished, &mut shutdown_initiated);
                            }
                            Err(e) if e.is_cancelled() => log::debug!("{name} cancelled"),
                            Err(e) => {
                                log::error!("{name} failed: {e}");
                                errors.push(UnitFailure { unit: name, error: e });
                                initiate(ShutdownReason::RunError, &mut shutdown_initiated);
                            }
                        }
                        if foreground {
                            foreground_done += 1;
                            if foreground_done == foreground_total {
                                initiate(ShutdownReason::RunsFinished, &mut shutdown_initiated);
                            }
                        }
                    }
                    Some(Err(join_error)) => {
                        log::error!("A run task aborted: {join_error}");
                        errors.push(UnitFailure {
                            unit: self.config.name.clone(),
                            error: Error::internal("manager", format!("run task aborted: {join_error}")),
                        });
                        initiate(ShutdownReason::RunError, &mut shutdown_initiated);
                    }
                },
                _ = self.trigger_rx.recv() => {
                    initiate(ShutdownReason::Trigger, &mut shutdown_initiated);
                }
                reason = watcher.recv() => {
                    if signal_seen {
                        log::error!("Received a second signal, exiting immediately");
                        std::process::exit(1);
                    }
                    signal_seen = true;
                    initiate(reason, &mut shutdown_initiated);
                }
            }
        }

        help_requested
    }

    /// Reverse-order dispose of every unit at or past `min_state`. Errors
    /// and timeouts are recorded but never stop the sweep.
    async fn dispose_all(&mut self, errors: &mut Vec<UnitFailure>, min_state: State) {
        let timeout = self.config.shutdown_timeout_per_unit;
        for node in self.nodes.iter_mut().rev() {
            if node.state < min_state || node.state == State::Disposed {
                continue;
            }
            log::debug!("Disposing {}", node.name);
            match tokio::time::timeout(timeout, node.unit.dispose()).await {
                Ok(Ok(())) => (),
                Ok(Err(e)) => {
                    log::error!("Disposing {} failed: {e}", node.name);
                    errors.push(UnitFailure {
                        unit: node.name.clone(),
                        error: e,
                    });
                }
                Err(_elapsed) => {
                    log::error!("Disposing {} timed out", node.name);
                    errors.push(UnitFailure {
                        unit: node.name.clone(),
                        error: Error::internal("manager", "dispose timed out"),
                    });
                }
            }
            node.state = State::Disposed;
        }
    }
}
