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

use std::{fmt::Debug, sync::Arc};

use events::Broker;
use rpc::{Pool, Rpc};
use unit::ShutdownTrigger;

/// Handles into a running application, for components that are meant to
/// steer it from outside the unit graph: a CLI, a GUI or a test harness.
#[derive(Clone)]
pub struct Controller {
    shutdown_trigger: ShutdownTrigger,
    rpc: Arc<Rpc>,
    broker: Arc<dyn Broker>,
    pool: Arc<Pool>,
}

impl Controller {
    pub(crate) fn new(
        shutdown_trigger: ShutdownTrigger,
        rpc: Arc<Rpc>,
        broker: Arc<dyn Broker>,
        pool: Arc<Pool>,
    ) -> Self {
        Self {
            shutdown_trigger,
            rpc,
            broker,
            pool,
        }
    }

    /// Ask the application to shut down. Returns immediately; the unit
    /// graph winds down asynchronously.
    pub fn shutdown(&self) {
        self.shutdown_trigger.initiate()
    }

    pub fn shutdown_trigger(&self) -> &ShutdownTrigger {
        &self.shutdown_trigger
    }

    /// The RPC server unit, e.g. for [rpc::Rpc::local_addr_ready].
    pub fn rpc(&self) -> &Arc<Rpc> {
        &self.rpc
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }
}

impl Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller (contents cannot be displayed)").finish()
    }
}
