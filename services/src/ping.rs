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

//! Liveness and identity: `ping_ping` and `ping_version`.

use std::{
    any::Any,
    sync::{Arc, OnceLock},
};

use jsonrpsee::{core::RpcResult, proc_macros::rpc};

use rpc::{client::client_error, Conn, Rpc};
use unit::{Config, Error, Manifest, Slots, Unit, VersionInfo};

pub const SERVICE_NAME: &str = "ping";

#[rpc(server, client, namespace = "ping")]
pub trait PingRpc {
    /// No-op used to check the server is alive.
    #[method(name = "ping")]
    async fn ping(&self) -> RpcResult<()>;

    /// Build and version metadata of the running application.
    #[method(name = "version")]
    async fn version(&self) -> RpcResult<VersionInfo>;
}

struct PingHandler {
    version: VersionInfo,
}

#[async_trait::async_trait]
impl PingRpcServer for PingHandler {
    async fn ping(&self) -> RpcResult<()> {
        Ok(())
    }

    async fn version(&self) -> RpcResult<VersionInfo> {
        Ok(self.version.clone())
    }
}

/// The ping service unit.
#[derive(Default)]
pub struct PingService {
    rpc: OnceLock<Arc<Rpc>>,
}

#[async_trait::async_trait]
impl Unit for PingService {
    fn manifest(&self) -> Manifest {
        Manifest::new("ping-service").requires::<Rpc>()
    }

    fn wire(&self, slots: &Slots) -> Result<(), Error> {
        self.rpc
            .set(slots.get::<Rpc>()?)
            .map_err(|_| Error::OutOfOrder("ping service wired twice"))
    }

    async fn construct(&self, config: &Config) -> Result<(), Error> {
        let rpc = self
            .rpc
            .get()
            .ok_or_else(|| Error::internal("ping-service", "not wired"))?;
        let handler = PingHandler {
            version: config.version().clone(),
        };
        rpc.register(handler.into_rpc())
    }
}

/// Typed client stub over a pooled connection.
pub struct PingStub {
    conn: Arc<Conn>,
}

impl PingStub {
    pub fn new(conn: Arc<Conn>) -> Self {
        Self { conn }
    }

    pub async fn ping(&self) -> Result<(), Error> {
        PingRpcClient::ping(self.conn.client()).await.map_err(client_error)
    }

    pub async fn version(&self) -> Result<VersionInfo, Error> {
        PingRpcClient::version(self.conn.client()).await.map_err(client_error)
    }
}

/// Stub constructor for the registry; the handle must be an `Arc<Conn>`.
/// A mismatched handle yields a placeholder that fails the caller's
/// downcast.
pub fn stub_ctor(conn: &(dyn Any + Send + Sync)) -> Box<dyn Any + Send + Sync> {
    match conn.downcast_ref::<Arc<Conn>>() {
        Some(conn) => Box::new(PingStub::new(Arc::clone(conn))),
        None => Box::new(()),
    }
}
