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

//! Outbound RPC connections, pooled per address.

use std::{any::Any, collections::HashMap, sync::Arc};

use jsonrpsee::{
    core::client::ClientT,
    rpc_params,
    ws_client::{WsClient, WsClientBuilder},
};
use tokio::sync::{Mutex, MutexGuard};

use logging::log;
use unit::{registry::Registry, Error, Manifest, Unit};

/// Translate a jsonrpsee client error into the framework taxonomy.
pub fn client_error(e: jsonrpsee::core::client::Error) -> Error {
    Error::Unit(format!("RPC client: {e}"))
}

/// A single connection to a remote RPC server.
pub struct Conn {
    addr: String,
    client: WsClient,
    stream_lock: Mutex<()>,
}

impl Conn {
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn client(&self) -> &WsClient {
        &self.client
    }

    /// Streaming RPCs over one connection are serialised; hold this
    /// guard for the lifetime of the stream.
    pub async fn lock_stream(&self) -> MutexGuard<'_, ()> {
        self.stream_lock.lock().await
    }

    /// Call the server's method-list reflection method.
    pub async fn list_methods(&self, method: &str) -> Result<Vec<String>, Error> {
        self.client.request(method, rpc_params![]).await.map_err(client_error)
    }

    /// Build a typed client stub for a named service, if one is bound in
    /// the registry.
    pub fn stub(self: &Arc<Self>, name: &str, registry: &Registry) -> Option<Box<dyn Any + Send + Sync>> {
        let conn = Arc::clone(self);
        registry.stub(name, &conn)
    }
}

/// Connection pool unit: one [Conn] per remote address, reused across
/// callers, all torn down on dispose.
#[derive(Default)]
pub struct Pool {
    conns: Mutex<HashMap<String, Arc<Conn>>>,
}

impl Pool {
    /// An open connection to `addr`, establishing one if needed. A
    /// cached connection that has gone dead is replaced.
    pub async fn connect(&self, addr: &str) -> Result<Arc<Conn>, Error> {
        let mut conns = self.conns.lock().await;
        if let Some(conn) = conns.get(addr) {
            if conn.client.is_connected() {
                return Ok(Arc::clone(conn));
            }
            log::debug!("Dropping dead RPC connection to {addr}");
            conns.remove(addr);
        }

        let url = if addr.contains("://") {
            addr.to_owned()
        } else {
            format!("ws://{addr}")
        };
        let client = WsClientBuilder::default().build(&url).await.map_err(client_error)?;
        let conn = Arc::new(Conn {
            addr: addr.to_owned(),
            client,
            stream_lock: Mutex::new(()),
        });
        conns.insert(addr.to_owned(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Forget the connection to `addr`. Outstanding [Conn] handles keep
    /// working until dropped.
    pub async fn disconnect(&self, addr: &str) {
        self.conns.lock().await.remove(addr);
    }
}

#[async_trait::async_trait]
impl Unit for Pool {
    fn manifest(&self) -> Manifest {
        Manifest::new("rpc-client-pool")
    }

    async fn dispose(&self) -> Result<(), Error> {
        self.conns.lock().await.clear();
        Ok(())
    }
}
