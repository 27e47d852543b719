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

//! The RPC server unit.
//!
//! Service units merge their method handlers into the shared [Rpc] unit
//! during construct; the server itself binds and starts when the run
//! phase begins and stops on shutdown. Server streams obtain a
//! [StreamContext] so they wind down together with the server.

pub mod client;
pub mod subscription;

use std::net::SocketAddr;

use jsonrpsee::{
    core::server::RpcModule,
    server::{ServerBuilder, ServerHandle},
};
use tokio::sync::{broadcast, watch};

use logging::log;
use unit::{Config, Error, Flag, Manifest, ShutdownRequest, Unit};
use utils::set_flag::SetFlag;

pub use client::{Conn, Pool};
pub use jsonrpsee::{core::server::Methods, core::RpcResult, proc_macros::rpc};

/// Default listen address, overridable with `--rpc-addr`.
pub const DEFAULT_ADDR: &str = "127.0.0.1:3030";

/// Populates an [Rpc] unit with pre-registered method handlers. Most
/// applications bind the unit through the registry instead and let
/// services register themselves; the builder exists for embedding and
/// tests.
pub struct Builder {
    addr: String,
    methods: Methods,
    method_list: Option<&'static str>,
}

impl Builder {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            methods: Methods::new(),
            method_list: None,
        }
    }

    /// Add method handlers to the server.
    pub fn register(mut self, methods: impl Into<Methods>) -> Result<Self, Error> {
        self.methods
            .merge(methods)
            .map_err(|e| Error::DuplicateEntry(format!("RPC method already registered: {e}")))?;
        Ok(self)
    }

    /// Also serve a reflection method with the given name that returns
    /// the names of all registered methods.
    pub fn with_method_list(mut self, name: &'static str) -> Self {
        self.method_list = Some(name);
        self
    }

    pub fn build(self) -> Rpc {
        let rpc = Rpc::default();
        *rpc.default_addr.lock() = self.addr;
        *rpc.methods.lock() = self.methods;
        *rpc.method_list.lock() = self.method_list;
        rpc
    }
}

/// Resolves once the RPC server stops; handed to server-stream
/// implementations so they terminate with the server.
pub struct StreamContext {
    rx: broadcast::Receiver<()>,
}

impl StreamContext {
    pub async fn cancelled(&mut self) {
        // Both a cancel message and a closed channel mean "stop".
        let _ = self.rx.recv().await;
    }
}

/// The RPC server unit.
pub struct Rpc {
    default_addr: parking_lot::Mutex<String>,
    methods: parking_lot::Mutex<Methods>,
    method_list: parking_lot::Mutex<Option<&'static str>>,
    addr_flag: std::sync::OnceLock<Flag<String>>,
    started: SetFlag,
    addr_tx: watch::Sender<Option<SocketAddr>>,
    handle: parking_lot::Mutex<Option<ServerHandle>>,
    cancel_tx: broadcast::Sender<()>,
}

impl Default for Rpc {
    fn default() -> Self {
        let (addr_tx, _addr_rx) = watch::channel(None);
        let (cancel_tx, _cancel_rx) = broadcast::channel(1);
        Self {
            default_addr: parking_lot::Mutex::new(DEFAULT_ADDR.to_owned()),
            methods: parking_lot::Mutex::new(Methods::new()),
            method_list: parking_lot::Mutex::new(None),
            addr_flag: std::sync::OnceLock::new(),
            started: SetFlag::new(),
            addr_tx,
            handle: parking_lot::Mutex::new(None),
            cancel_tx,
        }
    }
}

impl Rpc {
    /// Merge method handlers into the server. Only valid before the
    /// server starts, i.e. during construct.
    pub fn register(&self, methods: impl Into<Methods>) -> Result<(), Error> {
        if self.started.test() {
            return Err(Error::OutOfOrder(
                "RPC methods must be registered before the server starts",
            ));
        }
        self.methods
            .lock()
            .merge(methods)
            .map_err(|e| Error::DuplicateEntry(format!("RPC method already registered: {e}")))
    }

    /// See [Builder::with_method_list].
    pub fn enable_method_list(&self, name: &'static str) -> Result<(), Error> {
        if self.started.test() {
            return Err(Error::OutOfOrder(
                "the method list must be enabled before the server starts",
            ));
        }
        *self.method_list.lock() = Some(name);
        Ok(())
    }

    /// The bound address, once the server is up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.addr_tx.borrow()
    }

    /// Wait for the server to come up and return its bound address.
    /// Fails with [Error::Cancelled] if the unit is dropped first.
    pub async fn local_addr_ready(&self) -> Result<SocketAddr, Error> {
        let mut rx = self.addr_tx.subscribe();
        loop {
            if let Some(addr) = *rx.borrow_and_update() {
                return Ok(addr);
            }
            rx.changed().await.map_err(|_| Error::Cancelled)?;
        }
    }

    /// A context that resolves when the server stops.
    pub fn stream_context(&self) -> StreamContext {
        StreamContext {
            rx: self.cancel_tx.subscribe(),
        }
    }

    /// Stop the server. Graceful stop waits for in-flight calls to
    /// finish; `force` abandons them. Idempotent.
    pub async fn stop(&self, force: bool) {
        let handle = self.handle.lock().take();
        let _ = self.cancel_tx.send(());
        if let Some(handle) = handle {
            match handle.stop() {
                Ok(()) => {
                    if !force {
                        handle.stopped().await;
                    }
                }
                // Already stopped elsewhere.
                Err(_) => (),
            }
        }
        // send_replace publishes even when nobody is watching yet.
        self.addr_tx.send_replace(None);
    }

    fn final_methods(&self) -> Result<Methods, Error> {
        let mut methods = self.methods.lock().clone();
        if let Some(list_name) = *self.method_list.lock() {
            let mut names: Vec<String> = methods.method_names().map(|n| n.to_owned()).collect();
            names.push(list_name.to_owned());
            names.sort();
            let mut module = RpcModule::new(());
            module
                .register_method(list_name, move |_params, _ctx| names.clone())
                .map_err(|e| {
                    Error::DuplicateEntry(format!("RPC method already registered: {e}"))
                })?;
            methods.merge(module).map_err(|e| {
                Error::DuplicateEntry(format!("RPC method already registered: {e}"))
            })?;
        }
        Ok(methods)
    }
}

#[async_trait::async_trait]
impl Unit for Rpc {
    fn manifest(&self) -> Manifest {
        Manifest::new("rpc-server")
    }

    fn define(&self, config: &mut Config) -> Result<(), Error> {
        let default_addr = self.default_addr.lock().clone();
        let flag = config.flag_string(
            "rpc-addr",
            &default_addr,
            "RPC listen address (host:port)",
            &[],
        )?;
        let _ = self.addr_flag.set(flag);
        Ok(())
    }

    async fn run(&self, mut shutdown: ShutdownRequest) -> Result<(), Error> {
        self.started.set();
        let addr_text = match self.addr_flag.get() {
            Some(flag) => flag.get(),
            None => self.default_addr.lock().clone(),
        };
        let addr: SocketAddr = addr_text
            .parse()
            .map_err(|e| Error::BadParameter(format!("invalid RPC address {addr_text:?}: {e}")))?;

        let methods = self.final_methods()?;
        let server = ServerBuilder::default().build(addr).await?;
        let local_addr = server.local_addr()?;
        *self.handle.lock() = Some(server.start(methods));
        self.addr_tx.send_replace(Some(local_addr));
        log::info!("RPC server listening on {local_addr}");

        shutdown.recv().await;
        self.stop(false).await;
        Ok(())
    }

    async fn dispose(&self) -> Result<(), Error> {
        self.stop(false).await;
        Ok(())
    }
}
