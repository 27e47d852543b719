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

//! The metrics service: latest-sample inventory plus live streaming.
//!
//! The service keeps the most recent [Measurement] per name, fed from
//! the bus. `metrics_list` returns that inventory plus a synthetic `bus`
//! measurement carrying the bus drop counter; `metrics_stream` forwards
//! measurements as they are published.

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use parking_lot::RwLock;
use tokio::time::MissedTickBehavior;

use events::{Broker, FieldValue, Measurement};
use logging::log;
use rpc::{
    client::client_error,
    subscription::{self, Pending, Reply},
    Conn, Rpc,
};
use unit::{Config, Error, Manifest, ShutdownRequest, Slots, Unit};

use crate::HEARTBEAT_PERIOD;

pub const SERVICE_NAME: &str = "metrics";

#[rpc(server, client, namespace = "metrics")]
pub trait MetricsRpc {
    /// The latest sample of every known measurement.
    #[method(name = "list")]
    async fn list(&self) -> RpcResult<Vec<Measurement>>;

    /// Measurements as they are published. An empty `name` matches all;
    /// `null` items are keep-alive heartbeats.
    #[subscription(name = "stream", unsubscribe = "stream_stop", item = Option<Measurement>)]
    async fn stream(&self, name: String) -> jsonrpsee::core::SubscriptionResult;
}

type Store = Arc<RwLock<HashMap<String, Measurement>>>;

fn bus_measurement(dropped: u64) -> Measurement {
    Measurement::new("bus").metric("dropped", FieldValue::Uint64(Some(dropped)))
}

struct MetricsHandler {
    store: Store,
    broker: Arc<dyn Broker>,
    rpc: Arc<Rpc>,
}

#[async_trait::async_trait]
impl MetricsRpcServer for MetricsHandler {
    async fn list(&self) -> RpcResult<Vec<Measurement>> {
        let mut samples: Vec<Measurement> = self.store.read().values().cloned().collect();
        samples.push(bus_measurement(self.broker.dropped()));
        samples.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(samples)
    }

    async fn stream(&self, pending: Pending, name: String) -> Reply {
        let mut events = self.broker.subscribe();
        let mut ctx = self.rpc.stream_context();
        let sink = subscription::accept(pending).await?;
        log::debug!("Metrics stream attached (filter {name:?})");

        let mut heartbeat = tokio::time::interval(HEARTBEAT_PERIOD);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.reset();

        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = sink.closed() => break,
                _ = heartbeat.tick() => {
                    if sink.send(&None::<Measurement>).await.is_err() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    None => break,
                    Some(event) => {
                        if let Some(sample) = event.measurement() {
                            if name.is_empty() || sample.name == name {
                                if sink.send(&Some(sample.clone())).await.is_err() {
                                    break;
                                }
                                heartbeat.reset();
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// The metrics service unit.
#[derive(Default)]
pub struct MetricsService {
    rpc: OnceLock<Arc<Rpc>>,
    broker: OnceLock<Arc<dyn Broker>>,
    store: Store,
}

impl MetricsService {
    fn broker(&self) -> Result<&Arc<dyn Broker>, Error> {
        self.broker.get().ok_or_else(|| Error::internal("metrics-service", "not wired"))
    }
}

#[async_trait::async_trait]
impl Unit for MetricsService {
    fn manifest(&self) -> Manifest {
        Manifest::new("metrics-service").requires::<Rpc>().requires::<dyn Broker>()
    }

    fn wire(&self, slots: &Slots) -> Result<(), Error> {
        self.rpc
            .set(slots.get::<Rpc>()?)
            .map_err(|_| Error::OutOfOrder("metrics service wired twice"))?;
        self.broker
            .set(slots.get::<dyn Broker>()?)
            .map_err(|_| Error::OutOfOrder("metrics service wired twice"))
    }

    async fn construct(&self, _config: &Config) -> Result<(), Error> {
        let rpc = self
            .rpc
            .get()
            .ok_or_else(|| Error::internal("metrics-service", "not wired"))?;
        let handler = MetricsHandler {
            store: Arc::clone(&self.store),
            broker: Arc::clone(self.broker()?),
            rpc: Arc::clone(rpc),
        };
        rpc.register(handler.into_rpc())
    }

    /// Track the latest sample per measurement name until shutdown.
    async fn run(&self, mut shutdown: ShutdownRequest) -> Result<(), Error> {
        let mut events = self.broker()?.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                event = events.recv() => match event {
                    None => return Ok(()),
                    Some(event) => {
                        if let Some(sample) = event.measurement() {
                            self.store.write().insert(sample.name.clone(), sample.clone());
                        }
                    }
                }
            }
        }
    }
}

/// Typed client stub over a pooled connection.
pub struct MetricsStub {
    conn: Arc<Conn>,
}

impl MetricsStub {
    pub fn new(conn: Arc<Conn>) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<Measurement>, Error> {
        MetricsRpcClient::list(self.conn.client()).await.map_err(client_error)
    }
}

/// Stub constructor for the registry; see [crate::ping::stub_ctor].
pub fn stub_ctor(conn: &(dyn Any + Send + Sync)) -> Box<dyn Any + Send + Sync> {
    match conn.downcast_ref::<Arc<Conn>>() {
        Some(conn) => Box::new(MetricsStub::new(Arc::clone(conn))),
        None => Box::new(()),
    }
}
