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

//! The input service: a live stream of user input events.

use std::{
    any::Any,
    sync::{Arc, OnceLock},
};

use jsonrpsee::proc_macros::rpc;
use tokio::time::MissedTickBehavior;

use events::{Broker, InputEvent};
use logging::log;
use rpc::{
    subscription::{self, Pending, Reply},
    Conn, Rpc,
};
use unit::{Config, Error, Manifest, Slots, Unit};

use crate::HEARTBEAT_PERIOD;

pub const SERVICE_NAME: &str = "input";

#[rpc(server, client, namespace = "input")]
pub trait InputRpc {
    /// Input events as they are reported by input driver units; `null`
    /// items are keep-alive heartbeats.
    #[subscription(name = "stream", unsubscribe = "stream_stop", item = Option<InputEvent>)]
    async fn stream(&self) -> jsonrpsee::core::SubscriptionResult;
}

struct InputHandler {
    broker: Arc<dyn Broker>,
    rpc: Arc<Rpc>,
}

#[async_trait::async_trait]
impl InputRpcServer for InputHandler {
    async fn stream(&self, pending: Pending) -> Reply {
        let mut events = self.broker.subscribe();
        let mut ctx = self.rpc.stream_context();
        let sink = subscription::accept(pending).await?;
        log::debug!("Input stream attached");

        let mut heartbeat = tokio::time::interval(HEARTBEAT_PERIOD);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.reset();

        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = sink.closed() => break,
                _ = heartbeat.tick() => {
                    if sink.send(&None::<InputEvent>).await.is_err() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    None => break,
                    Some(event) => {
                        if let Some(input) = event.input() {
                            if sink.send(&Some(input.clone())).await.is_err() {
                                break;
                            }
                            heartbeat.reset();
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// The input service unit.
#[derive(Default)]
pub struct InputService {
    rpc: OnceLock<Arc<Rpc>>,
    broker: OnceLock<Arc<dyn Broker>>,
}

#[async_trait::async_trait]
impl Unit for InputService {
    fn manifest(&self) -> Manifest {
        Manifest::new("input-service").requires::<Rpc>().requires::<dyn Broker>()
    }

    fn wire(&self, slots: &Slots) -> Result<(), Error> {
        self.rpc
            .set(slots.get::<Rpc>()?)
            .map_err(|_| Error::OutOfOrder("input service wired twice"))?;
        self.broker
            .set(slots.get::<dyn Broker>()?)
            .map_err(|_| Error::OutOfOrder("input service wired twice"))
    }

    async fn construct(&self, _config: &Config) -> Result<(), Error> {
        let rpc = self
            .rpc
            .get()
            .ok_or_else(|| Error::internal("input-service", "not wired"))?;
        let broker = self
            .broker
            .get()
            .ok_or_else(|| Error::internal("input-service", "not wired"))?;
        let handler = InputHandler {
            broker: Arc::clone(broker),
            rpc: Arc::clone(rpc),
        };
        rpc.register(handler.into_rpc())
    }
}

/// Typed client stub over a pooled connection.
pub struct InputStub {
    conn: Arc<Conn>,
}

impl InputStub {
    pub fn new(conn: Arc<Conn>) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Arc<Conn> {
        &self.conn
    }
}

/// Stub constructor for the registry; see [crate::ping::stub_ctor].
pub fn stub_ctor(conn: &(dyn Any + Send + Sync)) -> Box<dyn Any + Send + Sync> {
    match conn.downcast_ref::<Arc<Conn>>() {
        Some(conn) => Box::new(InputStub::new(Arc::clone(conn))),
        None => Box::new(()),
    }
}
