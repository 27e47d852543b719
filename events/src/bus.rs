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

//! The bus unit: bounded fan-out of [Event]s to subscribers.

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc, OnceLock, Weak,
};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use logging::log;
use unit::{Config, Error, Flag, Manifest, Unit};

use crate::event::Event;

/// Default per-subscriber buffer capacity.
pub const DEFAULT_BUFFER: usize = 64;

/// The publish/subscribe capability exposed by the [Bus] unit.
#[async_trait::async_trait]
pub trait Broker: Send + Sync {
    /// Open a subscription receiving every subsequently emitted event.
    fn subscribe(&self) -> Subscription;

    /// Publish an event to all current subscribers.
    ///
    /// Non-blocking emit never waits: events that do not fit a
    /// subscriber's buffer are dropped for that subscriber and counted.
    /// Blocking emit waits for space in every buffer and is only for
    /// publishers that can tolerate back-pressure.
    async fn emit(&self, event: Event, blocking: bool);

    /// Total events dropped for slow subscribers since startup.
    fn dropped(&self) -> u64;
}

struct Entry {
    id: u64,
    tx: mpsc::Sender<Event>,
}

struct Inner {
    subs: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
    dropped: AtomicU64,
    capacity: AtomicUsize,
}

impl Inner {
    fn remove(&self, id: u64) {
        self.subs.write().retain(|entry| entry.id != id);
    }
}

/// The receiving end of a bus subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Event>,
    inner: Weak<Inner>,
}

impl Subscription {
    /// The next event, or `None` once the bus has shut down.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Detach from the bus. Buffered events are discarded.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(self.id);
        }
    }
}

/// The event bus unit, bound as the `dyn Broker` capability.
pub struct Bus {
    inner: Arc<Inner>,
    buffer_flag: OnceLock<Flag<u64>>,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                subs: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                capacity: AtomicUsize::new(DEFAULT_BUFFER),
            }),
            buffer_flag: OnceLock::new(),
        }
    }
}

#[async_trait::async_trait]
impl Broker for Bus {
    fn subscribe(&self) -> Subscription {
        let capacity = self.inner.capacity.load(Ordering::Relaxed).max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subs.write().push(Entry { id, tx });
        Subscription {
            id,
            rx,
            inner: Arc::downgrade(&self.inner),
        }
    }

    async fn emit(&self, event: Event, blocking: bool) {
        if blocking {
            // Clone the senders out so the lock is not held across await.
            let txs: Vec<mpsc::Sender<Event>> =
                self.inner.subs.read().iter().map(|entry| entry.tx.clone()).collect();
            for tx in txs {
                // A receiver dropped mid-send is not a drop, just gone.
                let _ = tx.send(event.clone()).await;
            }
            return;
        }

        let mut stale = Vec::new();
        {
            let subs = self.inner.subs.read();
            for entry in subs.iter() {
                match entry.tx.try_send(event.clone()) {
                    Ok(()) => (),
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => stale.push(entry.id),
                }
            }
        }
        if !stale.is_empty() {
            self.inner.subs.write().retain(|entry| !stale.contains(&entry.id));
        }
    }

    fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Unit for Bus {
    fn manifest(&self) -> Manifest {
        Manifest::new("event-bus")
    }

    fn define(&self, config: &mut Config) -> Result<(), Error> {
        let flag = config.flag_u64(
            "event-buffer",
            DEFAULT_BUFFER as u64,
            "Per-subscriber event buffer capacity",
            &[],
        )?;
        let _ = self.buffer_flag.set(flag);
        Ok(())
    }

    async fn construct(&self, _config: &Config) -> Result<(), Error> {
        if let Some(flag) = self.buffer_flag.get() {
            let capacity = flag.get();
            if capacity == 0 {
                return Err(Error::BadParameter("event-buffer must be positive".into()));
            }
            self.inner.capacity.store(capacity as usize, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn dispose(&self) -> Result<(), Error> {
        // Dropping the senders closes every subscription.
        let closed = self.inner.subs.write().drain(..).count();
        if closed > 0 {
            log::debug!("Event bus closed {closed} open subscriptions");
        }
        Ok(())
    }
}
