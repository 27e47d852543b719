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

//! Thin wrappers over jsonrpsee subscription sinks.
//!
//! Stream method bodies accept the pending subscription, then loop
//! sending items until the client goes away or the [crate::StreamContext]
//! fires. `Err(Error::Cancelled)` from [Active::send] means the client is
//! gone; it is not a failure.

use jsonrpsee::core::server::{PendingSubscriptionSink, SubscriptionMessage, SubscriptionSink};

use unit::Error;

/// A subscription the server has not accepted yet.
pub type Pending = PendingSubscriptionSink;

/// The result type stream method bodies return to jsonrpsee.
pub type Reply = jsonrpsee::core::SubscriptionResult;

/// An accepted subscription ready to carry items.
pub struct Active {
    sink: SubscriptionSink,
}

/// Accept the subscription, completing the client's subscribe call.
pub async fn accept(pending: Pending) -> Result<Active, Error> {
    let sink = pending
        .accept()
        .await
        .map_err(|e| Error::Unit(format!("subscription rejected: {e}")))?;
    Ok(Active { sink })
}

impl Active {
    /// Send one item. [Error::Cancelled] means the subscriber is gone.
    pub async fn send<T: serde::Serialize>(&self, item: &T) -> Result<(), Error> {
        let message = SubscriptionMessage::from_json(item)
            .map_err(|e| Error::Unit(format!("subscription payload encoding: {e}")))?;
        self.sink.send(message).await.map_err(|_| Error::Cancelled)
    }

    /// Resolves when the subscriber disconnects or unsubscribes.
    pub async fn closed(&self) {
        self.sink.closed().await;
    }
}
