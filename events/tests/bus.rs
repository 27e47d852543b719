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

//! Delivery, back-pressure and teardown behaviour of the bus.

use std::time::Duration;

use events::{Broker, Bus, Event, Payload};
use unit::{Config, Unit, VersionInfo};

fn event(n: usize) -> Event {
    Event::new(format!("event-{n}"), Payload::Heartbeat)
}

fn version() -> VersionInfo {
    VersionInfo {
        name: "bus-test".into(),
        tag: "0.0.0".into(),
        branch: "main".into(),
        commit: "0000000".into(),
        rustc: "unknown".into(),
        build_time: "unknown".into(),
    }
}

/// Run the bus through define/parse/construct with the given arguments.
async fn bus_with_args(args: &[&str]) -> Bus {
    let mut full = vec!["bus-test".to_owned()];
    full.extend(args.iter().map(|a| a.to_string()));
    let mut config = Config::new("bus-test", version(), full);

    let bus = Bus::default();
    bus.define(&mut config).unwrap();
    assert!(matches!(config.parse().unwrap(), unit::config::ParseOutcome::Ready));
    bus.construct(&config).await.unwrap();
    bus
}

#[tokio::test]
async fn events_arrive_in_emission_order() {
    let bus = bus_with_args(&[]).await;
    let mut sub = bus.subscribe();

    for n in 0..10 {
        bus.emit(event(n), false).await;
    }
    for n in 0..10 {
        let received = sub.recv().await.unwrap();
        assert_eq!(received.name, format!("event-{n}"));
    }
    assert_eq!(bus.dropped(), 0);
}

#[tokio::test]
async fn slow_subscriber_loses_events_not_the_publisher() {
    let bus = bus_with_args(&["--event-buffer", "4"]).await;
    let mut slow = bus.subscribe();

    // Nothing consumes while 20 events are emitted; the publisher must
    // not block and only the first 4 may survive.
    let emit_all = async {
        for n in 0..20 {
            bus.emit(event(n), false).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(1), emit_all)
        .await
        .expect("non-blocking emit must not stall");

    assert_eq!(bus.dropped(), 16);
    for n in 0..4 {
        let received = slow.recv().await.unwrap();
        assert_eq!(received.name, format!("event-{n}"));
    }
}

#[tokio::test]
async fn fast_subscriber_sees_everything_alongside_a_slow_one() {
    let bus = std::sync::Arc::new(bus_with_args(&["--event-buffer", "4"]).await);
    let mut slow = bus.subscribe();
    let mut fast = bus.subscribe();

    let reader = tokio::spawn(async move {
        for n in 0..20 {
            let received = fast.recv().await.unwrap();
            assert_eq!(received.name, format!("event-{n}"));
        }
    });

    for n in 0..20 {
        bus.emit(event(n), false).await;
        tokio::task::yield_now().await;
    }

    tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("fast subscriber must receive every event")
        .unwrap();

    // The idle subscriber kept only what its buffer could hold.
    assert_eq!(bus.dropped(), 16);
    for n in 0..4 {
        assert_eq!(slow.recv().await.unwrap().name, format!("event-{n}"));
    }
}

#[tokio::test]
async fn a_new_subscription_only_sees_later_events() {
    let bus = bus_with_args(&[]).await;
    let mut first = bus.subscribe();
    bus.emit(event(0), false).await;
    assert_eq!(first.recv().await.unwrap().name, "event-0");
    first.unsubscribe();

    // Emitted between the two subscriptions; nobody receives it.
    bus.emit(event(1), false).await;

    let mut second = bus.subscribe();
    bus.emit(event(2), false).await;
    assert_eq!(second.recv().await.unwrap().name, "event-2");
    assert_eq!(bus.dropped(), 0);
}

#[tokio::test]
async fn blocking_emit_waits_for_space() {
    let bus = std::sync::Arc::new(bus_with_args(&["--event-buffer", "1"]).await);
    let mut sub = bus.subscribe();

    let publisher = {
        let bus = std::sync::Arc::clone(&bus);
        tokio::spawn(async move {
            for n in 0..5 {
                bus.emit(event(n), true).await;
            }
        })
    };

    for n in 0..5 {
        let received = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("blocked publisher must resume")
            .unwrap();
        assert_eq!(received.name, format!("event-{n}"));
    }
    publisher.await.unwrap();
    assert_eq!(bus.dropped(), 0);
}

#[tokio::test]
async fn unsubscribed_receivers_do_not_count_as_drops() {
    let bus = bus_with_args(&[]).await;
    let sub = bus.subscribe();
    sub.unsubscribe();

    bus.emit(event(0), false).await;
    assert_eq!(bus.dropped(), 0);
}

#[tokio::test]
async fn dispose_closes_all_subscriptions() {
    let bus = bus_with_args(&[]).await;
    let mut sub = bus.subscribe();
    bus.emit(event(0), false).await;
    bus.dispose().await.unwrap();

    // The buffered event is still delivered, then the stream ends.
    assert_eq!(sub.recv().await.unwrap().name, "event-0");
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn zero_buffer_capacity_is_rejected() {
    let mut config = Config::new(
        "bus-test",
        version(),
        vec!["bus-test".into(), "--event-buffer".into(), "0".into()],
    );
    let bus = Bus::default();
    bus.define(&mut config).unwrap();
    assert!(matches!(config.parse().unwrap(), unit::config::ParseOutcome::Ready));
    assert!(matches!(
        bus.construct(&config).await,
        Err(unit::Error::BadParameter(_))
    ));
}
