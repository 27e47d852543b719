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

//! Server lifecycle, reflection and client pool behaviour.

use std::{sync::Arc, time::Duration};

use jsonrpsee::core::{client::ClientT, server::RpcModule};
use rpc::{Builder, Pool, Rpc};
use unit::{
    Config, Manager, ManagerConfig, Report, ResolvedUnit, ShutdownTrigger, VersionInfo,
};

fn version() -> VersionInfo {
    VersionInfo {
        name: "rpc-test".into(),
        tag: "0.0.0".into(),
        branch: "main".into(),
        commit: "0000000".into(),
        rustc: "unknown".into(),
        build_time: "unknown".into(),
    }
}

fn hello_module() -> RpcModule<()> {
    let mut module = RpcModule::new(());
    module.register_method("test_hello", |_params, _ctx| "hello".to_owned()).unwrap();
    module
}

/// Run the given server unit under a manager and wait for it to bind.
async fn serve(rpc: Arc<Rpc>) -> (ShutdownTrigger, tokio::task::JoinHandle<Report>) {
    let resolved = vec![ResolvedUnit {
        name: "rpc-server".into(),
        unit: rpc.clone(),
    }];
    let manager = Manager::new(ManagerConfig::new("rpc-test"), resolved);
    let trigger = manager.make_shutdown_trigger();
    let config = Config::new("rpc-test", version(), vec!["rpc-test".into()]);
    let task = tokio::spawn(manager.main(config));
    (trigger, task)
}

#[tokio::test]
async fn serves_methods_and_reflection_list() {
    let rpc = Arc::new(
        Builder::new("127.0.0.1:0")
            .register(hello_module())
            .unwrap()
            .with_method_list("rpc_methods")
            .build(),
    );
    let (trigger, task) = serve(Arc::clone(&rpc)).await;
    let addr = rpc.local_addr_ready().await.unwrap();

    let pool = Pool::default();
    let conn = pool.connect(&addr.to_string()).await.unwrap();

    let greeting: String = conn.client().request("test_hello", jsonrpsee::rpc_params![]).await.unwrap();
    assert_eq!(greeting, "hello");

    let methods = conn.list_methods("rpc_methods").await.unwrap();
    assert!(methods.contains(&"test_hello".to_owned()));
    assert!(methods.contains(&"rpc_methods".to_owned()));

    trigger.initiate();
    let report = task.await.unwrap();
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn duplicate_method_registration_is_rejected() {
    let builder = Builder::new("127.0.0.1:0").register(hello_module()).unwrap();
    assert!(matches!(
        builder.register(hello_module()),
        Err(unit::Error::DuplicateEntry(_))
    ));
}

#[tokio::test]
async fn registration_after_start_is_out_of_order() {
    let rpc = Arc::new(Builder::new("127.0.0.1:0").build());
    let (trigger, task) = serve(Arc::clone(&rpc)).await;
    rpc.local_addr_ready().await.unwrap();

    assert!(matches!(
        rpc.register(hello_module()),
        Err(unit::Error::OutOfOrder(_))
    ));

    trigger.initiate();
    task.await.unwrap();
}

#[tokio::test]
async fn stop_is_idempotent_and_cancels_stream_contexts() {
    let rpc = Arc::new(Builder::new("127.0.0.1:0").build());
    let (trigger, task) = serve(Arc::clone(&rpc)).await;
    rpc.local_addr_ready().await.unwrap();
    let mut ctx = rpc.stream_context();

    rpc.stop(false).await;
    rpc.stop(true).await;
    assert_eq!(rpc.local_addr(), None);

    tokio::time::timeout(Duration::from_secs(1), ctx.cancelled())
        .await
        .expect("stream context must cancel when the server stops");

    trigger.initiate();
    let report = task.await.unwrap();
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn bound_address_is_published_without_watchers() {
    let rpc = Arc::new(Builder::new("127.0.0.1:0").build());
    let (trigger, task) = serve(Arc::clone(&rpc)).await;

    // Only poll the plain accessor; no watch subscription exists while
    // the server comes up.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if rpc.local_addr().is_some() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "server never published its address");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    trigger.initiate();
    let report = task.await.unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(rpc.local_addr(), None);
}

#[tokio::test]
async fn pool_reuses_connections_per_address() {
    let rpc = Arc::new(Builder::new("127.0.0.1:0").register(hello_module()).unwrap().build());
    let (trigger, task) = serve(Arc::clone(&rpc)).await;
    let addr = rpc.local_addr_ready().await.unwrap().to_string();

    let pool = Pool::default();
    let a = pool.connect(&addr).await.unwrap();
    let b = pool.connect(&addr).await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    pool.disconnect(&addr).await;
    let c = pool.connect(&addr).await.unwrap();
    assert!(!Arc::ptr_eq(&a, &c));

    trigger.initiate();
    task.await.unwrap();
}

#[tokio::test]
async fn invalid_listen_address_fails_the_unit() {
    let rpc = Arc::new(Builder::new("not-an-address").build());
    let (_trigger, task) = serve(Arc::clone(&rpc)).await;
    let report = task.await.unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0].error, unit::Error::BadParameter(_)));
}
