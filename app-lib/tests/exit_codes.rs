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

//! End-to-end exit code behavior of an assembled application.

use std::sync::Arc;

use parking_lot::Mutex;

use app_lib::{setup, Options};
use unit::{Config, Error, Manifest, Unit, VersionInfo};

fn version() -> VersionInfo {
    VersionInfo {
        name: "app".into(),
        tag: "0.0.0".into(),
        branch: "main".into(),
        commit: "0000000".into(),
        rustc: "unknown".into(),
        build_time: "unknown".into(),
    }
}

fn options(args: &[&str]) -> Options {
    Options::from_args(args.iter().copied())
}

/// A root unit with a `greet` command that records its arguments.
struct Greeter {
    calls: Arc<Mutex<Vec<String>>>,
    outcome: fn() -> Result<(), Error>,
}

impl Greeter {
    fn new(outcome: fn() -> Result<(), Error>) -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let unit = Arc::new(Self {
            calls: Arc::clone(&calls),
            outcome,
        });
        (unit, calls)
    }
}

impl Unit for Greeter {
    fn manifest(&self) -> Manifest {
        Manifest::new("greeter")
    }

    fn define(&self, config: &mut Config) -> Result<(), Error> {
        let calls = Arc::clone(&self.calls);
        let outcome = self.outcome;
        config.command("greet", "Greet the given names", move |ctx| {
            let calls = Arc::clone(&calls);
            async move {
                calls.lock().push(ctx.args.join(" "));
                outcome()
            }
        })
    }
}

#[tokio::test]
async fn selected_command_runs_and_exits_cleanly() {
    let (greeter, calls) = Greeter::new(|| Ok(()));
    let app = setup(
        options(&["app", "--rpc-addr", "127.0.0.1:0", "greet", "hello", "world"]),
        version(),
        vec![greeter],
    )
    .unwrap();

    assert_eq!(app.main().await, 0);
    assert_eq!(*calls.lock(), vec!["hello world".to_owned()]);
}

#[tokio::test]
async fn failing_command_exits_one() {
    let (greeter, _calls) = Greeter::new(|| Err(Error::Unit("boom".into())));
    let app = setup(
        options(&["app", "--rpc-addr", "127.0.0.1:0", "greet"]),
        version(),
        vec![greeter],
    )
    .unwrap();

    assert_eq!(app.main().await, 1);
}

#[tokio::test]
async fn help_error_from_a_handler_prints_usage_and_exits_zero() {
    let (greeter, _calls) = Greeter::new(|| Err(Error::Help));
    let app = setup(
        options(&["app", "--rpc-addr", "127.0.0.1:0", "greet"]),
        version(),
        vec![greeter],
    )
    .unwrap();

    assert_eq!(app.main().await, 0);
}

#[tokio::test]
async fn unknown_flag_is_a_usage_error() {
    let (greeter, calls) = Greeter::new(|| Ok(()));
    let app = setup(
        options(&["app", "--definitely-not-a-flag"]),
        version(),
        vec![greeter],
    )
    .unwrap();

    assert_eq!(app.main().await, 2);
    assert!(calls.lock().is_empty());
}

#[tokio::test]
async fn help_flag_exits_zero() {
    let (greeter, _calls) = Greeter::new(|| Ok(()));
    let app = setup(options(&["app", "--help"]), version(), vec![greeter]).unwrap();

    assert_eq!(app.main().await, 0);
}

#[tokio::test]
async fn controller_stops_a_serving_application() {
    let app = setup(
        options(&["app", "--rpc-addr", "127.0.0.1:0"]),
        version(),
        vec![],
    )
    .unwrap();

    let controller = app.controller().clone();
    let task = tokio::spawn(app.main());

    // The server is up once an address is published.
    let addr = controller.rpc().local_addr_ready().await.unwrap();
    assert_ne!(addr.port(), 0);

    controller.shutdown();
    assert_eq!(task.await.unwrap(), 0);
}
