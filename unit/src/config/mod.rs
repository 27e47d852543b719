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

//! Command-line configuration shared by all units.
//!
//! Units declare typed flags and commands during the define phase; the
//! orchestrator then parses the argument list once and the declared
//! [Flag] handles become readable. Declaring anything after the parse is
//! an [Error::OutOfOrder] bug in the calling unit.

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use clap::{error::ErrorKind, Arg, ArgAction, ArgMatches, Command};
use futures::future::BoxFuture;

use utils::set_flag::SetFlag;

use crate::Error;

/// Flag names owned by the framework itself.
const RESERVED_FLAGS: &[&str] = &["help", "version", "debug", "verbose", "args"];

/// A handle to a declared flag. Reads return the parsed value once the
/// argument list has been processed, and the declared default before that
/// or when the flag was not given.
#[derive(Clone, Debug)]
pub struct Flag<T> {
    value: Arc<OnceLock<T>>,
    default: T,
}

impl<T: Clone> Flag<T> {
    pub fn get(&self) -> T {
        self.value.get().unwrap_or(&self.default).clone()
    }
}

/// Build and version metadata, baked in by the application's build script
/// and served over RPC by the ping service.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub tag: String,
    pub branch: String,
    pub commit: String,
    pub rustc: String,
    pub build_time: String,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}@{}, rustc {}, built {})",
            self.name, self.tag, self.branch, self.commit, self.rustc, self.build_time
        )
    }
}

/// Arguments handed to a command handler.
pub struct CommandContext {
    pub command: String,
    pub args: Vec<String>,
}

pub type CommandHandler =
    Arc<dyn Fn(CommandContext) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

struct FlagDecl {
    name: &'static str,
    commands: Vec<&'static str>,
    arg: Arg,
    apply: Box<dyn Fn(&ArgMatches) + Send + Sync>,
}

struct CommandDecl {
    name: &'static str,
    about: &'static str,
    handler: CommandHandler,
}

/// Outcome of parsing the argument list.
pub enum ParseOutcome {
    /// Arguments accepted; execution proceeds.
    Ready,
    /// Help or version output was requested; print to stdout and exit 0.
    Help(String),
    /// The arguments were rejected; print to stderr and exit 2.
    Usage(String),
}

/// The shared configuration surface. One instance exists per application;
/// the orchestrator hands it mutably to each unit's define phase and
/// immutably afterwards.
pub struct Config {
    program: String,
    version: VersionInfo,
    raw_args: Vec<String>,
    sealed: SetFlag,
    flags: Vec<FlagDecl>,
    commands: Vec<CommandDecl>,
    selected: Option<String>,
    positional: Vec<String>,
    debug: bool,
    verbose: bool,
    usage: String,
}

impl Config {
    /// `args` is the full argument list including the program name, as
    /// produced by `std::env::args()`.
    pub fn new(program: impl Into<String>, version: VersionInfo, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            version,
            raw_args: args,
            sealed: SetFlag::new(),
            flags: Vec::new(),
            commands: Vec::new(),
            selected: None,
            positional: Vec::new(),
            debug: false,
            verbose: false,
            usage: String::new(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn version(&self) -> &VersionInfo {
        &self.version
    }

    /// True once `--debug` was given.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// True once `--verbose` was given.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// One-line usage string, available after parsing.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// The command selected on the command line, if any.
    pub fn selected_command(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The positional arguments: the selected command's when one was
    /// given, the root-level ones otherwise. Root-level positionals are
    /// only accepted when no commands are declared.
    pub fn args(&self) -> &[String] {
        &self.positional
    }

    /// Positional arguments following the selected command.
    pub fn command_args(&self) -> &[String] {
        &self.positional
    }

    pub fn command_handler(&self, name: &str) -> Option<CommandHandler> {
        self.commands
            .iter()
            .find(|c| c.name == name)
            .map(|c| Arc::clone(&c.handler))
    }

    /// Declare a string flag. An empty `commands` list makes the flag
    /// global; otherwise it is only accepted under the named commands.
    pub fn flag_string(
        &mut self,
        name: &'static str,
        default: &str,
        help: &'static str,
        commands: &[&'static str],
    ) -> Result<Flag<String>, Error> {
        let arg = Arg::new(name)
            .long(name)
            .help(help)
            .value_name("STRING")
            .value_parser(clap::value_parser!(String));
        self.declare(name, default.to_owned(), commands, arg)
    }

    /// Declare a boolean flag. `--name` sets it, `--name=false` clears it.
    pub fn flag_bool(
        &mut self,
        name: &'static str,
        default: bool,
        help: &'static str,
        commands: &[&'static str],
    ) -> Result<Flag<bool>, Error> {
        let arg = Arg::new(name)
            .long(name)
            .help(help)
            .action(ArgAction::Set)
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_name("BOOL")
            .value_parser(clap::value_parser!(bool));
        self.declare(name, default, commands, arg)
    }

    pub fn flag_i64(
        &mut self,
        name: &'static str,
        default: i64,
        help: &'static str,
        commands: &[&'static str],
    ) -> Result<Flag<i64>, Error> {
        let arg = Arg::new(name)
            .long(name)
            .help(help)
            .value_name("INT")
            .value_parser(clap::value_parser!(i64));
        self.declare(name, default, commands, arg)
    }

    pub fn flag_u64(
        &mut self,
        name: &'static str,
        default: u64,
        help: &'static str,
        commands: &[&'static str],
    ) -> Result<Flag<u64>, Error> {
        let arg = Arg::new(name)
            .long(name)
            .help(help)
            .value_name("UINT")
            .value_parser(clap::value_parser!(u64));
        self.declare(name, default, commands, arg)
    }

    pub fn flag_f64(
        &mut self,
        name: &'static str,
        default: f64,
        help: &'static str,
        commands: &[&'static str],
    ) -> Result<Flag<f64>, Error> {
        let arg = Arg::new(name)
            .long(name)
            .help(help)
            .value_name("FLOAT")
            .value_parser(clap::value_parser!(f64));
        self.declare(name, default, commands, arg)
    }

    /// Declare a duration flag accepting humantime syntax ("1s500ms").
    pub fn flag_duration(
        &mut self,
        name: &'static str,
        default: Duration,
        help: &'static str,
        commands: &[&'static str],
    ) -> Result<Flag<Duration>, Error> {
        let arg = Arg::new(name)
            .long(name)
            .help(help)
            .value_name("DURATION")
            .value_parser(humantime::parse_duration);
        self.declare(name, default, commands, arg)
    }

    fn declare<T: Clone + Send + Sync + 'static>(
        &mut self,
        name: &'static str,
        default: T,
        commands: &[&'static str],
        arg: Arg,
    ) -> Result<Flag<T>, Error> {
        if self.sealed.test() {
            return Err(Error::OutOfOrder(
                "flags may only be declared during the define phase",
            ));
        }
        if RESERVED_FLAGS.contains(&name) {
            return Err(Error::DuplicateEntry(format!("flag name {name:?} is reserved")));
        }
        if self.flags.iter().any(|f| f.name == name) {
            return Err(Error::DuplicateEntry(format!("flag {name:?} is already declared")));
        }

        let value = Arc::new(OnceLock::new());
        let slot = Arc::clone(&value);
        let apply = Box::new(move |matches: &ArgMatches| {
            if let Some(v) = matches.get_one::<T>(name) {
                let _ = slot.set(v.clone());
            }
        });
        self.flags.push(FlagDecl {
            name,
            commands: commands.to_vec(),
            arg,
            apply,
        });
        Ok(Flag { value, default })
    }

    /// Register a command. When the command is selected on the command
    /// line, the handler runs as a foreground unit and the application
    /// exits once it returns.
    pub fn command<F, Fut>(
        &mut self,
        name: &'static str,
        about: &'static str,
        handler: F,
    ) -> Result<(), Error>
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), Error>> + Send + 'static,
    {
        if self.sealed.test() {
            return Err(Error::OutOfOrder(
                "commands may only be declared during the define phase",
            ));
        }
        if name == "help" {
            return Err(Error::DuplicateEntry("command name \"help\" is reserved".into()));
        }
        if self.commands.iter().any(|c| c.name == name) {
            return Err(Error::DuplicateEntry(format!(
                "command {name:?} is already declared"
            )));
        }
        let handler: CommandHandler = Arc::new(move |ctx| Box::pin(handler(ctx)));
        self.commands.push(CommandDecl {
            name,
            about,
            handler,
        });
        Ok(())
    }

    fn build_command(&self) -> Command {
        let mut root = Command::new(self.program.clone())
            .version(self.version.tag.clone())
            .long_version(self.version.to_string())
            .disable_help_subcommand(true)
            .arg(
                Arg::new("debug")
                    .long("debug")
                    .help("Enable debug logging")
                    .action(ArgAction::SetTrue)
                    .global(true),
            )
            .arg(
                Arg::new("verbose")
                    .long("verbose")
                    .help("Print the full error chain on failure")
                    .action(ArgAction::SetTrue)
                    .global(true),
            );

        for decl in &self.flags {
            if decl.commands.is_empty() {
                root = root.arg(decl.arg.clone().global(true));
            }
        }

        for command in &self.commands {
            let mut sub = Command::new(command.name).about(command.about);
            for decl in &self.flags {
                if decl.commands.contains(&command.name) {
                    sub = sub.arg(decl.arg.clone());
                }
            }
            sub = sub.arg(
                Arg::new("args")
                    .value_name("ARGS")
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true),
            );
            root = root.subcommand(sub);
        }
        if self.commands.is_empty() {
            // Unlike command positionals, hyphen values stay rejected so
            // unknown flags remain usage errors.
            root = root.arg(Arg::new("args").value_name("ARGS").num_args(0..));
        } else {
            root = root.subcommand_required(true);
        }
        root
    }

    /// Parse the argument list, sealing the configuration. Called once by
    /// the orchestrator between the define and construct phases.
    pub fn parse(&mut self) -> Result<ParseOutcome, Error> {
        if !self.sealed.set() {
            return Err(Error::OutOfOrder("arguments were already parsed"));
        }

        let mut command = self.build_command();
        self.usage = command.render_usage().to_string();

        let matches = match command.try_get_matches_from(self.raw_args.clone()) {
            Ok(matches) => matches,
            Err(e) => {
                return Ok(match e.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                        ParseOutcome::Help(e.render().to_string())
                    }
                    _ => ParseOutcome::Usage(e.render().to_string()),
                })
            }
        };

        self.debug = matches.get_flag("debug");
        self.verbose = matches.get_flag("verbose");
        for decl in &self.flags {
            if decl.commands.is_empty() {
                (decl.apply)(&matches);
            }
        }

        if let Some((name, sub)) = matches.subcommand() {
            for decl in &self.flags {
                if decl.commands.contains(&name) {
                    (decl.apply)(sub);
                }
            }
            self.positional = sub
                .get_many::<String>("args")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            self.selected = Some(name.to_owned());
        } else if self.commands.is_empty() {
            self.positional = matches
                .get_many::<String>("args")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
        }

        Ok(ParseOutcome::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version() -> VersionInfo {
        VersionInfo {
            name: "testapp".into(),
            tag: "0.0.0".into(),
            branch: "main".into(),
            commit: "0000000".into(),
            rustc: "unknown".into(),
            build_time: "unknown".into(),
        }
    }

    fn config(args: &[&str]) -> Config {
        let mut full = vec!["testapp".to_owned()];
        full.extend(args.iter().map(|a| a.to_string()));
        Config::new("testapp", version(), full)
    }

    #[test]
    fn flag_defaults_and_values() {
        let mut config = config(&["--device", "/dev/i2c-1", "--retries", "3"]);
        let device = config.flag_string("device", "/dev/i2c-0", "bus device", &[]).unwrap();
        let retries = config.flag_u64("retries", 1, "retry count", &[]).unwrap();
        let rate = config.flag_f64("rate", 1.5, "sample rate", &[]).unwrap();

        assert!(matches!(config.parse().unwrap(), ParseOutcome::Ready));
        assert_eq!(device.get(), "/dev/i2c-1");
        assert_eq!(retries.get(), 3);
        assert_eq!(rate.get(), 1.5);
    }

    #[test]
    fn duration_flag_uses_humantime_syntax() {
        let mut config = config(&["--poll-interval", "1s 500ms"]);
        let interval = config
            .flag_duration("poll-interval", Duration::from_secs(5), "poll period", &[])
            .unwrap();
        assert!(matches!(config.parse().unwrap(), ParseOutcome::Ready));
        assert_eq!(interval.get(), Duration::from_millis(1500));
    }

    #[test]
    fn bool_flag_set_and_cleared() {
        let mut config = config(&["--spi", "--dither=false"]);
        let spi = config.flag_bool("spi", false, "enable spi", &[]).unwrap();
        let dither = config.flag_bool("dither", true, "enable dithering", &[]).unwrap();
        assert!(matches!(config.parse().unwrap(), ParseOutcome::Ready));
        assert!(spi.get());
        assert!(!dither.get());
    }

    #[test]
    fn reserved_and_duplicate_flags_are_rejected() {
        let mut config = config(&[]);
        assert!(matches!(
            config.flag_bool("debug", false, "", &[]),
            Err(Error::DuplicateEntry(_))
        ));
        config.flag_string("device", "", "bus device", &[]).unwrap();
        assert!(matches!(
            config.flag_string("device", "", "bus device", &[]),
            Err(Error::DuplicateEntry(_))
        ));
    }

    #[test]
    fn declaring_after_parse_is_out_of_order() {
        let mut config = config(&[]);
        assert!(matches!(config.parse().unwrap(), ParseOutcome::Ready));
        assert!(matches!(
            config.flag_string("late", "", "too late", &[]),
            Err(Error::OutOfOrder(_))
        ));
        assert!(matches!(config.parse(), Err(Error::OutOfOrder(_))));
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        let mut config = config(&["--no-such-flag"]);
        assert!(matches!(config.parse().unwrap(), ParseOutcome::Usage(_)));
    }

    #[test]
    fn help_is_reported_not_failed() {
        let mut config = config(&["--help"]);
        match config.parse().unwrap() {
            ParseOutcome::Help(text) => assert!(text.contains("--debug")),
            _ => panic!("expected help outcome"),
        }
    }

    #[test]
    fn commands_select_handler_and_collect_args() {
        let mut config = config(&["blink", "--count", "4", "led0", "led1"]);
        let count = config.flag_i64("count", 1, "blink count", &["blink"]).unwrap();
        config
            .command("blink", "Blink the named LEDs", |_ctx| async { Ok(()) })
            .unwrap();
        assert!(matches!(config.parse().unwrap(), ParseOutcome::Ready));
        assert_eq!(config.selected_command(), Some("blink"));
        assert_eq!(config.command_args(), ["led0", "led1"]);
        assert_eq!(count.get(), 4);
        assert!(config.command_handler("blink").is_some());
        assert!(config.command_handler("other").is_none());
    }

    #[test]
    fn root_positionals_without_commands() {
        let mut config = config(&["--device", "/dev/i2c-1", "led0", "led1"]);
        let _device = config.flag_string("device", "/dev/i2c-0", "bus device", &[]).unwrap();
        assert!(matches!(config.parse().unwrap(), ParseOutcome::Ready));
        assert_eq!(config.selected_command(), None);
        assert_eq!(config.args(), ["led0", "led1"]);
    }

    #[test]
    fn missing_command_is_a_usage_error() {
        let mut config = config(&[]);
        config
            .command("blink", "Blink the named LEDs", |_ctx| async { Ok(()) })
            .unwrap();
        assert!(matches!(config.parse().unwrap(), ParseOutcome::Usage(_)));
    }

    #[test]
    fn duplicate_command_is_rejected() {
        let mut config = config(&[]);
        config.command("blink", "", |_ctx| async { Ok(()) }).unwrap();
        let err = config.command("blink", "", |_ctx| async { Ok(()) }).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntry(_)));
    }

    #[test]
    fn scoped_flag_is_rejected_at_top_level() {
        let mut config = config(&["--count", "4", "blink"]);
        let _count = config.flag_i64("count", 1, "blink count", &["blink"]).unwrap();
        config.command("blink", "", |_ctx| async { Ok(()) }).unwrap();
        assert!(matches!(config.parse().unwrap(), ParseOutcome::Usage(_)));
    }
}
