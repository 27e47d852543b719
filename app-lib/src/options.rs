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

//! Pre-framework command line peek.
//!
//! The real argument parsing happens inside the unit graph, after every
//! unit had its chance to declare flags. This module only skims the raw
//! arguments for the options needed *before* that point (logging
//! verbosity, error reporting style) and keeps the full argument list
//! for the framework parse.

use std::{ffi::OsString, path::Path};

/// The launch options of a gimbal executable.
#[derive(Debug, Clone)]
pub struct Options {
    program: String,
    raw_args: Vec<String>,
    debug: bool,
    verbose: bool,
}

impl Options {
    /// Skim `args` (including the program name in position zero) without
    /// rejecting anything; errors surface later, from the framework
    /// parse, once all flags are known.
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let raw: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let program = raw
            .first()
            .map(|arg0| Path::new(arg0))
            .and_then(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gimbal".to_owned());

        let raw_args: Vec<String> =
            raw.iter().map(|arg| arg.to_string_lossy().into_owned()).collect();

        // A plain scan: the switches are global flags of the framework
        // parse, so they may appear anywhere before a `--` separator.
        let mut debug = false;
        let mut verbose = false;
        for arg in raw_args.iter().skip(1) {
            match arg.as_str() {
                "--" => break,
                "--debug" => debug = true,
                "--verbose" => verbose = true,
                _ => (),
            }
        }

        Self {
            program,
            raw_args,
            debug,
            verbose,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The untouched argument list, handed to the framework parse.
    pub fn raw_args(&self) -> &[String] {
        &self.raw_args
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(args: &[&str]) -> Options {
        Options::from_args(args.iter().copied())
    }

    #[test]
    fn program_name_is_the_file_stem() {
        let options = opts(&["/usr/local/bin/gimbald", "--debug"]);
        assert_eq!(options.program(), "gimbald");
        assert!(options.debug());
        assert!(!options.verbose());
    }

    #[test]
    fn unknown_arguments_are_kept_for_later() {
        let options = opts(&["gimbald", "--rpc-addr", "127.0.0.1:0", "--verbose"]);
        assert!(options.verbose());
        assert_eq!(
            options.raw_args(),
            ["gimbald", "--rpc-addr", "127.0.0.1:0", "--verbose"]
        );
    }

    #[test]
    fn switches_are_seen_after_positional_arguments() {
        let options = opts(&["gimbald", "greet", "hello", "--debug", "--verbose"]);
        assert!(options.debug());
        assert!(options.verbose());
    }

    #[test]
    fn switches_after_a_separator_are_ignored() {
        let options = opts(&["gimbald", "--debug", "--", "--verbose"]);
        assert!(options.debug());
        assert!(!options.verbose());
    }

    #[test]
    fn empty_argument_list_gets_a_fallback_name() {
        let options = Options::from_args(Vec::<String>::new());
        assert_eq!(options.program(), "gimbal");
        assert!(options.raw_args().is_empty());
    }
}
