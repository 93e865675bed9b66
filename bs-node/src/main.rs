// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Process entry point: parse the command line, load the layered
//! configuration (command-line > file > environment, §6), and hand off
//! to the executor. Everything past this point is `Executor::dispatch`'s
//! responsibility.

mod content;
mod executor;
mod hashing;
mod http;
mod memory_query;
mod metrics;
mod node;
mod subcommands;

use std::io;
use std::process::ExitCode;

use bs_config::{Config, Opt};
use structopt::StructOpt;

use crate::executor::Executor;

const ENV_PREFIX: &str = "BS_";

fn main() -> ExitCode {
    let opt = Opt::from_args();
    let config = match Config::load(&opt, ENV_PREFIX) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let executor = Executor::new(config);
    let mut stdout = io::stdout();
    if executor.dispatch(&mut stdout) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
