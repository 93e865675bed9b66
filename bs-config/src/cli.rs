// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! The CLI surface (§6): one positional configuration-file path, the
//! run-mode flags, and the `test`/`write` hash options.

use std::path::PathBuf;

use structopt::StructOpt;

use crate::{parse_hash, Config, ConfigError};

#[derive(Debug, StructOpt)]
#[structopt(name = "bs-node", about = "Bitcoin full-node operator control plane")]
pub struct Opt {
    /// Configuration file path, positional form.
    #[structopt(parse(from_os_str))]
    positional_config: Option<PathBuf>,

    /// Configuration file path.
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    pub config: Option<PathBuf>,

    #[structopt(short = "h", long = "help-extended")]
    pub help: bool,
    #[structopt(short = "v", long = "version")]
    pub version: bool,
    #[structopt(short = "d", long = "hardware")]
    pub hardware: bool,
    #[structopt(short = "s", long = "settings")]
    pub settings: bool,
    #[structopt(short = "n", long = "newstore")]
    pub newstore: bool,
    #[structopt(short = "b", long = "backup")]
    pub backup: bool,
    #[structopt(short = "r", long = "restore")]
    pub restore: bool,
    #[structopt(short = "f", long = "flags")]
    pub flags: bool,
    #[structopt(short = "a", long = "slabs")]
    pub slabs: bool,
    #[structopt(short = "k", long = "buckets")]
    pub buckets: bool,
    #[structopt(short = "l", long = "collisions")]
    pub collisions: bool,
    #[structopt(short = "i", long = "information")]
    pub information: bool,

    #[structopt(short = "t", long = "test")]
    pub test: Option<String>,
    #[structopt(short = "w", long = "write")]
    pub write: Option<String>,
}

impl Opt {
    /// The configuration-file path, preferring the `--config`/`-c` flag
    /// over the bare positional argument.
    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref().or(self.positional_config.as_ref())
    }

    /// Overlay this command line onto `config`, the topmost layer in the
    /// command-line > file > environment precedence.
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        config.help |= self.help;
        config.version |= self.version;
        config.hardware |= self.hardware;
        config.settings |= self.settings;
        config.newstore |= self.newstore;
        config.backup |= self.backup;
        config.restore |= self.restore;
        config.flags |= self.flags;
        config.slabs |= self.slabs;
        config.buckets |= self.buckets;
        config.collisions |= self.collisions;
        config.information |= self.information;

        if let Some(text) = &self.test {
            config.test = parse_hash(text)?;
        }
        if let Some(text) = &self.write {
            config.write = parse_hash(text)?;
        }
        Ok(())
    }
}

impl Default for Opt {
    fn default() -> Self {
        Opt {
            positional_config: None,
            config: None,
            help: false,
            version: false,
            hardware: false,
            settings: false,
            newstore: false,
            backup: false,
            restore: false,
            flags: false,
            slabs: false,
            buckets: false,
            collisions: false,
            information: false,
            test: None,
            write: None,
        }
    }
}
