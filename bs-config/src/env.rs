// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! `BS_`-prefixed environment overlay. Applied once, against the default
//! record, before a configuration file (if any) is parsed — so a
//! file-less run still picks up environment overrides, and so a field
//! the file does set takes precedence over this layer per §6's
//! command-line > file > environment precedence (see
//! [`Config::load`]'s merge against the file).

use crate::Config;

/// Overlay recognized `<prefix>NAME` environment variables onto `config`.
/// Unset or unparsable variables leave the existing field untouched.
pub fn overlay(config: &mut Config, prefix: &str) {
    overlay_bool(config, prefix, "HELP", |c, v| c.help = v);
    overlay_bool(config, prefix, "VERSION", |c, v| c.version = v);
    overlay_bool(config, prefix, "HARDWARE", |c, v| c.hardware = v);
    overlay_bool(config, prefix, "SETTINGS", |c, v| c.settings = v);
    overlay_bool(config, prefix, "NEWSTORE", |c, v| c.newstore = v);
    overlay_bool(config, prefix, "BACKUP", |c, v| c.backup = v);
    overlay_bool(config, prefix, "RESTORE", |c, v| c.restore = v);
    overlay_bool(config, prefix, "FLAGS", |c, v| c.flags = v);
    overlay_bool(config, prefix, "INFORMATION", |c, v| c.information = v);
    overlay_bool(config, prefix, "SLABS", |c, v| c.slabs = v);
    overlay_bool(config, prefix, "BUCKETS", |c, v| c.buckets = v);
    overlay_bool(config, prefix, "COLLISIONS", |c, v| c.collisions = v);

    overlay_str(config, prefix, "DATABASE_DIRECTORY", |c, v| {
        c.database.directory = v.into();
    });
    overlay_parsed(config, prefix, "NODE_THREADS_VALIDATION", |c, v| {
        c.node.threads_validation = v;
    });
    overlay_parsed(config, prefix, "SERVER_HTTP_PORT", |c, v| {
        c.server.http_port = v;
    });
    overlay_str(config, prefix, "SERVER_HTTP_BIND", |c, v| {
        c.server.http_bind = v;
    });
    overlay_str(config, prefix, "LOG_DIRECTORY", |c, v| {
        c.log.directory = v.into();
    });
}

fn var(prefix: &str, name: &str) -> Option<String> {
    std::env::var(format!("{prefix}{name}")).ok()
}

fn overlay_bool(config: &mut Config, prefix: &str, name: &str, set: impl FnOnce(&mut Config, bool)) {
    if let Some(value) = var(prefix, name) {
        let parsed = matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "on");
        set(config, parsed);
    }
}

fn overlay_str(config: &mut Config, prefix: &str, name: &str, set: impl FnOnce(&mut Config, String)) {
    if let Some(value) = var(prefix, name) {
        set(config, value);
    }
}

fn overlay_parsed<T: std::str::FromStr>(
    config: &mut Config,
    prefix: &str,
    name: &str,
    set: impl FnOnce(&mut Config, T),
) {
    if let Some(value) = var(prefix, name) {
        if let Ok(parsed) = value.parse::<T>() {
            set(config, parsed);
        }
    }
}
