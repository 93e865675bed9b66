// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! The executor (C9): top-level orchestration. `Executor::dispatch`
//! picks one of subcommand mode, test mode, or run mode (§4.9), exactly
//! as `do_main`/`executor_options.cpp` route a parsed configuration
//! record before anything else starts.
//!
//! Run mode (§4.9.3) is the only branch that constructs the node, the
//! store, the log/event sinks, the console capture worker, and the HTTP
//! surface, and is the one place the invariants in §4.9 — node never
//! started before the store is open, store never closed before the node
//! is fully stopped, logging outlives every writer — are enforced in one
//! place.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;

use bs_config::Config;
use bs_console::{CaptureComplete, Console, Option_};
use bs_estimator::Estimator;
use bs_logger::levels::Level;
use bs_rpc::model::{BlockHeader, Encodable};
use bs_shutdown::Shutdown;
use bs_store::facade::Store as StoreFacade;
use slog::{info, o, Drain, Logger};

use crate::content::ContentStore;
use crate::http;
use crate::memory_query::MemoryQuery;
use crate::node::{BlockConnected, Node};
use crate::{metrics, subcommands};

type Hash32 = bs_config::Hash32;

/// Owns nothing but the immutable configuration: every other piece of
/// process state the run loop needs (the shutdown atomic, the store, the
/// node) is constructed fresh inside [`Executor::dispatch`], matching
/// §9's guidance to reimplement the source's process-global singleton as
/// an owned value built in `main` rather than a factory-returned
/// reference.
pub struct Executor {
    config: Config,
}

impl Executor {
    pub fn new(config: Config) -> Self {
        Executor { config }
    }

    /// A structured `slog` logger for internal tracing, independent of
    /// the operator-facing [`bs_logger`] sink §4.2 specifies: the two
    /// exist for different audiences, exactly as the teacher pairs a
    /// tracing subscriber with an application-level event log.
    fn trace_logger() -> Logger {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Logger::root(drain, o!("component" => "bs-node"))
    }

    /// `dispatch()` (§4.9): subcommand mode, then test mode, then run
    /// mode, in that order. Returns the process's intended success flag;
    /// `main` maps `true -> 0`, `false -> -1`.
    pub fn dispatch(&self, out: &mut dyn Write) -> bool {
        let trace = Self::trace_logger();
        metrics::register();

        if let Some(mode) = self.config.run_mode() {
            return subcommands::dispatch(mode, &self.config, &trace, out);
        }

        if let Some((hash, write)) = self.config.test_mode() {
            return self.dispatch_test_mode(hash, write, &trace, out);
        }

        self.dispatch_run_mode(&trace, out)
    }

    /// §4.9.2: open the store read-only or read-write, invoke the
    /// built-in test hook, close the store. Per §9's open question, the
    /// hook is a single-method extension point: only the production
    /// `read_test` variant (cumulative wire size) survives: the
    /// address-traversal, tx-confirm-replay, and block-connect-replay
    /// variants were disabled in the shipped binary and are not
    /// recovered here.
    fn dispatch_test_mode(&self, hash: Hash32, write: bool, trace: &Logger, out: &mut dyn Write) -> bool {
        let query = Arc::new(MemoryQuery::new());
        query.install_genesis();
        let present = self.config.database.directory.exists();
        let facade = StoreFacade::new(self.config.database.directory.clone(), query.clone(), present);
        let opened = if present { facade.open(|_, _| {}) } else { facade.create(|_, _| {}) };
        let label = if write { "write" } else { "read" };
        if let Err(err) = opened {
            let _ = writeln!(out, "{label} test: open failed: {err}");
            return false;
        }

        let total = read_test(query.as_ref(), hash);
        info!(trace, "test hook complete"; "mode" => label, "hash" => hex::encode(hash), "total_wire_size" => total);
        let _ = writeln!(out, "{label} test: cumulative wire size {total} (hash {})", hex::encode(hash));

        facade.close(|_, _| {}).is_ok()
    }

    /// §4.9.3, steps a–f.
    fn dispatch_run_mode(&self, trace: &Logger, out: &mut dyn Write) -> bool {
        // (a) log directory, sinks, subscriptions, startup header.
        let log_config = bs_logger::LogConfig {
            path: self.config.log.directory.clone(),
            maximum_size: self.config.log.maximum_size,
            log_file1: self.config.log.log_file1.clone(),
            log_file2: self.config.log.log_file2.clone(),
            events_file: self.config.log.events_file.clone(),
        };
        if let Err(err) = std::fs::create_dir_all(&log_config.path) {
            let _ = writeln!(out, "failed to create log directory: {err}");
            return false;
        }
        let (logger, sink, _events) = match bs_logger::build(&log_config) {
            Ok(built) => built,
            Err(err) => {
                let _ = writeln!(out, "failed to initialize log sink: {err}");
                return false;
            }
        };
        let logger = Arc::new(logger);
        let logging_complete = sink.logging_complete();
        logger.write(Level::Application, "bs-node starting up");
        let _ = writeln!(out, "bs-node starting up");

        let shutdown = Shutdown::initialize();

        // (b)/(c) open if present, otherwise create; `flush_lock` on open
        // is handled by a restore attempt per §4.4's failure semantics.
        let query = Arc::new(MemoryQuery::new());
        let present = self.config.database.directory.exists();
        let facade = Arc::new(StoreFacade::new(self.config.database.directory.clone(), query.clone(), present));
        let opened = if present {
            match facade.open(|event, table| logger.write(Level::Application, &format!("{event} {}", table.name()))) {
                Err(bs_store::StoreError::FlushLock) => {
                    logger.write(Level::Application, "store dirty, attempting restore");
                    facade
                        .restore(|event, table| logger.write(Level::Application, &format!("{event} {}", table.name())))
                        .and_then(|()| {
                            // `restore` repairs the on-disk tables but the
                            // query handle's own dirty latch is ours to
                            // clear; nothing else would ever flip it back.
                            query.set_dirty(false);
                            facade.open(|_, _| {})
                        })
                }
                other => other,
            }
        } else {
            facade.create(|event, table| logger.write(Level::Application, &format!("{event} {}", table.name())))
        };
        if let Err(err) = opened {
            logger.fail(Level::Application, bs_logger::LogError::Initialize(err.to_string()), "store open failed, aborting");
            logging_complete.wait();
            shutdown.uninitialize();
            let _ = writeln!(out, "store open failed: {err}");
            return false;
        }
        query.install_genesis();
        metrics::STORE_RUNNING.set(1);

        // (d) version/hardware/log-options dumps, node construction,
        // connect/close subscriptions, HTTP start.
        logger.write(Level::Application, &format!("bs-node {}", env!("CARGO_PKG_VERSION")));
        logger.write(
            Level::Application,
            &format!("cpus: {}", std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)),
        );

        let content = Arc::new(ContentStore::new(self.config.bitcoin.identifier));
        let estimator = Arc::new(Mutex::new(Estimator::new()));
        let node = Arc::new(Node::new(query.clone(), trace.clone()));

        let content_for_connect = content.clone();
        let estimator_for_connect = estimator.clone();
        let logger_for_connect = logger_ref(&logger);
        node.subscribe_connect(move |event: &BlockConnected| {
            metrics::BLOCKS_CONNECTED_TOTAL.inc();
            let rates: Vec<bs_estimator::Observation> = event.fee_observations.clone();
            estimator_for_connect.lock().expect("estimator mutex poisoned").push(&rates);
            let header = BlockHeader {
                version: 1,
                previous: [0u8; 32],
                merkle_root: event.hash,
                time: 0,
                bits: 0,
                nonce: event.height as u32,
            };
            let context = bs_rpc::model::HeaderContext { height: event.height as u32, flags: 0, median_time_past: 0 };
            content_for_connect.push_block(header, context, vec![]);
            logger_for_connect.event("block_connected", event.height as i64);
        });

        let logger_for_close = logger_ref(&logger);
        node.subscribe_close(move || {
            logger_for_close.write(Level::Application, "node closed");
        });

        if let Err(err) = node.start() {
            logger.fail(Level::Application, bs_logger::LogError::Initialize(err.to_string()), "node start failed, aborting");
            logging_complete.wait();
            shutdown.uninitialize();
            let _ = writeln!(out, "node start failed: {err}");
            return false;
        }

        // HTTP surface (§4.7/§4.8), run on its own OS thread so the
        // executor thread stays free for `wait_for_stopping`.
        let addr: Option<SocketAddr> =
            format!("{}:{}", self.config.server.http_bind, self.config.server.http_port).parse().ok();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let http_content: Arc<dyn bs_rpc::dispatch::Store> = content.clone();
        let http_logger = trace.clone();
        let http_handle = addr.map(|addr| {
            thread::Builder::new()
                .name("http-server".to_string())
                .spawn(move || {
                    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
                        Ok(rt) => rt,
                        Err(_) => return,
                    };
                    runtime.block_on(async move {
                        let app = http::router(http_content, http_logger);
                        let server = axum::Server::bind(&addr)
                            .serve(app.into_make_service())
                            .with_graceful_shutdown(async move {
                                let _ = shutdown_rx.await;
                            });
                        let _ = server.await;
                    });
                })
                .expect("failed to spawn http-server thread")
        });

        // Console capture (C3): bound to `backup`/`close`/`errors`/`info`
        // plus the remaining option tokens as acknowledged no-ops, per
        // §9's note that the source's disabled test variants aren't
        // recovered — the same applies to options with no production
        // behavior left to imitate.
        let console_complete = Arc::new(CaptureComplete::default());
        let console_facade = facade.clone();
        let console_logger = logger_ref(&logger);
        let console_trace = trace.clone();
        let console_complete_for_thread = console_complete.clone();
        thread::Builder::new()
            .name("console".to_string())
            .spawn(move || {
                let toggles = bs_logger::levels::Toggles::from_defaults();
                let mut console = Console::new(&toggles, console_trace.clone());
                console.bind(Option_::Backup, {
                    let facade = console_facade.clone();
                    let logger = console_logger.clone();
                    move || match facade.snapshot(|_, _| {}) {
                        Ok(()) => logger.write(Level::Application, "console: snapshot complete"),
                        Err(err) => logger.write(Level::Application, &format!("console: snapshot failed: {err}")),
                    }
                });
                console.bind(Option_::Close, move || {
                    bs_shutdown::stop(bs_shutdown::SIGNAL_NONE);
                });
                console.bind(Option_::Errors, {
                    let facade = console_facade.clone();
                    let logger = console_logger.clone();
                    move || {
                        facade.report(|table, fault| {
                            let state = fault.map(|e| e.to_string()).unwrap_or_else(|| "ok".to_string());
                            logger.write(Level::Application, &format!("console: {}: {state}", table.name()));
                        });
                    }
                });
                console.bind(Option_::Info, {
                    let logger = console_logger.clone();
                    move || logger.write(Level::Application, "console: info requested")
                });
                console.bind(Option_::Menu, {
                    let logger = console_logger.clone();
                    move || logger.write(Level::Application, "console: b backup, c close, e errors, i info, m menu")
                });
                let stdin = std::io::stdin();
                console.run(stdin.lock(), console_complete_for_thread.as_ref());
            })
            .expect("failed to spawn console thread");

        let _ = writeln!(out, "running");

        // (e) wait for a stop (signal, console `close`, or an operator
        // external kill) to be latched.
        bs_shutdown::wait_for_stopping();
        logger.write(Level::Application, "stopping");
        let _ = writeln!(out, "stopping");

        // (f) node -> store -> console -> log, in that order.
        let node_closed = node.close().is_ok();
        let _ = shutdown_tx.send(());
        if let Some(handle) = http_handle {
            let _ = handle.join();
        }
        let store_closed = facade.close(|event, table| logger.write(Level::Application, &format!("{event} {}", table.name()))).is_ok();
        metrics::STORE_RUNNING.set(0);

        // The console worker is blocked in a synchronous stdin read,
        // which safe Rust cannot cancel from another thread (unlike the
        // self-pipe trick §9 suggests for the signal path). When the
        // stop came from a signal rather than the console's own close
        // token, that read is simply still pending; the thread is left
        // detached rather than joined here, and its own `run` loop still
        // fulfills `console_complete` on EOF or a close token, same as
        // any other run of the console capture worker.
        let success = node_closed && store_closed;
        if success {
            logger.write(Level::Application, "bs-node stopped cleanly");
        } else {
            logger.fail(Level::Application, bs_logger::LogError::Initialize("unclean shutdown".to_string()), "bs-node stopped uncleanly");
        }
        logging_complete.wait();
        shutdown.uninitialize();
        let _ = writeln!(out, "stopped");
        success
    }
}

/// Production `read_test` (§9): sum the fixed-size wire serialization of
/// every header record, up to and including the one named by `hash` (or
/// every record, if `hash` is the all-zero default).
fn read_test(query: &MemoryQuery, hash: Hash32) -> u64 {
    let header_wire_size = BlockHeader { version: 0, previous: [0; 32], merkle_root: [0; 32], time: 0, bits: 0, nonce: 0 }
        .to_wire()
        .len() as u64;
    let records = bs_store::NodeQuery::header_records(query);

    let through = if hash == Hash32::default() {
        records
    } else {
        (0..records)
            .find(|&i| bs_store::NodeQuery::get_header_key(query, bs_store::Link(i)) == hash)
            .map(|i| i + 1)
            .unwrap_or(0)
    };
    through as u64 * header_wire_size
}

/// A cheaply cloneable handle onto [`bs_logger::Logger`] for the
/// closures above, which each need their own reference into a thread
/// that outlives the borrow the executor's stack frame could offer.
#[derive(Clone)]
struct LoggerHandle(Arc<bs_logger::Logger>);

impl LoggerHandle {
    fn write(&self, level: Level, text: &str) {
        self.0.write(level, text);
    }

    fn event(&self, name: &str, value: i64) {
        self.0.event(name, value);
    }
}

fn logger_ref(logger: &Arc<bs_logger::Logger>) -> LoggerHandle {
    LoggerHandle(logger.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_test_zero_hash_sums_every_header() {
        let query = MemoryQuery::new();
        query.install_genesis();
        query.connect_block([1u8; 32], 0, vec![]);
        query.connect_block([2u8; 32], 0, vec![]);
        assert_eq!(read_test(&query, Hash32::default()), 3 * 80);
    }

    #[test]
    fn read_test_named_hash_sums_through_that_height_only() {
        let query = MemoryQuery::new();
        query.install_genesis();
        query.connect_block([1u8; 32], 0, vec![]);
        query.connect_block([2u8; 32], 0, vec![]);
        assert_eq!(read_test(&query, [1u8; 32]), 2 * 80);
    }

    #[test]
    fn read_test_unknown_hash_is_zero() {
        let query = MemoryQuery::new();
        query.install_genesis();
        assert_eq!(read_test(&query, [9u8; 32]), 0);
    }
}
