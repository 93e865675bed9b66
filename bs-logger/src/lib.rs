// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Log and event sinks (C2): a rotating text log with per-level toggles,
//! a single append-only event log, and the subscription model the
//! executor wires both through.

pub mod levels;
mod rotator;

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use levels::{Level, Toggles};
use rotator::Rotator;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log sink initialization failed: {0}")]
    Initialize(String),
}

/// Configuration mirroring the `[log]` settings block: per-level defaults,
/// rotation budget, and file names.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub path: PathBuf,
    pub maximum_size: u64,
    pub log_file1: String,
    pub log_file2: String,
    pub events_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            path: PathBuf::new(),
            maximum_size: 1_000_000,
            log_file1: "node_end.log".to_string(),
            log_file2: "node_begin.log".to_string(),
            events_file: "events.log".to_string(),
        }
    }
}

type LogSubscriber = Box<dyn FnMut(Option<&LogError>, Level, Instant, &str) -> bool + Send>;
type EventSubscriber = Box<dyn FnMut(Option<&LogError>, &str, i64, Instant) -> bool + Send>;

/// The raw message/event emitter. Analogous to the teacher's
/// `network::logger`: components call `write`/`fail`/`event`; the executor
/// is the only thing that subscribes.
#[derive(Default)]
pub struct Logger {
    log_subscriber: Mutex<Option<LogSubscriber>>,
    event_subscriber: Mutex<Option<EventSubscriber>>,
}

impl Logger {
    pub fn new() -> Self {
        Logger::default()
    }

    pub fn subscribe_log(&self, subscriber: LogSubscriber) {
        *self.log_subscriber.lock().expect("log subscriber poisoned") = Some(subscriber);
    }

    pub fn subscribe_event(&self, subscriber: EventSubscriber) {
        *self.event_subscriber.lock().expect("event subscriber poisoned") = Some(subscriber);
    }

    /// Emit a normal (non-terminal) message at `level`.
    pub fn write(&self, level: Level, text: &str) {
        self.dispatch(None, level, text);
    }

    /// Emit the terminal message: the subscriber sees a nonzero error,
    /// writes the footer, and releases itself (see [`LogSink::on_message`]).
    pub fn fail(&self, level: Level, error: LogError, text: &str) {
        self.dispatch(Some(&error), level, text);
    }

    fn dispatch(&self, error: Option<&LogError>, level: Level, text: &str) {
        let mut guard = self.log_subscriber.lock().expect("log subscriber poisoned");
        let keep = match guard.as_mut() {
            Some(f) => f(error, level, Instant::now(), text),
            None => return,
        };
        if !keep {
            *guard = None;
        }
    }

    pub fn event(&self, event_name: &str, value: i64) {
        let mut guard = self
            .event_subscriber
            .lock()
            .expect("event subscriber poisoned");
        let keep = match guard.as_mut() {
            Some(f) => f(None, event_name, value, Instant::now()),
            None => return,
        };
        if !keep {
            *guard = None;
        }
    }
}

/// Fulfilled once after the terminal log message has been buffered;
/// `Executor::stopper` waits on this before tearing the sink down.
#[derive(Default)]
pub struct LoggingComplete(Mutex<bool>, Condvar);

impl LoggingComplete {
    pub fn fulfill(&self) {
        let mut done = self.0.lock().expect("logging-complete mutex poisoned");
        *done = true;
        self.1.notify_all();
    }

    pub fn wait(&self) {
        let mut done = self.0.lock().expect("logging-complete mutex poisoned");
        while !*done {
            done = self.1.wait(done).expect("logging-complete mutex poisoned");
        }
    }
}

/// The rotating file + console log sink. Holds the per-level print
/// toggles the console capture worker flips.
pub struct LogSink {
    rotator: Mutex<Rotator>,
    toggles: Toggles,
    complete: Arc<LoggingComplete>,
}

impl LogSink {
    pub fn create(config: &LogConfig) -> Result<Self, LogError> {
        let rotator = Rotator::create(
            &config.path,
            &config.log_file1,
            &config.log_file2,
            config.maximum_size,
        )
        .map_err(|e| LogError::Initialize(e.to_string()))?;
        Ok(LogSink {
            rotator: Mutex::new(rotator),
            toggles: Toggles::from_defaults(),
            complete: Arc::new(LoggingComplete::default()),
        })
    }

    pub fn toggles(&self) -> &Toggles {
        &self.toggles
    }

    pub fn logging_complete(&self) -> Arc<LoggingComplete> {
        self.complete.clone()
    }

    /// The log subscriber body (§4.2): filtered write to sink and console;
    /// on a nonzero error, also emits footer + terminator and fulfills
    /// `logging_complete`, then releases the subscription.
    pub fn on_message(&self, error: Option<&LogError>, level: Level, _at: Instant, text: &str) -> bool {
        if error.is_none() && !self.toggles.get(level) {
            return true;
        }

        let line = format!("{} [{:?}] {text}", chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"), level);
        if let Ok(mut rotator) = self.rotator.lock() {
            let _ = rotator.write_line(&line);
        }
        println!("{line}");

        if let Some(err) = error {
            println!("{err}");
            println!("-- stopped --");
            self.complete.fulfill();
            return false;
        }

        true
    }
}

/// The single append-only event log: one line per event of the form
/// `"<event_name> <value> <elapsed_seconds>"`.
pub struct EventSink {
    file: Mutex<std::fs::File>,
    start: Instant,
}

impl EventSink {
    pub fn create(config: &LogConfig) -> Result<Self, LogError> {
        std::fs::create_dir_all(&config.path).map_err(|e| LogError::Initialize(e.to_string()))?;
        let path = config.path.join(&config.events_file);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LogError::Initialize(e.to_string()))?;
        Ok(EventSink {
            file: Mutex::new(file),
            start: Instant::now(),
        })
    }

    pub fn on_event(&self, _error: Option<&LogError>, event_name: &str, value: i64, at: Instant) -> bool {
        let elapsed = at.duration_since(self.start).as_secs_f64();
        let line = format!("{event_name} {value} {elapsed}\n");
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
        true
    }
}

/// Wires a [`LogSink`] and [`EventSink`] into a fresh [`Logger`], matching
/// `Executor::do_run`'s `create_log_sink`/`create_event_sink` +
/// `subscribe_log`/`subscribe_events` sequence.
pub fn build(config: &LogConfig) -> Result<(Logger, Arc<LogSink>, Arc<EventSink>), LogError> {
    let logger = Logger::new();
    let sink = Arc::new(LogSink::create(config)?);
    let events = Arc::new(EventSink::create(config)?);

    let sink_for_log = sink.clone();
    logger.subscribe_log(Box::new(move |error, level, at, text| {
        sink_for_log.on_message(error, level, at, text)
    }));

    let events_for_sub = events.clone();
    logger.subscribe_event(Box::new(move |error, name, value, at| {
        events_for_sub.on_event(error, name, value, at)
    }));

    Ok((logger, sink, events))
}

#[allow(unused)]
fn _assert_send<T: Send>() {}
