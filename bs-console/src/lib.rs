// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Console capture (C3): a line-buffered reader dispatching single-letter
//! tokens to the log-level toggles or to a fixed option-handler table,
//! grounded on `executable-helpers`' console-subscription role in the
//! teacher and `executor_options.cpp`'s `subscribe_capture` body.
//!
//! The reader itself is generic over [`BufRead`] so tests can drive it
//! with an in-memory cursor instead of real stdin; [`Console::run`] is
//! what the executor spawns onto the dedicated worker thread.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::{Condvar, Mutex};

use bs_logger::levels::{Level, Toggles};
use slog::{info, Logger};

/// One of the fixed option tokens the console dispatches to a bound
/// handler (§4.3, §6 "Console commands"): `b c e g h i m t w z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Option_ {
    Backup,
    Close,
    Errors,
    Go,
    Hold,
    Info,
    Menu,
    Test,
    Work,
    Zeroize,
}

impl Option_ {
    pub const ALL: [Option_; 10] = [
        Option_::Backup,
        Option_::Close,
        Option_::Errors,
        Option_::Go,
        Option_::Hold,
        Option_::Info,
        Option_::Menu,
        Option_::Test,
        Option_::Work,
        Option_::Zeroize,
    ];

    pub const fn letter(self) -> char {
        match self {
            Option_::Backup => 'b',
            Option_::Close => 'c',
            Option_::Errors => 'e',
            Option_::Go => 'g',
            Option_::Hold => 'h',
            Option_::Info => 'i',
            Option_::Menu => 'm',
            Option_::Test => 't',
            Option_::Work => 'w',
            Option_::Zeroize => 'z',
        }
    }

    pub fn from_letter(letter: char) -> std::option::Option<Option_> {
        Option_::ALL.into_iter().find(|o| o.letter() == letter)
    }
}

/// What dispatching one trimmed, non-empty console token produced.
/// Exposed mainly for tests; [`Console::run`] only acts on [`Dispatch::Close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Toggled(Level, bool),
    ToggleNotCompiled(Level),
    Option(Option_),
    Close,
    Unknown,
}

/// Fulfilled once the reader observes end-of-stream and releases its
/// subscription; mirrors `bs_logger::LoggingComplete`'s one-shot shape.
#[derive(Default)]
pub struct CaptureComplete(Mutex<bool>, Condvar);

impl CaptureComplete {
    pub fn fulfill(&self) {
        let mut done = self.0.lock().expect("capture-complete mutex poisoned");
        *done = true;
        self.1.notify_all();
    }

    pub fn wait(&self) {
        let mut done = self.0.lock().expect("capture-complete mutex poisoned");
        while !*done {
            done = self.1.wait(done).expect("capture-complete mutex poisoned");
        }
    }
}

type Handler<'a> = Box<dyn FnMut() + Send + 'a>;

/// The console capture worker: owns the per-level toggles it flips and
/// the option-handler table the executor binds (§4.3).
pub struct Console<'a> {
    toggles: &'a Toggles,
    handlers: HashMap<Option_, Handler<'a>>,
    close_token: char,
    logger: Logger,
}

impl<'a> Console<'a> {
    /// `close_token` defaults to `'c'` per §4.3; the executor may rebind
    /// it via configuration.
    pub fn new(toggles: &'a Toggles, logger: Logger) -> Self {
        Console {
            toggles,
            handlers: HashMap::new(),
            close_token: Option_::Close.letter(),
            logger,
        }
    }

    pub fn with_close_token(mut self, token: char) -> Self {
        self.close_token = token;
        self
    }

    /// Bind a handler for one of the fixed option tokens. Rebinding an
    /// already-bound option replaces it.
    pub fn bind(&mut self, option: Option_, handler: impl FnMut() + Send + 'a) {
        self.handlers.insert(option, Box::new(handler));
    }

    /// Dispatch one already-trimmed, non-empty token (§4.3). A multi-
    /// character token is treated as unknown: the console grammar is
    /// single-letter only.
    pub fn dispatch(&mut self, token: &str) -> Dispatch {
        let mut chars = token.chars();
        let letter = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                info!(self.logger, "CONSOLE: {}", token);
                return Dispatch::Unknown;
            }
        };

        if letter == self.close_token {
            return Dispatch::Close;
        }

        if let Some(level) = Level::from_letter(letter) {
            if !level.defined() {
                info!(self.logger, "not compiled"; "level" => letter);
                return Dispatch::ToggleNotCompiled(level);
            }
            let now = self.toggles.flip(level);
            return Dispatch::Toggled(level, now);
        }

        if let Some(option) = Option_::from_letter(letter) {
            if let Some(handler) = self.handlers.get_mut(&option) {
                handler();
            }
            return Dispatch::Option(option);
        }

        info!(self.logger, "CONSOLE: {}", token);
        Dispatch::Unknown
    }

    /// The capture loop itself (§4.3, §5 "console capture worker"):
    /// reads trimmed, non-empty lines from `input` and dispatches each
    /// until the stream reports end-of-service or a close token is
    /// dispatched. Returns the [`Dispatch`] that ended the loop, if any
    /// (`None` on a bare EOF with no prior close token).
    pub fn run(&mut self, input: impl BufRead, complete: &CaptureComplete) -> std::option::Option<Dispatch> {
        let mut outcome = None;
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            let token = line.trim();
            if token.is_empty() {
                continue;
            }
            let dispatch = self.dispatch(token);
            if dispatch == Dispatch::Close {
                outcome = Some(dispatch);
                break;
            }
        }
        complete.fulfill();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::{o, Discard};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn silent_logger() -> Logger {
        Logger::root(Discard, o!())
    }

    #[test]
    fn toggle_token_flips_a_defined_level() {
        let toggles = Toggles::from_defaults();
        let mut console = Console::new(&toggles, silent_logger());
        assert!(toggles.get(Level::Application));
        let dispatch = console.dispatch("a");
        assert_eq!(dispatch, Dispatch::Toggled(Level::Application, false));
        assert!(!toggles.get(Level::Application));
    }

    #[test]
    fn toggle_token_for_undefined_level_reports_not_compiled() {
        let toggles = Toggles::from_defaults();
        let mut console = Console::new(&toggles, silent_logger());
        let dispatch = console.dispatch("p");
        assert_eq!(dispatch, Dispatch::ToggleNotCompiled(Level::Protocol));
        assert!(!toggles.get(Level::Protocol));
    }

    #[test]
    fn option_token_invokes_bound_handler() {
        let toggles = Toggles::from_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_handler = calls.clone();
        let mut console = Console::new(&toggles, silent_logger());
        console.bind(Option_::Menu, move || {
            calls_for_handler.fetch_add(1, Ordering::SeqCst);
        });
        let dispatch = console.dispatch("m");
        assert_eq!(dispatch, Dispatch::Option(Option_::Menu));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unbound_option_token_is_still_recognized_as_option() {
        let toggles = Toggles::from_defaults();
        let mut console = Console::new(&toggles, silent_logger());
        assert_eq!(console.dispatch("z"), Dispatch::Option(Option_::Zeroize));
    }

    #[test]
    fn unknown_token_is_logged_and_does_not_panic() {
        let toggles = Toggles::from_defaults();
        let mut console = Console::new(&toggles, silent_logger());
        assert_eq!(console.dispatch("xyz"), Dispatch::Unknown);
        assert_eq!(console.dispatch("q9"), Dispatch::Unknown);
    }

    #[test]
    fn close_token_defaults_to_c() {
        let toggles = Toggles::from_defaults();
        let mut console = Console::new(&toggles, silent_logger());
        assert_eq!(console.dispatch("c"), Dispatch::Close);
    }

    #[test]
    fn close_token_is_rebindable() {
        let toggles = Toggles::from_defaults();
        let mut console = Console::new(&toggles, silent_logger()).with_close_token('x');
        assert_eq!(console.dispatch("c"), Dispatch::Option(Option_::Close));
        assert_eq!(console.dispatch("x"), Dispatch::Close);
    }

    #[test]
    fn run_stops_on_close_token_and_fulfills_completion() {
        let toggles = Toggles::from_defaults();
        let mut console = Console::new(&toggles, silent_logger());
        let complete = CaptureComplete::default();
        let input = Cursor::new(b"a\nunused\nc\nnever reached\n".to_vec());
        let outcome = console.run(input, &complete);
        assert_eq!(outcome, Some(Dispatch::Close));
        complete.wait();
    }

    #[test]
    fn run_reaches_eof_without_a_close_token() {
        let toggles = Toggles::from_defaults();
        let mut console = Console::new(&toggles, silent_logger());
        let complete = CaptureComplete::default();
        let input = Cursor::new(b"a\n\nm\n".to_vec());
        let outcome = console.run(input, &complete);
        assert_eq!(outcome, None);
        complete.wait();
    }

    #[test]
    fn blank_lines_are_skipped() {
        let toggles = Toggles::from_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_handler = calls.clone();
        let mut console = Console::new(&toggles, silent_logger());
        console.bind(Option_::Info, move || {
            calls_for_handler.fetch_add(1, Ordering::SeqCst);
        });
        let complete = CaptureComplete::default();
        let input = Cursor::new(b"\n   \ni\n".to_vec());
        console.run(input, &complete);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
