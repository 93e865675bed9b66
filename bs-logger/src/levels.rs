// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! The ten-level log taxonomy. Each level has a compile-time `defined` bit
//! (whether the build emits events at that level at all) and a runtime
//! toggle (whether the sink prints them), matching the split the console's
//! single-letter toggle tokens operate on.

use std::sync::atomic::{AtomicBool, Ordering};

/// Number of levels in the taxonomy.
pub const COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Level {
    Application = 0,
    News = 1,
    Session = 2,
    Protocol = 3,
    Proxy = 4,
    Remote = 5,
    Fault = 6,
    Quitting = 7,
    Objects = 8,
    Verbose = 9,
}

impl Level {
    pub const ALL: [Level; COUNT] = [
        Level::Application,
        Level::News,
        Level::Session,
        Level::Protocol,
        Level::Proxy,
        Level::Remote,
        Level::Fault,
        Level::Quitting,
        Level::Objects,
        Level::Verbose,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Single-letter console toggle token for this level (`a n s p x r f q o v`).
    pub fn letter(self) -> char {
        match self {
            Level::Application => 'a',
            Level::News => 'n',
            Level::Session => 's',
            Level::Protocol => 'p',
            Level::Proxy => 'x',
            Level::Remote => 'r',
            Level::Fault => 'f',
            Level::Quitting => 'q',
            Level::Objects => 'o',
            Level::Verbose => 'v',
        }
    }

    pub fn from_letter(letter: char) -> Option<Level> {
        Level::ALL.into_iter().find(|l| l.letter() == letter)
    }

    pub fn menu_label(self) -> &'static str {
        match self {
            Level::Application => "[a]pplication",
            Level::News => "[n]ews",
            Level::Session => "[s]ession",
            Level::Protocol => "[p]rotocol",
            Level::Proxy => "[x]proxy",
            Level::Remote => "[r]emote",
            Level::Fault => "[f]ault",
            Level::Quitting => "[q]uitting",
            Level::Objects => "[o]bjects",
            Level::Verbose => "[v]erbose",
        }
    }

    /// Whether this build compiles in events at this level at all. A
    /// console toggle for an undefined level logs "not compiled" instead
    /// of flipping anything.
    pub const fn defined(self) -> bool {
        DEFINED[self as usize]
    }
}

/// Compile-time "does this build emit this level" table. application,
/// news, session, remote and fault are defined by default; the rest are
/// compiled out of a release build.
pub const DEFINED: [bool; COUNT] = [
    true,  // application
    true,  // news
    true,  // session
    false, // protocol
    false, // proxy
    true,  // remote
    true,  // fault
    false, // quitting
    false, // objects
    false, // verbose
];

/// Runtime per-level print toggles, independently flippable by the console
/// capture worker and read by the log subscriber on every message.
pub struct Toggles([AtomicBool; COUNT]);

impl Toggles {
    /// Seeds each toggle from the compile-time `defined` bit, matching the
    /// historical default where only compiled-in levels print.
    pub fn from_defaults() -> Self {
        Toggles(std::array::from_fn(|i| AtomicBool::new(DEFINED[i])))
    }

    pub fn get(&self, level: Level) -> bool {
        self.0[level.index()].load(Ordering::Relaxed)
    }

    /// Flips the toggle and returns the new value. No-op (returns current
    /// value) for a level that isn't compiled in.
    pub fn flip(&self, level: Level) -> bool {
        if !level.defined() {
            return self.get(level);
        }
        self.0[level.index()].fetch_xor(true, Ordering::Relaxed) ^ true
    }
}

impl Default for Toggles {
    fn default() -> Self {
        Toggles::from_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_matches_historical_defaults() {
        assert!(Level::Application.defined());
        assert!(Level::News.defined());
        assert!(Level::Session.defined());
        assert!(!Level::Protocol.defined());
        assert!(!Level::Proxy.defined());
        assert!(Level::Remote.defined());
        assert!(Level::Fault.defined());
        assert!(!Level::Quitting.defined());
        assert!(!Level::Objects.defined());
        assert!(!Level::Verbose.defined());
    }

    #[test]
    fn flip_toggles_defined_level_only() {
        let toggles = Toggles::from_defaults();
        assert!(toggles.get(Level::Application));
        assert!(!toggles.flip(Level::Application));
        assert!(!toggles.get(Level::Application));

        assert!(!toggles.get(Level::Protocol));
        assert!(!toggles.flip(Level::Protocol));
        assert!(!toggles.get(Level::Protocol));
    }

    #[test]
    fn from_letter_round_trips() {
        for level in Level::ALL {
            assert_eq!(Level::from_letter(level.letter()), Some(level));
        }
        assert_eq!(Level::from_letter('z'), None);
    }
}
