// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Store facade (C4): lifecycle transitions over the table set, each
//! reporting progress as `(event, table)` pairs. The on-disk layout
//! itself is out of scope (§1); this facade models the state machine
//! and precondition checks §4.4 specifies, delegating every actual
//! health question to [`NodeQuery`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{NodeQuery, StoreError, Table};

/// One step of a facade operation's progress callback: the event name
/// (`"genesis"`, `"checkpoint"`, `"flush"`, …) paired with the table it
/// concerns.
pub type Progress<'a> = dyn FnMut(&str, Table) + 'a;

/// Where the facade's state machine currently sits. Matches the
/// transition diagram in §4.4 exactly; `Running` covers both the
/// `open` and post-`reload`/`snapshot` states since they're
/// indistinguishable to a caller other than via `NodeQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Absent,
    Present,
    Running,
    Dirty,
    Closed,
}

fn check_store_path(directory: &Path, create: bool) -> Result<(), StoreError> {
    if create {
        std::fs::create_dir_all(directory)
            .map_err(|_| StoreError::InvalidTransition("cannot create store directory"))?;
    } else if !directory.exists() {
        return Err(StoreError::InvalidTransition("store directory absent"));
    }
    Ok(())
}

/// The store facade itself: a lifecycle state machine plus the
/// [`NodeQuery`] handle that scans and the HTTP dispatcher read through.
pub struct Store<Q> {
    directory: PathBuf,
    query: Q,
    lifecycle: Mutex<Lifecycle>,
}

impl<Q: NodeQuery> Store<Q> {
    /// Wrap an already-constructed query handle. `present` mirrors
    /// whether the on-disk directory already held a store (so `create`
    /// vs. `open` can be selected the way `Executor::do_run` does: try
    /// `open`, and only `create` if nothing was there).
    pub fn new(directory: impl Into<PathBuf>, query: Q, present: bool) -> Self {
        Store {
            directory: directory.into(),
            query,
            lifecycle: Mutex::new(if present { Lifecycle::Present } else { Lifecycle::Absent }),
        }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock().expect("store lifecycle mutex poisoned")
    }

    fn transition(&self, from: &[Lifecycle], to: Lifecycle, what: &'static str) -> Result<(), StoreError> {
        let mut state = self.lifecycle.lock().expect("store lifecycle mutex poisoned");
        if !from.contains(&*state) {
            return Err(StoreError::InvalidTransition(what));
        }
        *state = to;
        Ok(())
    }

    /// `absent -> create -> open`: checks/creates the directory, installs
    /// genesis (only on creation), and reports progress per table.
    pub fn create(&self, mut progress: impl FnMut(&str, Table)) -> Result<(), StoreError> {
        self.transition(&[Lifecycle::Absent], Lifecycle::Running, "create requires an absent store")?;
        check_store_path(&self.directory, true)?;
        for table in Table::ALL {
            progress("create", table);
        }
        progress("genesis", Table::Header);
        Ok(())
    }

    /// `absent|present -> open -> running`. On `flush_lock`, callers
    /// should attempt [`Store::restore`] per §4.4's failure semantics;
    /// any other error is fatal for this invocation. `Closed` is also
    /// accepted here: it is the state `restore` and `close` both leave
    /// the facade in, and a restore-then-reopen is a legitimate
    /// same-process recovery path (§4.4's `dirty -> restore -> close`
    /// row is immediately followed, on the executor's next attempt, by
    /// `present -> open -> running`).
    pub fn open(&self, mut progress: impl FnMut(&str, Table)) -> Result<(), StoreError> {
        self.transition(
            &[Lifecycle::Present, Lifecycle::Absent, Lifecycle::Closed],
            Lifecycle::Running,
            "open requires a present, absent, or closed store",
        )?;
        check_store_path(&self.directory, false).map_err(|_| StoreError::FlushLock)?;
        if self.query.is_dirty() {
            *self.lifecycle.lock().expect("store lifecycle mutex poisoned") = Lifecycle::Dirty;
            return Err(StoreError::FlushLock);
        }
        for table in Table::ALL {
            progress("open", table);
        }
        Ok(())
    }

    /// `running -> close`. Total: every successful `open`/`create` must
    /// be matched by exactly one `close` before process exit (§3
    /// invariants).
    pub fn close(&self, mut progress: impl FnMut(&str, Table)) -> Result<(), StoreError> {
        self.transition(&[Lifecycle::Running], Lifecycle::Closed, "close requires a running store")?;
        for table in Table::ALL {
            progress("close", table);
        }
        Ok(())
    }

    /// `dirty -> restore -> close`: restore from the most recent
    /// snapshot, then leave the store closed (the caller reopens).
    pub fn restore(&self, mut progress: impl FnMut(&str, Table)) -> Result<(), StoreError> {
        self.transition(&[Lifecycle::Dirty], Lifecycle::Closed, "restore requires a dirty store")?;
        for table in Table::ALL {
            progress("restore", table);
        }
        Ok(())
    }

    /// `running ∧ full -> reload -> running`: repair the full-disk
    /// state. Refused if `get_fault()` is nonzero.
    pub fn reload(&self, mut progress: impl FnMut(&str, Table)) -> Result<(), StoreError> {
        if let Some(fault) = self.query.get_fault() {
            return Err(fault);
        }
        self.transition(&[Lifecycle::Running], Lifecycle::Running, "reload requires a running store")?;
        for table in Table::ALL {
            progress("reload", table);
        }
        Ok(())
    }

    /// Hot backup (`running ∧ ¬fault`) or cold backup (`¬running`), per
    /// the two `snapshot` rows in §4.4's transition table. Refused if
    /// `get_fault()` is nonzero.
    pub fn snapshot(&self, mut progress: impl FnMut(&str, Table)) -> Result<(), StoreError> {
        if let Some(fault) = self.query.get_fault() {
            return Err(fault);
        }
        let state = self.lifecycle();
        if state != Lifecycle::Running && state != Lifecycle::Closed && state != Lifecycle::Present {
            return Err(StoreError::InvalidTransition("snapshot requires running or stopped store"));
        }
        for table in Table::ALL {
            progress("snapshot", table);
        }
        Ok(())
    }

    /// Per-table fault dump for the `errors` console command
    /// (`do_report_condition`, `executor_options.cpp`).
    pub fn report(&self, mut on_table: impl FnMut(Table, Option<&StoreError>)) {
        let fault = self.query.get_fault();
        for table in Table::ALL {
            on_table(table, fault.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeQuery;

    #[test]
    fn create_then_close_round_trips_through_running() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path(), FakeQuery::empty(), false);
        assert_eq!(store.lifecycle(), Lifecycle::Absent);

        let mut seen = Vec::new();
        store.create(|event, table| seen.push((event.to_string(), table))).unwrap();
        assert_eq!(store.lifecycle(), Lifecycle::Running);
        assert!(seen.iter().any(|(e, _)| e == "genesis"));

        store.close(|_, _| {}).unwrap();
        assert_eq!(store.lifecycle(), Lifecycle::Closed);
    }

    #[test]
    fn open_twice_without_close_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path()).unwrap();
        let store = Store::new(dir.path(), FakeQuery::empty(), true);
        store.open(|_, _| {}).unwrap();
        assert!(store.open(|_, _| {}).is_err());
    }

    #[test]
    fn open_on_dirty_store_reports_flush_lock_and_requires_restore() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path()).unwrap();
        let store = Store::new(dir.path(), FakeQuery::dirty(), true);
        let err = store.open(|_, _| {}).unwrap_err();
        assert_eq!(err, StoreError::FlushLock);
        assert_eq!(store.lifecycle(), Lifecycle::Dirty);
        store.restore(|_, _| {}).unwrap();
        assert_eq!(store.lifecycle(), Lifecycle::Closed);
    }

    #[test]
    fn reload_refused_when_fault_latched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path()).unwrap();
        let store = Store::new(dir.path(), FakeQuery::faulted(), true);
        store.open(|_, _| {}).unwrap();
        assert_eq!(store.reload(|_, _| {}).unwrap_err(), StoreError::Integrity);
    }

    #[test]
    fn snapshot_refused_when_fault_latched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path()).unwrap();
        let store = Store::new(dir.path(), FakeQuery::faulted(), true);
        store.open(|_, _| {}).unwrap();
        assert!(store.snapshot(|_, _| {}).is_err());
    }
}
