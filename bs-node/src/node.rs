// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! The external node collaborator (§1, §6): peer wire protocol, block
//! validator, mempool, and chain-state machine are out of scope. This
//! module models only the seam the executor actually drives — `start`,
//! `close`, and the connect/close notifiers — against [`MemoryQuery`]
//! (§1's placeholder for the real table set).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bs_estimator::Observation;
use bs_store::Hash32;
use slog::{info, Logger};

use crate::memory_query::MemoryQuery;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("node already started")]
    AlreadyStarted,
    #[error("node not started")]
    NotStarted,
}

/// One connected block, as handed to every connect subscriber (§2 "Data
/// flow": "incoming block events feed the Fee estimator").
#[derive(Debug, Clone)]
pub struct BlockConnected {
    pub height: usize,
    pub hash: Hash32,
    pub fee_observations: Vec<Observation>,
}

type ConnectHandler = Box<dyn Fn(&BlockConnected) + Send + Sync>;
type CloseHandler = Box<dyn Fn() + Send + Sync>;

/// The node handle `Executor::dispatch`'s run mode constructs from
/// `(query, config, log)` (§4.9 step d) and blocks on closing (§4.9 step
/// f: "close the node (blocks on its thread pool join)").
pub struct Node {
    query: Arc<MemoryQuery>,
    logger: Logger,
    running: AtomicBool,
    connect_subscribers: Mutex<Vec<ConnectHandler>>,
    close_subscribers: Mutex<Vec<CloseHandler>>,
}

impl Node {
    pub fn new(query: Arc<MemoryQuery>, logger: Logger) -> Self {
        Node {
            query,
            logger,
            running: AtomicBool::new(false),
            connect_subscribers: Mutex::new(Vec::new()),
            close_subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn query(&self) -> &Arc<MemoryQuery> {
        &self.query
    }

    pub fn subscribe_connect(&self, handler: impl Fn(&BlockConnected) + Send + Sync + 'static) {
        self.connect_subscribers.lock().expect("connect subscribers poisoned").push(Box::new(handler));
    }

    pub fn subscribe_close(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.close_subscribers.lock().expect("close subscribers poisoned").push(Box::new(handler));
    }

    /// Installs genesis if absent and marks the node running. The real
    /// peer-to-peer stack is out of scope (§1); "starting the network"
    /// here means only that the node is ready to accept `notify_connect`
    /// calls and serve HTTP queries.
    pub fn start(&self) -> Result<(), NodeError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(NodeError::AlreadyStarted);
        }
        self.query.install_genesis();
        info!(self.logger, "node started");
        Ok(())
    }

    /// Appends the block to the placeholder query and fires every
    /// connect subscriber, in subscription order.
    pub fn notify_connect(&self, event: BlockConnected) -> Result<(), NodeError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(NodeError::NotStarted);
        }
        self.query.connect_block(event.hash, 0, vec![]);
        for handler in self.connect_subscribers.lock().expect("connect subscribers poisoned").iter() {
            handler(&event);
        }
        Ok(())
    }

    /// Fires every close subscriber, then marks the node stopped.
    /// `Executor`'s own `wait_for_stopping` unblocks only after this
    /// returns (§5 "ordering guarantees").
    pub fn close(&self) -> Result<(), NodeError> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Err(NodeError::NotStarted);
        }
        for handler in self.close_subscribers.lock().expect("close subscribers poisoned").iter() {
            handler();
        }
        info!(self.logger, "node closed");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
