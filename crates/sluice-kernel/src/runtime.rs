//! Runtime layer that executes queue-machine effects.
//!
//! The machine is pure and produces effects as data. The runtime takes
//! those effects and executes them against concrete implementations of
//! the transport, metrics, and compaction traits.
//!
//! ## Example
//!
//! ```ignore
//! let mut runtime = Runtime::new(
//!     InMemoryTransport::new(),
//!     InMemoryMetrics::new(),
//!     InMemoryCompactor::new(),
//! );
//!
//! let (state, effects) = apply(log_index, cmd, state);
//! runtime.execute_effects(effects)?;
//! ```

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use sluice_types::{LogIndex, MessageId, QueueName};

use crate::effects::{Effect, MetricField};
use crate::state::QueueState;

// ============================================================================
// Traits
// ============================================================================

/// Interaction with a customer endpoint: delivery plus liveness
/// monitoring.
pub trait CustomerTransport<C> {
    fn deliver(&mut self, customer_id: &C, msg_id: MessageId, msg: Bytes)
    -> Result<(), TransportError>;

    fn monitor(&mut self, customer_id: &C) -> Result<(), TransportError>;

    fn demonitor(&mut self, customer_id: &C) -> Result<(), TransportError>;
}

/// Counter storage for queue metrics rows.
pub trait MetricsSink {
    fn increment(
        &mut self,
        queue: &QueueName,
        deltas: &[(MetricField, u64)],
    ) -> Result<(), MetricsError>;
}

/// Receiver for release cursors, normally the consensus log.
pub trait LogCompactor<C> {
    fn release_cursor(
        &mut self,
        log_index: LogIndex,
        snapshot: QueueState<C>,
    ) -> Result<(), CompactionError>;
}

// ============================================================================
// Errors
// ============================================================================

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("customer endpoint is unreachable")]
    Unreachable,

    #[error("delivery channel is saturated")]
    Backpressure,
}

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("metrics sink is closed")]
    Closed,
}

#[derive(thiserror::Error, Debug)]
pub enum CompactionError {
    #[error("release cursor regressed: held {held}, offered {offered}")]
    Regressed { held: LogIndex, offered: LogIndex },
}

/// Errors surfaced while executing an effect list.
#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Compaction(#[from] CompactionError),
}

// ============================================================================
// Runtime
// ============================================================================

/// Executes effect lists against pluggable trait implementations.
///
/// Generic over transport, metrics, and compaction to serve both
/// production hosts and in-memory test harnesses.
pub struct Runtime<T, M, K> {
    pub transport: T,
    pub metrics: M,
    pub compactor: K,
}

impl<T, M, K> Runtime<T, M, K> {
    pub fn new(transport: T, metrics: M, compactor: K) -> Self {
        Self {
            transport,
            metrics,
            compactor,
        }
    }

    /// Executes a single effect.
    pub fn execute_effect<C>(&mut self, effect: Effect<C>) -> Result<(), RuntimeError>
    where
        C: Ord,
        T: CustomerTransport<C>,
        M: MetricsSink,
        K: LogCompactor<C>,
    {
        match effect {
            Effect::Monitor { customer_id } => self.transport.monitor(&customer_id)?,
            Effect::Demonitor { customer_id } => self.transport.demonitor(&customer_id)?,
            Effect::SendMsg {
                customer_id,
                msg_id,
                msg,
            } => self.transport.deliver(&customer_id, msg_id, msg)?,
            Effect::IncrMetrics { queue, deltas } => self.metrics.increment(&queue, &deltas)?,
            Effect::ReleaseCursor {
                log_index,
                snapshot,
            } => self.compactor.release_cursor(log_index, snapshot)?,
        }
        Ok(())
    }

    /// Executes all effects in order, stopping at the first error.
    pub fn execute_effects<C>(&mut self, effects: Vec<Effect<C>>) -> Result<(), RuntimeError>
    where
        C: Ord,
        T: CustomerTransport<C>,
        M: MetricsSink,
        K: LogCompactor<C>,
    {
        for effect in effects {
            self.execute_effect(effect)?;
        }
        Ok(())
    }
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// Records deliveries and monitor state; for tests and local runs.
#[derive(Debug)]
pub struct InMemoryTransport<C> {
    deliveries: Vec<(C, MessageId, Bytes)>,
    monitored: BTreeSet<C>,
}

impl<C> Default for InMemoryTransport<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryTransport<C> {
    pub fn new() -> Self {
        Self {
            deliveries: Vec::new(),
            monitored: BTreeSet::new(),
        }
    }

    /// Every delivery made so far, in order.
    pub fn deliveries(&self) -> &[(C, MessageId, Bytes)] {
        &self.deliveries
    }
}

impl<C: Ord> InMemoryTransport<C> {
    pub fn is_monitored(&self, customer_id: &C) -> bool {
        self.monitored.contains(customer_id)
    }
}

impl<C: Ord + Clone> CustomerTransport<C> for InMemoryTransport<C> {
    fn deliver(
        &mut self,
        customer_id: &C,
        msg_id: MessageId,
        msg: Bytes,
    ) -> Result<(), TransportError> {
        self.deliveries.push((customer_id.clone(), msg_id, msg));
        Ok(())
    }

    fn monitor(&mut self, customer_id: &C) -> Result<(), TransportError> {
        self.monitored.insert(customer_id.clone());
        Ok(())
    }

    fn demonitor(&mut self, customer_id: &C) -> Result<(), TransportError> {
        self.monitored.remove(customer_id);
        Ok(())
    }
}

/// Counter rows in a plain map.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: BTreeMap<QueueName, BTreeMap<MetricField, u64>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one counter; zero if never touched.
    pub fn get(&self, queue: &QueueName, field: MetricField) -> u64 {
        self.counters
            .get(queue)
            .and_then(|row| row.get(&field))
            .copied()
            .unwrap_or(0)
    }

    /// True once a row has been announced for the queue.
    pub fn has_row(&self, queue: &QueueName) -> bool {
        self.counters.contains_key(queue)
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment(
        &mut self,
        queue: &QueueName,
        deltas: &[(MetricField, u64)],
    ) -> Result<(), MetricsError> {
        let row = self.counters.entry(queue.clone()).or_default();
        for (field, delta) in deltas {
            *row.entry(*field).or_insert(0) += delta;
        }
        Ok(())
    }
}

/// Retains every cursor offered, rejecting regressions.
#[derive(Debug)]
pub struct InMemoryCompactor<C> {
    cursors: Vec<(LogIndex, QueueState<C>)>,
}

impl<C> Default for InMemoryCompactor<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryCompactor<C> {
    pub fn new() -> Self {
        Self {
            cursors: Vec::new(),
        }
    }

    pub fn cursors(&self) -> &[(LogIndex, QueueState<C>)] {
        &self.cursors
    }

    pub fn latest(&self) -> Option<&(LogIndex, QueueState<C>)> {
        self.cursors.last()
    }
}

impl<C: Ord> LogCompactor<C> for InMemoryCompactor<C> {
    fn release_cursor(
        &mut self,
        log_index: LogIndex,
        snapshot: QueueState<C>,
    ) -> Result<(), CompactionError> {
        if let Some((held, _)) = self.cursors.last() {
            if log_index < *held {
                return Err(CompactionError::Regressed {
                    held: *held,
                    offered: log_index,
                });
            }
        }
        self.cursors.push((log_index, snapshot));
        Ok(())
    }
}

/// Discards cursors; for hosts that do not compact.
#[derive(Debug, Default)]
pub struct NoOpCompactor;

impl<C> LogCompactor<C> for NoOpCompactor {
    fn release_cursor(
        &mut self,
        _log_index: LogIndex,
        _snapshot: QueueState<C>,
    ) -> Result<(), CompactionError> {
        Ok(())
    }
}
