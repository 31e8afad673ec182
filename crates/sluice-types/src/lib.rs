//! # sluice-types: Core types for `Sluice`
//!
//! This crate contains the shared identifier types used across the
//! `Sluice` queue machine:
//! - Log positions ([`LogIndex`]) assigned by the consensus layer
//! - Per-customer delivery numbers ([`MessageId`])
//! - Queue identity ([`QueueName`])
//!
//! All identifier types are cheap `Copy` values (except [`QueueName`])
//! with total ordering, so they can key the ordered maps the queue
//! state is built from.

use std::fmt::Display;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

// ============================================================================
// LogIndex
// ============================================================================

/// Position of a command in the replicated log.
///
/// Log indices are assigned by the consensus layer and observed by the
/// state machine; the machine never generates them. They increase
/// monotonically across the life of a log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LogIndex(u64);

impl LogIndex {
    pub const ZERO: LogIndex = LogIndex(0);

    pub fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the index as a `u64`.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for LogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for LogIndex {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for LogIndex {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for LogIndex {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl From<u64> for LogIndex {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<LogIndex> for u64 {
    fn from(index: LogIndex) -> Self {
        index.0
    }
}

// ============================================================================
// MessageId
// ============================================================================

/// Delivery number of a message, scoped to a single customer.
///
/// Assigned by the state machine in checkout order, starting at 0 for
/// every customer and incrementing on each delivery to that customer.
/// Customers settle and return messages by `MessageId`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct MessageId(u64);

impl MessageId {
    pub const ZERO: MessageId = MessageId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the id as a `u64`.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The id assigned to the delivery after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<MessageId> for u64 {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

// ============================================================================
// QueueName
// ============================================================================

/// Symbolic name of a queue, used to key its metrics row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for QueueName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for QueueName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<QueueName> for String {
    fn from(value: QueueName) -> Self {
        value.0
    }
}
