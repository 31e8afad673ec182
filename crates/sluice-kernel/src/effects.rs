//! Effects produced by the queue machine.
//!
//! Effects represent side effects the host must execute after a
//! command is applied. The machine is pure — it describes actions but
//! never performs them, which is what makes replicas deterministic and
//! the core testable without mocks.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sluice_types::{LogIndex, MessageId, QueueName};

use crate::state::QueueState;

/// Counter columns of a queue's metrics row.
///
/// Discriminants are the column positions in the row; position 1 is
/// the queue name itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum MetricField {
    Enqueues = 2,
    Checkouts = 3,
    Settlements = 4,
    Returns = 5,
}

impl MetricField {
    /// Column position in the metrics row.
    pub fn position(self) -> u8 {
        self as u8
    }
}

/// An effect to be executed by the host, in order, after `apply`
/// returns.
///
/// When an apply produces a metrics effect it is always the last
/// element of the effect list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Ord + Serialize",
    deserialize = "C: Ord + Deserialize<'de>"
))]
pub enum Effect<C> {
    /// Watch liveness of the customer endpoint.
    Monitor { customer_id: C },

    /// Stop watching the customer endpoint.
    Demonitor { customer_id: C },

    /// Deliver a message to the customer.
    SendMsg {
        customer_id: C,
        msg_id: MessageId,
        msg: Bytes,
    },

    /// Atomically add deltas to the queue's metrics row. Zero deltas
    /// announce the row.
    IncrMetrics {
        queue: QueueName,
        deltas: Vec<(MetricField, u64)>,
    },

    /// The log up to and including `log_index` may be compacted; its
    /// effects are fully captured by `snapshot`.
    ReleaseCursor {
        log_index: LogIndex,
        snapshot: QueueState<C>,
    },
}
