//! Commands interpreted by the queue state machine.
//!
//! One command per replicated log entry. The command surface is a
//! closed tagged union; the host shell owns consensus-level builtin
//! entries and never hands them to the machine.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sluice_types::MessageId;

/// How long a customer's subscription lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifetime {
    /// Drains after `num` deliveries, then the customer is dropped.
    Once,
    /// Persistent subscription that keeps replenishing its credit.
    Auto,
}

/// Credit specification carried by a checkout command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSpec {
    pub lifetime: Lifetime,
    /// Maximum outstanding (checked-out) deliveries; for `Once` also
    /// the total number of deliveries before the customer drains.
    pub num: u64,
}

impl CheckoutSpec {
    pub fn once(num: u64) -> Self {
        Self {
            lifetime: Lifetime::Once,
            num,
        }
    }

    pub fn auto(num: u64) -> Self {
        Self {
            lifetime: Lifetime::Auto,
            num,
        }
    }
}

/// A command applied by the queue state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command<C> {
    /// Add a message to the tail of the queue.
    Enqueue { msg: Bytes },

    /// Create a customer subscription, or respecify the lifetime and
    /// credit of an existing one.
    Checkout { spec: CheckoutSpec, customer_id: C },

    /// Acknowledge a delivery; the message leaves the queue for good.
    Settle { msg_id: MessageId, customer_id: C },

    /// Reject a delivery; the message re-enters the queue at its
    /// original log position.
    Return { msg_id: MessageId, customer_id: C },

    /// The customer endpoint is gone; every outstanding delivery
    /// re-enters the queue.
    Down { customer_id: C },
}

impl<C> Command<C> {
    pub fn enqueue(msg: impl Into<Bytes>) -> Self {
        Command::Enqueue { msg: msg.into() }
    }

    pub fn checkout(spec: CheckoutSpec, customer_id: C) -> Self {
        Command::Checkout { spec, customer_id }
    }

    pub fn settle(msg_id: MessageId, customer_id: C) -> Self {
        Command::Settle {
            msg_id,
            customer_id,
        }
    }

    pub fn return_msg(msg_id: MessageId, customer_id: C) -> Self {
        Command::Return {
            msg_id,
            customer_id,
        }
    }

    pub fn down(customer_id: C) -> Self {
        Command::Down { customer_id }
    }
}
