//! Queue state and customer bookkeeping.
//!
//! The state is plain data: ordered maps keyed by log index and
//! customer id, so every replica iterates (and therefore hashes and
//! serializes) in the same order. Fields are private; transitions go
//! through the `pub(crate)` mutators below, and the interpreter in
//! [`crate::kernel`] is their only caller.

use std::collections::{BTreeMap, VecDeque};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sluice_types::{LogIndex, MessageId, QueueName};

use crate::command::{CheckoutSpec, Lifetime};
use crate::index::Index;
use crate::kernel::SHADOW_COPY_INTERVAL;

// ============================================================================
// Customer
// ============================================================================

/// Per-customer subscription bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    lifetime: Lifetime,
    num: u64,
    /// Unsettled deliveries, keyed by the per-customer message id.
    checked_out: BTreeMap<MessageId, (LogIndex, Bytes)>,
    next_msg_id: MessageId,
    /// Total deliveries ever made to this customer; drives `Once`
    /// completion.
    seen: u64,
}

impl Customer {
    pub(crate) fn new(spec: CheckoutSpec) -> Self {
        Self {
            lifetime: spec.lifetime,
            num: spec.num,
            checked_out: BTreeMap::new(),
            next_msg_id: MessageId::ZERO,
            seen: 0,
        }
    }

    /// Replaces lifetime and credit, preserving all other bookkeeping.
    pub(crate) fn respecify(&mut self, spec: CheckoutSpec) {
        self.lifetime = spec.lifetime;
        self.num = spec.num;
    }

    /// Records a delivery: assigns the next message id and adds the
    /// message to the outstanding set.
    pub(crate) fn assign(&mut self, log_index: LogIndex, msg: Bytes) -> MessageId {
        let msg_id = self.next_msg_id;
        self.checked_out.insert(msg_id, (log_index, msg));
        self.next_msg_id = msg_id.next();
        self.seen += 1;
        msg_id
    }

    /// Removes one delivery from the outstanding set.
    pub(crate) fn take_checked_out(&mut self, msg_id: MessageId) -> Option<(LogIndex, Bytes)> {
        self.checked_out.remove(&msg_id)
    }

    /// Consumes the customer, yielding its outstanding deliveries.
    pub(crate) fn into_checked_out(self) -> BTreeMap<MessageId, (LogIndex, Bytes)> {
        self.checked_out
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn num(&self) -> u64 {
        self.num
    }

    pub fn checked_out(&self) -> &BTreeMap<MessageId, (LogIndex, Bytes)> {
        &self.checked_out
    }

    pub fn next_msg_id(&self) -> MessageId {
        self.next_msg_id
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// True when the customer can take another delivery.
    pub fn has_credit(&self) -> bool {
        (self.checked_out.len() as u64) < self.num
    }

    /// A `Once` customer that has been delivered everything it asked
    /// for. `>=` rather than `==` so a respecification that lowers
    /// `num` below `seen` completes the customer instead of wedging it.
    pub(crate) fn is_drained(&self) -> bool {
        matches!(self.lifetime, Lifetime::Once) && self.seen >= self.num
    }

    /// Whether the subscription policy wants this customer awaiting
    /// service.
    pub(crate) fn wants_service(&self) -> bool {
        match self.lifetime {
            Lifetime::Once => self.seen < self.num,
            Lifetime::Auto => self.has_credit(),
        }
    }

    /// Clone with the outstanding set emptied.
    pub(crate) fn emptied(&self) -> Self {
        Self {
            lifetime: self.lifetime,
            num: self.num,
            checked_out: BTreeMap::new(),
            next_msg_id: self.next_msg_id,
            seen: self.seen,
        }
    }
}

// ============================================================================
// Overview
// ============================================================================

/// Read-only operator summary of a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub kind: String,
    pub num_customers: usize,
    pub num_messages: usize,
}

// ============================================================================
// Queue state
// ============================================================================

/// The queue machine's state.
///
/// `C` is the customer identity: tests use integers, deployments use
/// endpoint handles. Any ordered, hashable, cloneable value works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Ord + Serialize",
    deserialize = "C: Ord + Deserialize<'de>"
))]
pub struct QueueState<C> {
    name: QueueName,
    /// Unassigned messages, keyed by the log index that produced them.
    messages: BTreeMap<LogIndex, Bytes>,
    /// Every log index still contributing to state, with shadow slots.
    index: Index<QueueState<C>>,
    /// Cached smallest key of `messages`.
    low_index: Option<LogIndex>,
    /// Smallest log index of any message still contributing to state.
    first_enqueue_log_index: Option<LogIndex>,
    customers: BTreeMap<C, Customer>,
    /// Customers awaiting service, each at most once.
    service_queue: VecDeque<C>,
    /// Modulo counter driving the shadow-copy cadence.
    enqueue_count: u64,
}

impl<C: Ord + Clone> QueueState<C> {
    /// Creates a new empty queue.
    pub fn new(name: QueueName) -> Self {
        Self {
            name,
            messages: BTreeMap::new(),
            index: Index::new(),
            low_index: None,
            first_enqueue_log_index: None,
            customers: BTreeMap::new(),
            service_queue: VecDeque::new(),
            enqueue_count: 0,
        }
    }

    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Unassigned messages.
    pub fn messages(&self) -> &BTreeMap<LogIndex, Bytes> {
        &self.messages
    }

    pub fn index(&self) -> &Index<QueueState<C>> {
        &self.index
    }

    pub fn low_index(&self) -> Option<LogIndex> {
        self.low_index
    }

    pub fn first_enqueue_log_index(&self) -> Option<LogIndex> {
        self.first_enqueue_log_index
    }

    pub fn customers(&self) -> &BTreeMap<C, Customer> {
        &self.customers
    }

    pub fn customer(&self, id: &C) -> Option<&Customer> {
        self.customers.get(id)
    }

    pub fn service_queue(&self) -> &VecDeque<C> {
        &self.service_queue
    }

    pub fn num_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn num_customers(&self) -> usize {
        self.customers.len()
    }

    /// Operator summary.
    pub fn overview(&self) -> Overview {
        Overview {
            kind: "sluice_fifo".to_string(),
            num_customers: self.num_customers(),
            num_messages: self.num_messages(),
        }
    }

    // ========================================================================
    // Transition mutators, called only from the interpreter
    // ========================================================================

    /// Advances the shadow-copy counter, yielding a copy on cadence.
    ///
    /// The copy captures the state before the triggering enqueue
    /// touches anything, counter included, so installing it and
    /// replaying that entry regenerates an identical slot.
    pub(crate) fn take_shadow_if_due(&mut self) -> Option<Self> {
        if self.enqueue_count + 1 == SHADOW_COPY_INTERVAL {
            let shadow = self.shadow_copy();
            self.enqueue_count = 1;
            Some(shadow)
        } else {
            self.enqueue_count += 1;
            None
        }
    }

    /// Admits a message: indexes the position, stores the payload, and
    /// lowers the cached floors.
    pub(crate) fn with_enqueued(
        mut self,
        log_index: LogIndex,
        msg: Bytes,
        shadow: Option<Self>,
    ) -> Self {
        self.index.append(log_index, shadow);
        self.messages.insert(log_index, msg);
        self.low_index = Some(self.low_index.map_or(log_index, |low| low.min(log_index)));
        self.first_enqueue_log_index = Some(
            self.first_enqueue_log_index
                .map_or(log_index, |first| first.min(log_index)),
        );
        self
    }

    /// Creates the customer, or replaces lifetime and credit of an
    /// existing one.
    pub(crate) fn upsert_customer(&mut self, customer_id: C, spec: CheckoutSpec) {
        match self.customers.get_mut(&customer_id) {
            Some(customer) => customer.respecify(spec),
            None => {
                self.customers.insert(customer_id, Customer::new(spec));
            }
        }
    }

    pub(crate) fn customer_mut(&mut self, customer_id: &C) -> Option<&mut Customer> {
        self.customers.get_mut(customer_id)
    }

    /// Drops the customer and purges it from the service queue.
    pub(crate) fn remove_customer(&mut self, customer_id: &C) -> Option<Customer> {
        let customer = self.customers.remove(customer_id)?;
        self.service_queue.retain(|id| id != customer_id);
        Some(customer)
    }

    /// Takes one delivery out of a customer's outstanding set; `None`
    /// when the customer or the message id is unknown.
    pub(crate) fn take_checked_out(
        &mut self,
        customer_id: &C,
        msg_id: MessageId,
    ) -> Option<(LogIndex, Bytes)> {
        self.customers.get_mut(customer_id)?.take_checked_out(msg_id)
    }

    pub(crate) fn pop_service(&mut self) -> Option<C> {
        self.service_queue.pop_front()
    }

    /// Appends the customer to the service queue unless already queued.
    pub(crate) fn ensure_service(&mut self, customer_id: &C) {
        if !self.service_queue.contains(customer_id) {
            self.service_queue.push_back(customer_id.clone());
        }
    }

    pub(crate) fn remove_from_service(&mut self, customer_id: &C) {
        self.service_queue.retain(|id| id != customer_id);
    }

    /// Removes and returns the oldest unassigned message, keeping the
    /// cached floor in step.
    pub(crate) fn take_lowest_message(&mut self) -> Option<(LogIndex, Bytes)> {
        let entry = self.messages.pop_first();
        self.low_index = self.messages.first_key_value().map(|(idx, _)| *idx);
        entry
    }

    /// Re-admits a checked-out message at its original position. The
    /// index entry survived the checkout, so only the message map and
    /// its cached floor move.
    pub(crate) fn restore_message(&mut self, log_index: LogIndex, msg: Bytes) {
        self.messages.insert(log_index, msg);
        self.low_index = Some(self.low_index.map_or(log_index, |low| low.min(log_index)));
    }

    pub(crate) fn delete_from_index(&mut self, log_index: LogIndex) {
        self.index.delete(log_index);
    }

    pub(crate) fn set_first_enqueue(&mut self, first: Option<LogIndex>) {
        self.first_enqueue_log_index = first;
    }

    #[cfg(test)]
    pub(crate) fn index_mut(&mut self) -> &mut Index<QueueState<C>> {
        &mut self.index
    }

    /// Produces the reduced state published with a release cursor.
    ///
    /// Keeps the queue identity, the enqueue counter, and the customer
    /// table with every outstanding set emptied; customers that the
    /// emptying drains are dropped entirely. Messages, the index, and
    /// the cached low/first positions are cleared.
    ///
    /// The service queue is rebuilt rather than blanked: existing order
    /// filtered to customers still awaiting service, then customers
    /// whose credit the emptying freed, in key order. Replaying a log
    /// suffix onto the copy must redispatch work exactly as the full
    /// run did, which requires every customer with free credit to be
    /// serviceable from the start.
    pub fn shadow_copy(&self) -> Self {
        let mut customers: BTreeMap<C, Customer> = BTreeMap::new();
        for (id, customer) in &self.customers {
            let emptied = customer.emptied();
            if emptied.is_drained() {
                continue;
            }
            customers.insert(id.clone(), emptied);
        }

        let mut service_queue: VecDeque<C> = self
            .service_queue
            .iter()
            .filter(|id| customers.get(*id).is_some_and(Customer::wants_service))
            .cloned()
            .collect();
        for (id, customer) in &customers {
            if customer.wants_service() && !service_queue.contains(id) {
                service_queue.push_back(id.clone());
            }
        }

        Self {
            name: self.name.clone(),
            messages: BTreeMap::new(),
            index: Index::new(),
            low_index: None,
            first_enqueue_log_index: None,
            customers,
            service_queue,
            enqueue_count: self.enqueue_count,
        }
    }
}
