//! The queue machine — pure functional core of `Sluice`.
//!
//! The machine applies committed log entries to produce new state and
//! effects. It is completely pure: no IO, no clocks, no randomness.
//! Given the same entries in the same order, every replica computes
//! byte-equal state.
//!
//! # Example
//!
//! ```ignore
//! let (state, _) = init::<u64>(QueueName::new("orders"));
//! let (state, effects) = apply(LogIndex::new(1), Command::enqueue("job"), state);
//! // Host executes effects...
//! ```

use sluice_types::{LogIndex, QueueName};

use crate::command::{Command, Lifetime};
use crate::effects::{Effect, MetricField};
use crate::state::QueueState;

/// Number of enqueues between shadow copies attached to index entries.
///
/// Bounds release-cursor granularity independently of settlement
/// pattern: at most one usable snapshot rides along per interval.
pub const SHADOW_COPY_INTERVAL: u64 = 128;

/// Creates an empty queue and announces its zeroed metrics row.
pub fn init<C: Ord + Clone>(name: QueueName) -> (QueueState<C>, Vec<Effect<C>>) {
    let effects = vec![Effect::IncrMetrics {
        queue: name.clone(),
        deltas: vec![
            (MetricField::Enqueues, 0),
            (MetricField::Checkouts, 0),
            (MetricField::Settlements, 0),
            (MetricField::Returns, 0),
        ],
    }];
    (QueueState::new(name), effects)
}

/// Effects a replica emits on becoming leader: a monitor for every
/// known customer. Customer identities survive leader changes; the
/// monitors watching them do not.
pub fn leader_effects<C: Ord + Clone>(state: &QueueState<C>) -> Vec<Effect<C>> {
    state
        .customers()
        .keys()
        .map(|customer_id| Effect::Monitor {
            customer_id: customer_id.clone(),
        })
        .collect()
}

/// Applies a committed command, producing the next state and the
/// effects the host must execute.
///
/// Total and deterministic: no command fails. A settle, return, or
/// down naming an unknown customer or message id is a stale duplicate
/// (or a replay past a snapshot) and is dropped silently.
pub fn apply<C: Ord + Clone>(
    log_index: LogIndex,
    cmd: Command<C>,
    state: QueueState<C>,
) -> (QueueState<C>, Vec<Effect<C>>) {
    let mut state = state;
    let mut effects = Vec::new();

    match cmd {
        Command::Enqueue { msg } => {
            let shadow = state.take_shadow_if_due();
            state = state.with_enqueued(log_index, msg, shadow);

            let delivered = checkout(&mut state, &mut effects);

            // Postcondition: the admitted position stays indexed even
            // if its message was delivered in the same apply.
            debug_assert!(
                state.index().contains(log_index),
                "enqueued position {log_index} must be indexed"
            );
            debug_assert_eq!(
                state.first_enqueue_log_index(),
                state.index().smallest().map(|(idx, _)| idx),
                "first enqueue position must track the smallest live index"
            );

            effects.push(incr_metrics(
                &state,
                vec![
                    (MetricField::Enqueues, 1),
                    (MetricField::Checkouts, delivered),
                ],
            ));
            (state, effects)
        }

        Command::Checkout { spec, customer_id } => {
            effects.push(Effect::Monitor {
                customer_id: customer_id.clone(),
            });

            state.upsert_customer(customer_id.clone(), spec);
            update_or_remove_sub(&customer_id, &mut state, &mut effects);

            let delivered = checkout(&mut state, &mut effects);

            // Postcondition: service-queue membership matches the
            // subscription policy for the (re)specified customer.
            debug_assert!(
                state
                    .customer(&customer_id)
                    .is_none_or(|c| c.wants_service()
                        == state.service_queue().contains(&customer_id)),
                "service queue membership must match the subscription policy"
            );

            effects.push(incr_metrics(&state, vec![(MetricField::Checkouts, delivered)]));
            (state, effects)
        }

        Command::Settle {
            msg_id,
            customer_id,
        } => {
            let Some((settled_idx, _msg)) = state.take_checked_out(&customer_id, msg_id) else {
                return (state, effects);
            };

            update_or_remove_sub(&customer_id, &mut state, &mut effects);
            state.delete_from_index(settled_idx);

            let delivered = checkout(&mut state, &mut effects);
            update_release_cursor(log_index, settled_idx, &mut state, &mut effects);

            // Postcondition: the settled position is gone for good.
            debug_assert!(
                !state.index().contains(settled_idx),
                "settled position {settled_idx} must leave the index"
            );
            // Postcondition: a drained once-customer never lingers.
            debug_assert!(
                state
                    .customer(&customer_id)
                    .is_none_or(|c| !(c.is_drained() && c.checked_out().is_empty())),
                "drained once customer must be dropped after settlement"
            );
            debug_assert_eq!(
                state.first_enqueue_log_index(),
                state.index().smallest().map(|(idx, _)| idx),
                "first enqueue position must track the smallest live index"
            );

            effects.push(incr_metrics(
                &state,
                vec![
                    (MetricField::Checkouts, delivered),
                    (MetricField::Settlements, 1),
                ],
            ));
            (state, effects)
        }

        Command::Return {
            msg_id,
            customer_id,
        } => {
            let Some((returned_idx, msg)) = state.take_checked_out(&customer_id, msg_id) else {
                return (state, effects);
            };

            state.restore_message(returned_idx, msg);
            update_or_remove_sub(&customer_id, &mut state, &mut effects);

            let delivered = checkout(&mut state, &mut effects);

            // Postcondition: the returned position kept its index entry
            // through the round trip.
            debug_assert!(
                state.index().contains(returned_idx),
                "returned position {returned_idx} must stay indexed"
            );
            debug_assert!(
                state
                    .customer(&customer_id)
                    .is_none_or(|c| c.wants_service()
                        == state.service_queue().contains(&customer_id)),
                "service queue membership must match the subscription policy"
            );

            effects.push(incr_metrics(
                &state,
                vec![(MetricField::Checkouts, delivered), (MetricField::Returns, 1)],
            ));
            (state, effects)
        }

        Command::Down { customer_id } => {
            let Some(customer) = state.remove_customer(&customer_id) else {
                return (state, effects);
            };

            let checked_out = customer.into_checked_out();
            let returned = checked_out.len() as u64;
            for (_msg_id, (idx, msg)) in checked_out {
                state.restore_message(idx, msg);
            }

            // Postcondition: the customer is fully gone.
            debug_assert!(
                state.customer(&customer_id).is_none(),
                "departed customer must be dropped"
            );
            debug_assert!(
                !state.service_queue().contains(&customer_id),
                "departed customer must leave the service queue"
            );
            // Postcondition: the floor accounts for the returns.
            debug_assert_eq!(
                state.low_index(),
                state.messages().first_key_value().map(|(idx, _)| *idx),
                "low index must cache the smallest unassigned position"
            );

            effects.push(incr_metrics(&state, vec![(MetricField::Returns, returned)]));
            (state, effects)
        }
    }
}

/// Pairs the head of the message map with the head of the service
/// queue until either runs dry. Returns the number of deliveries made.
fn checkout<C: Ord + Clone>(state: &mut QueueState<C>, effects: &mut Vec<Effect<C>>) -> u64 {
    let mut delivered = 0;
    while state.num_messages() > 0 {
        let Some(customer_id) = state.pop_service() else {
            break;
        };
        if state.customer(&customer_id).is_none() {
            // Stale id; skip it without consuming a message.
            continue;
        }
        let Some((log_idx, msg)) = state.take_lowest_message() else {
            break;
        };
        let Some(customer) = state.customer_mut(&customer_id) else {
            state.restore_message(log_idx, msg);
            continue;
        };

        let msg_id = customer.assign(log_idx, msg.clone());

        // Postcondition: ids advance one per delivery and count them.
        debug_assert_eq!(
            customer.next_msg_id(),
            msg_id.next(),
            "message ids must be assigned in checkout order"
        );
        debug_assert_eq!(
            customer.next_msg_id().as_u64(),
            customer.seen(),
            "message ids must count deliveries"
        );

        update_or_remove_sub(&customer_id, state, effects);
        effects.push(Effect::SendMsg {
            customer_id,
            msg_id,
            msg,
        });
        delivered += 1;
    }

    debug_assert_eq!(
        state.low_index(),
        state.messages().first_key_value().map(|(idx, _)| *idx),
        "low index must cache the smallest unassigned position"
    );
    delivered
}

/// Post-assignment subscription policy.
///
/// After any change to a customer's outstanding set or credit, decides
/// whether the customer is dropped, kept idle, or kept awaiting
/// service. Service-queue membership is maintained eagerly so the
/// queue never names a customer without free credit.
fn update_or_remove_sub<C: Ord + Clone>(
    customer_id: &C,
    state: &mut QueueState<C>,
    effects: &mut Vec<Effect<C>>,
) {
    let Some(customer) = state.customer(customer_id) else {
        return;
    };
    match customer.lifetime() {
        Lifetime::Once if customer.is_drained() && customer.checked_out().is_empty() => {
            state.remove_customer(customer_id);
            effects.push(Effect::Demonitor {
                customer_id: customer_id.clone(),
            });
        }
        Lifetime::Once if customer.is_drained() => {
            // Everything delivered; the customer lingers until its
            // outstanding deliveries settle.
            state.remove_from_service(customer_id);
        }
        Lifetime::Once => state.ensure_service(customer_id),
        Lifetime::Auto if customer.has_credit() => state.ensure_service(customer_id),
        Lifetime::Auto => state.remove_from_service(customer_id),
    }
}

/// Decides whether a settlement lets the consensus log compact.
///
/// `log_index` is the settle command's own position, `settled_idx` the
/// position of the message it removed.
fn update_release_cursor<C: Ord + Clone>(
    log_index: LogIndex,
    settled_idx: LogIndex,
    state: &mut QueueState<C>,
    effects: &mut Vec<Effect<C>>,
) {
    if state.index().is_empty() {
        // Nothing contributes to state anymore; everything up to and
        // including the incoming command is captured by a copy taken
        // right now.
        state.set_first_enqueue(None);
        let snapshot = state.shadow_copy();
        effects.push(Effect::ReleaseCursor {
            log_index,
            snapshot,
        });
    } else if Some(settled_idx) == state.first_enqueue_log_index() {
        let Some((smallest, shadow)) = state.index().smallest() else {
            return;
        };
        let snapshot = shadow.cloned();
        state.set_first_enqueue(Some(smallest));
        if let Some(snapshot) = snapshot {
            // The shadow predates the enqueue at `smallest`, so the
            // last position it fully captures is the one before it.
            effects.push(Effect::ReleaseCursor {
                log_index: smallest - LogIndex::new(1),
                snapshot,
            });
        }
    }
}

fn incr_metrics<C: Ord + Clone>(
    state: &QueueState<C>,
    deltas: Vec<(MetricField, u64)>,
) -> Effect<C> {
    Effect::IncrMetrics {
        queue: state.name().clone(),
        deltas,
    }
}
