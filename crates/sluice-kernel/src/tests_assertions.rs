//! Tests for the assertions the machine enforces at runtime.
//!
//! The consensus layer owes the machine monotonically increasing log
//! indices; violating that is a host bug and trips an assertion rather
//! than corrupting state. The remaining tests pin down bookkeeping the
//! interpreter double-checks with `debug_assert!`.

#[cfg(test)]
mod tests {
    use sluice_types::{LogIndex, MessageId, QueueName};

    use crate::command::{CheckoutSpec, Command};
    use crate::effects::Effect;
    use crate::kernel::{apply, init};
    use crate::state::QueueState;

    fn new_queue() -> QueueState<u64> {
        init(QueueName::new("assertions")).0
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn non_monotonic_enqueue_is_fatal() {
        let (state, _) = apply(LogIndex::new(5), Command::enqueue("a"), new_queue());
        // Replaying an older position is a consensus-layer bug.
        let _ = apply(LogIndex::new(4), Command::enqueue("b"), state);
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn repeated_log_index_is_fatal() {
        let (state, _) = apply(LogIndex::new(5), Command::enqueue("a"), new_queue());
        let _ = apply(LogIndex::new(5), Command::enqueue("b"), state);
    }

    #[test]
    fn metrics_effect_is_always_last() {
        let entries: Vec<(u64, Command<u64>)> = vec![
            (1, Command::enqueue("a")),
            (2, Command::checkout(CheckoutSpec::auto(1), 9)),
            (3, Command::settle(MessageId::ZERO, 9)),
        ];

        let mut state = new_queue();
        for (i, cmd) in entries {
            let (next, effects) = apply(LogIndex::new(i), cmd, state);
            state = next;
            assert!(
                matches!(effects.last(), Some(Effect::IncrMetrics { .. })),
                "apply at {i} must end with its metrics effect"
            );
        }
    }

    #[test]
    fn floors_track_the_maps_through_mixed_traffic() {
        let entries: Vec<(u64, Command<u64>)> = vec![
            (1, Command::enqueue("a")),
            (2, Command::enqueue("b")),
            (3, Command::checkout(CheckoutSpec::auto(1), 1)),
            (4, Command::enqueue("c")),
            (5, Command::return_msg(MessageId::ZERO, 1)),
            (6, Command::settle(MessageId::new(1), 1)),
            (7, Command::down(1)),
        ];

        let mut state = new_queue();
        for (i, cmd) in entries {
            let (next, _) = apply(LogIndex::new(i), cmd, state);
            state = next;

            assert_eq!(
                state.low_index(),
                state.messages().first_key_value().map(|(idx, _)| *idx),
                "after entry {i}"
            );
            assert_eq!(
                state.first_enqueue_log_index(),
                state.index().smallest().map(|(idx, _)| idx),
                "after entry {i}"
            );
        }
    }
}
