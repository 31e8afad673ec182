//! # sluice-kernel: Functional core of `Sluice`
//!
//! A replicated FIFO queue expressed as a deterministic state machine.
//! Each replica applies the same ordered stream of committed commands
//! and derives identical state; the consensus layer owns the log, the
//! machine owns the meaning.
//!
//! ## Key Principles
//!
//! - **No IO**: the machine never touches disk, network, or any
//!   external resource
//! - **No clocks, no randomness**: same input always produces the same
//!   output
//! - **Effects as data**: `apply(log_index, command, state)` returns
//!   `(state, effects)`; the host executes the effects afterwards
//!
//! ## Architecture
//!
//! - [`command`]: commands carried by log entries (`Enqueue`,
//!   `Checkout`, `Settle`, `Return`, `Down`)
//! - [`state`]: the queue state — unassigned messages, the live-index
//!   map, customer bookkeeping, the service queue
//! - [`index`]: ordered index over live log positions with per-entry
//!   snapshot slots
//! - [`kernel`]: the interpreter, checkout engine, and release-cursor
//!   tracker
//! - [`effects`]: the effect protocol (`Monitor`, `SendMsg`,
//!   `IncrMetrics`, `ReleaseCursor`, ...)
//! - [`runtime`]: executes effect lists against pluggable transports
//! - [`state_hash`]: canonical bytes and BLAKE3 state hashing
//!
//! ## Example
//!
//! ```ignore
//! use sluice_kernel::{Command, CheckoutSpec, apply, init};
//! use sluice_types::{LogIndex, QueueName};
//!
//! let (state, _) = init::<u64>(QueueName::new("orders"));
//! let (state, effects) = apply(LogIndex::new(1), Command::enqueue("job"), state);
//! // Execute effects via the runtime...
//! ```

pub mod command;
pub mod effects;
pub mod index;
pub mod kernel;
pub mod runtime;
pub mod state;
pub mod state_hash;


#[cfg(test)]
mod tests_assertions;

// Re-export commonly used items
pub use command::{CheckoutSpec, Command, Lifetime};
pub use effects::{Effect, MetricField};
pub use index::Index;
pub use kernel::{SHADOW_COPY_INTERVAL, apply, init, leader_effects};
pub use runtime::{
    CustomerTransport, InMemoryCompactor, InMemoryMetrics, InMemoryTransport, LogCompactor,
    MetricsSink, NoOpCompactor, Runtime, RuntimeError,
};
pub use state::{Customer, Overview, QueueState};
