// Flowline domain model
//
// This crate provides the storage-agnostic domain types for the event
// sourcing and live-streaming subsystem.
//
// Key design decisions:
// - Events are immutable records ordered by a per-workspace sequence number;
//   wall-clock timestamps are advisory only and never used for ordering
// - Event kinds and actors are real sum types so matching is exhaustive
// - The EventBus is an explicitly constructed object passed via state,
//   not a process-global singleton, so tests can run independent buses
// - StepEvent is the producer-side vocabulary for execution progress;
//   the external wire vocabulary lives in flowline-protocol

pub mod bus;
pub mod error;
pub mod event;
pub mod execution;
pub mod step;
pub mod types;

// Re-exports for convenience
pub use bus::{EventBus, Subscription};
pub use error::{EventError, Result};
pub use event::{derive_entity, Event, NewEvent};
pub use execution::{Execution, ExecutionStatus};
pub use step::StepEvent;
pub use types::{Actor, EntityType, EventType};
