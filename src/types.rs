//! Core type definitions for the simulation.
//!
//! This module defines the fundamental identifiers shared by the engine,
//! the entities and the timing registry.

/// Simulation time unit (virtual time, e.g. milliseconds).
///
/// Sampling intervals, link latencies and emission timestamps all use the
/// same `SimTime` representation. It never relates to wall-clock time.
pub type SimTime = u64;

/// Identifier of an entity registered with the engine.
///
/// Ids are assigned densely in registration order, starting at 0.
pub type EntityId = u64;

/// Identifier of a message.
///
/// Used both for the per-run message counter and for the tracking ids
/// handed out by the [`TimeKeeper`](crate::timekeeper::TimeKeeper).
pub type MessageId = u64;

/// Index of a loop inside its application graph (declaration order).
pub type LoopId = usize;

/// Owner context carried opaquely on messages.
pub type UserId = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_aliases() {
        let time: SimTime = 1000;
        let entity: EntityId = 42;
        let message: MessageId = 7;
        let loop_id: LoopId = 2;
        let user: UserId = 1;

        assert_eq!(time, 1000);
        assert_eq!(entity, 42);
        assert_eq!(message, 7);
        assert_eq!(loop_id, 2);
        assert_eq!(user, 1);
    }
}
