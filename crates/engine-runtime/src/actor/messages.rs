//! The message type the per-source worker actor understands.

use super::actor::ActorRef;

#[derive(Debug)]
pub enum WorkerMsg {
    /// Give the actor a handle to its own mailbox, so it can reschedule
    /// its next tick from inside `handle`.
    SetSelfRef(ActorRef<WorkerMsg>),
    /// Run one sync cycle for the source this worker owns.
    Tick,
    /// Stop after any in-flight cycle completes.
    Shutdown,
}
