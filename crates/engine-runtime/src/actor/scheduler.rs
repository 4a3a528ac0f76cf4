use std::time::Duration;

use tokio::time;

use crate::error::ActorError;

use super::actor::ActorRef;
use super::messages::WorkerMsg;

/// Ticks a worker on a fixed cadence: a short delay right after a cycle
/// that moved rows, a longer idle delay when a cycle found nothing new.
pub struct TickScheduler {
    actor_ref: ActorRef<WorkerMsg>,
    immediate_delay: Duration,
    idle_delay: Duration,
}

impl TickScheduler {
    pub fn new(actor_ref: ActorRef<WorkerMsg>, immediate_delay: Duration, idle_delay: Duration) -> Self {
        Self {
            actor_ref,
            immediate_delay,
            idle_delay,
        }
    }

    pub async fn schedule_immediate(&self) -> Result<(), ActorError> {
        time::sleep(self.immediate_delay).await;
        self.actor_ref.send(WorkerMsg::Tick).await
    }

    pub async fn schedule_idle(&self) -> Result<(), ActorError> {
        time::sleep(self.idle_delay).await;
        self.actor_ref.send(WorkerMsg::Tick).await
    }
}
