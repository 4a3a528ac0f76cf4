pub mod actor;
pub mod messages;
pub mod scheduler;
pub mod spawn;

pub use actor::{Actor, ActorContext, ActorRef};
pub use messages::WorkerMsg;
pub use spawn::spawn_actor;
