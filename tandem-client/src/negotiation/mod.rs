mod candidate_queue;
mod negotiation_engine;
mod offer_slot;
mod session_snapshot;
mod signaling_state;

pub use candidate_queue::*;
pub use negotiation_engine::*;
pub use offer_slot::*;
pub use session_snapshot::*;
pub use signaling_state::*;
