mod call_behavior;
mod peer_session;
mod session_command;
mod session_registry;

pub use call_behavior::*;
pub use peer_session::*;
pub use session_command::*;
pub use session_registry::*;
