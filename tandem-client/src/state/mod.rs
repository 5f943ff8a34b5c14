mod call_status;
mod session_state_store;

pub use call_status::*;
pub use session_state_store::*;
