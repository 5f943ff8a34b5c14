mod signaling_adapter;
mod signaling_output;
mod subscription;
mod ws_relay;

pub use signaling_adapter::*;
pub use signaling_output::*;
pub use subscription::*;
pub use ws_relay::*;
