mod config;
mod error;
mod media;
mod negotiation;
mod session;
mod signaling;
mod state;
mod transport;

pub use config::*;
pub use error::*;
pub use media::*;
pub use negotiation::*;
pub use session::*;
pub use signaling::*;
pub use state::*;
pub use transport::*;
