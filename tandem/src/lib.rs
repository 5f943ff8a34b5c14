pub use tandem_core::model::PeerId;

pub mod model {
    pub use tandem_core::model::*;
}

pub mod utils {
    pub use tandem_core::utils::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use tandem_client::*;
}
