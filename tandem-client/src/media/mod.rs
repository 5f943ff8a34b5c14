mod devices;
mod media_controller;
mod track;

pub use devices::*;
pub use media_controller::*;
pub use track::*;
