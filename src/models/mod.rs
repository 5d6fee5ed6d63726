pub mod frame;
pub mod log;
pub mod status;

pub use frame::*;
pub use log::*;
pub use status::*;
