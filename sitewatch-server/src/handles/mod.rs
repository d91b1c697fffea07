pub mod control_handle;
pub mod data_handle;

pub use control_handle::*;
pub use data_handle::*;
