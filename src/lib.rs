pub use noc_core::*;
pub use noc_engine::*;
pub use noc_fabric::*;
