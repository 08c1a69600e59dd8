pub mod clock;
pub mod config;
pub mod dram;
pub mod stats;

pub use config::{Params, SimConfig};
pub use dram::system::MultiChannelMemorySystem;
