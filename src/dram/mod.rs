pub mod address;
pub mod bank;
pub mod bus;
pub mod channel;
pub mod controller;
pub mod queue;
pub mod rank;
pub mod state;
pub mod system;

#[cfg(test)]
mod unit_tests;

pub use bus::{BusPacket, CommandKind, DataPayload, Transaction, TransactionKind};
pub use channel::{MemorySystem, PowerCallback, TransactionCallback};
pub use system::MultiChannelMemorySystem;
