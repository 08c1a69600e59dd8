use std::collections::HashMap;

use log::debug;

use super::bus::{tracer_payload, BusPacket, CommandKind, DataPayload};

// Glorified sparse storage: remembers the payload most recently written to
// each (row, column) so the simulator can hand it back on a later read. A
// read from a location that was never written materializes a tracer buffer
// instead.
pub struct Bank {
    num_cols: u64,
    transaction_size: u64,
    debug_banks: bool,
    entries: HashMap<(u64, u64), Option<DataPayload>>,
}

impl Bank {
    pub fn new(num_cols: u64, transaction_size: u64, debug_banks: bool) -> Self {
        Self {
            num_cols,
            transaction_size,
            debug_banks,
            entries: HashMap::new(),
        }
    }

    pub fn write(&mut self, packet: &BusPacket) {
        assert!(
            packet.column < self.num_cols,
            "bus packet column {} out of bounds ({} columns)",
            packet.column,
            self.num_cols
        );
        if self.debug_banks {
            debug!(
                " -- bank {} writing to physical address 0x{:x}",
                packet.bank, packet.addr
            );
        }
        self.entries
            .insert((packet.row, packet.column), packet.data.clone());
    }

    // Rewrites the packet into the DATA packet that goes back on the bus.
    pub fn read(&self, packet: &mut BusPacket) {
        packet.data = match self.entries.get(&(packet.row, packet.column)) {
            Some(stored) => stored.clone(),
            None => Some(tracer_payload(self.transaction_size)),
        };
        packet.kind = CommandKind::Data;
    }
}
