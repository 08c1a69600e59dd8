use std::sync::{Arc, RwLock};

use crate::config::Params;
use crate::stats::{ChannelSummary, CsvWriter};

use super::bus::{DataPayload, Transaction, TransactionKind};
use super::controller::{Completion, MemoryController, VerifyLog};
use super::rank::Rank;

// Completion callbacks are registered once at the top level and shared by
// every channel, so they live behind reference-counted locks.
pub type TransactionCallback = Arc<RwLock<dyn FnMut(usize, u64, u64)>>;
pub type PowerCallback = Arc<RwLock<dyn FnMut(f64, f64, f64, f64)>>;

// One channel: a controller and its ranks, wired together each cycle. Ranks
// update first so data-bus arrivals reach the controller in the same cycle;
// the controller then runs its own cycle and may hand command-bus packets to
// the ranks; finally everyone's clock steps.
pub struct MemorySystem {
    id: usize,
    controller: MemoryController,
    ranks: Vec<Rank>,
    read_done: Option<TransactionCallback>,
    write_done: Option<TransactionCallback>,
    report_power: Option<PowerCallback>,
}

impl MemorySystem {
    pub fn new(id: usize, params: Arc<Params>, verify_log: Option<VerifyLog>) -> Self {
        let ranks = (0..params.num_ranks as usize)
            .map(|i| Rank::new(i, params.clone()))
            .collect();
        Self {
            id,
            controller: MemoryController::new(id, params, verify_log),
            ranks,
            read_done: None,
            write_done: None,
            report_power: None,
        }
    }

    pub fn register_callbacks(
        &mut self,
        read_done: Option<TransactionCallback>,
        write_done: Option<TransactionCallback>,
        report_power: Option<PowerCallback>,
    ) {
        self.read_done = read_done;
        self.write_done = write_done;
        self.report_power = report_power;
    }

    pub fn will_accept_transaction(&self) -> bool {
        self.controller.will_accept_transaction()
    }

    pub fn add_transaction(&mut self, is_write: bool, addr: u64) -> bool {
        self.add_transaction_with_data(is_write, addr, None)
    }

    pub fn add_transaction_with_data(
        &mut self,
        is_write: bool,
        addr: u64,
        data: Option<DataPayload>,
    ) -> bool {
        let kind = if is_write {
            TransactionKind::Write
        } else {
            TransactionKind::Read
        };
        self.controller
            .add_transaction(Transaction::new(kind, addr, data))
    }

    pub fn update(&mut self) {
        let mut arrivals = Vec::new();
        for rank in self.ranks.iter_mut() {
            if let Some(packet) = rank.update() {
                arrivals.push(packet);
            }
        }
        for packet in arrivals {
            self.controller.receive_from_bus(packet);
        }

        for completion in self.controller.update(&mut self.ranks) {
            match completion {
                Completion::Read { addr, cycle, data } => {
                    if let Some(callback) = &self.read_done {
                        let mut callback = callback.write().expect("read callback poisoned");
                        (&mut *callback)(self.id, addr, cycle);
                    }
                    // the payload (tracer buffers included) dies here, after
                    // the callback has had its chance to look
                    drop(data);
                }
                Completion::Write { addr, cycle } => {
                    if let Some(callback) = &self.write_done {
                        let mut callback = callback.write().expect("write callback poisoned");
                        (&mut *callback)(self.id, addr, cycle);
                    }
                }
            }
        }

        for rank in self.ranks.iter_mut() {
            rank.step();
        }
        self.controller.step();
    }

    pub fn print_stats(&mut self, final_stats: bool, csv: &mut CsvWriter) {
        self.controller
            .print_stats(final_stats, csv, self.report_power.as_ref());
    }

    pub fn summary(&self) -> ChannelSummary {
        self.controller.summary()
    }

    pub fn pending_reads(&self) -> usize {
        self.controller.pending_reads()
    }

    pub fn current_clock_cycle(&self) -> u64 {
        self.controller.current_clock_cycle()
    }
}
