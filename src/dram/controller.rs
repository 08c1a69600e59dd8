use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use log::{debug, info, trace};

use crate::config::Params;
use crate::stats::{indexed_name, ChannelSummary, CsvWriter, LatencyHistogram};

use super::address::map_address;
use super::bus::{BusPacket, CommandKind, DataPayload, Transaction, TransactionKind};
use super::channel::PowerCallback;
use super::queue::CommandQueue;
use super::rank::Rank;
use super::state::{BankMode, BankState};

pub type VerifyLog = Arc<Mutex<Box<dyn Write + Send>>>;

// What the controller finished this cycle; the channel turns these into
// host callbacks. Read completions carry the payload so it stays alive
// until the callback has run, then it is dropped.
pub enum Completion {
    Read {
        addr: u64,
        cycle: u64,
        data: Option<DataPayload>,
    },
    Write {
        addr: u64,
        cycle: u64,
    },
}

pub struct MemoryController {
    channel_id: usize,
    params: Arc<Params>,

    transaction_queue: Vec<Transaction>,
    bank_states: Vec<Vec<BankState>>,
    command_queue: CommandQueue,

    power_down: Vec<bool>,
    refresh_countdown: Vec<u64>,
    refresh_rank: usize,

    // parallel vectors: the staged DATA packet and its cycles-until-bus.
    // Entries are appended with the constant countdown WL and at most one
    // per cycle, so the head always expires strictly first.
    write_data_to_send: VecDeque<BusPacket>,
    write_data_countdown: VecDeque<u64>,

    return_transactions: VecDeque<Transaction>,
    pending_read_transactions: Vec<Transaction>,

    outgoing_cmd: Option<BusPacket>,
    cmd_cycles_left: u64,
    outgoing_data: Option<BusPacket>,
    data_cycles_left: u64,

    verify_log: Option<VerifyLog>,

    clock: u64,

    // epoch counters, reset by print_stats
    total_transactions: u64,
    grand_total_bank_accesses: Vec<u64>,
    total_reads_per_bank: Vec<u64>,
    total_writes_per_bank: Vec<u64>,
    total_reads_per_rank: Vec<u64>,
    total_writes_per_rank: Vec<u64>,
    total_epoch_latency: Vec<u64>,
    latencies: LatencyHistogram,

    // energy in mA * cycles, per rank
    pub background_energy: Vec<u64>,
    pub burst_energy: Vec<u64>,
    pub actpre_energy: Vec<u64>,
    pub refresh_energy: Vec<u64>,
    lifetime_energy: [u64; 4],
}

impl MemoryController {
    pub fn new(channel_id: usize, params: Arc<Params>, verify_log: Option<VerifyLog>) -> Self {
        let num_ranks = params.num_ranks as usize;
        let num_banks = params.num_banks as usize;
        let seq_len = num_ranks * num_banks;

        // stagger when each rank comes due for refresh
        let refresh_countdown = (0..num_ranks as u64)
            .map(|i| params.refresh_cycles / params.num_ranks * (i + 1))
            .collect();

        Self {
            channel_id,
            transaction_queue: Vec::with_capacity(params.trans_queue_depth),
            bank_states: vec![vec![BankState::default(); num_banks]; num_ranks],
            command_queue: CommandQueue::new(params.clone()),
            power_down: vec![false; num_ranks],
            refresh_countdown,
            refresh_rank: 0,
            write_data_to_send: VecDeque::new(),
            write_data_countdown: VecDeque::new(),
            return_transactions: VecDeque::new(),
            pending_read_transactions: Vec::new(),
            outgoing_cmd: None,
            cmd_cycles_left: 0,
            outgoing_data: None,
            data_cycles_left: 0,
            verify_log,
            clock: 0,
            total_transactions: 0,
            grand_total_bank_accesses: vec![0; seq_len],
            total_reads_per_bank: vec![0; seq_len],
            total_writes_per_bank: vec![0; seq_len],
            total_reads_per_rank: vec![0; num_ranks],
            total_writes_per_rank: vec![0; num_ranks],
            total_epoch_latency: vec![0; seq_len],
            latencies: LatencyHistogram::new(params.histogram_bin_size),
            background_energy: vec![0; num_ranks],
            burst_energy: vec![0; num_ranks],
            actpre_energy: vec![0; num_ranks],
            refresh_energy: vec![0; num_ranks],
            lifetime_energy: [0; 4],
            params,
        }
    }

    fn seq(&self, rank: usize, bank: usize) -> usize {
        rank * self.params.num_banks as usize + bank
    }

    pub fn will_accept_transaction(&self) -> bool {
        self.transaction_queue.len() < self.params.trans_queue_depth
    }

    pub fn add_transaction(&mut self, mut transaction: Transaction) -> bool {
        if !self.will_accept_transaction() {
            return false;
        }
        transaction.time_added = self.clock;
        self.transaction_queue.push(transaction);
        true
    }

    // Read data coming back from a rank over the data bus.
    pub fn receive_from_bus(&mut self, packet: BusPacket) {
        assert_eq!(
            packet.kind,
            CommandKind::Data,
            "controller received a non-DATA packet from a rank: {}",
            packet
        );
        if self.params.debug.bus {
            debug!(" -- MC receiving from data bus: {}", packet);
        }
        let s = self.seq(packet.rank, packet.bank);
        self.total_reads_per_bank[s] += 1;
        self.return_transactions.push_back(Transaction::new(
            TransactionKind::ReturnData,
            packet.addr,
            packet.data,
        ));
    }

    pub fn update(&mut self, ranks: &mut [Rank]) -> Vec<Completion> {
        let p = self.params.clone();
        let num_ranks = p.num_ranks as usize;
        let mut completions = Vec::new();

        // implicit bank-state transitions
        for rank_states in self.bank_states.iter_mut() {
            for bs in rank_states.iter_mut() {
                bs.tick(p.trp);
            }
        }

        // command bus drain
        if self.outgoing_cmd.is_some() {
            self.cmd_cycles_left -= 1;
            if self.cmd_cycles_left == 0 {
                let packet = self.outgoing_cmd.take().expect("bus occupied");
                ranks[packet.rank].receive_from_bus(packet);
            }
        }

        // data bus drain; a finishing write payload completes the write
        if self.outgoing_data.is_some() {
            self.data_cycles_left -= 1;
            if self.data_cycles_left == 0 {
                let packet = self.outgoing_data.take().expect("bus occupied");
                completions.push(Completion::Write {
                    addr: packet.addr,
                    cycle: self.clock,
                });
                ranks[packet.rank].receive_from_bus(packet);
            }
        }

        // staged write data moves onto the data bus WL cycles after its
        // column command issued
        if !self.write_data_countdown.is_empty() {
            for countdown in self.write_data_countdown.iter_mut() {
                *countdown -= 1;
            }
            if self.write_data_countdown[0] == 0 {
                debug_assert!(
                    self.write_data_countdown.iter().skip(1).all(|c| *c > 0),
                    "write data countdowns must expire head first"
                );
                assert!(self.outgoing_data.is_none(), "data bus collision");
                let packet = self.write_data_to_send.pop_front().expect("head checked");
                self.write_data_countdown.pop_front();
                if p.debug.bus {
                    debug!(" -- MC issuing on data bus: {}", packet);
                }
                self.total_transactions += 1;
                let s = self.seq(packet.rank, packet.bank);
                self.total_writes_per_bank[s] += 1;
                self.data_cycles_left = p.bl / 2;
                self.outgoing_data = Some(packet);
            }
        }

        // refresh scheduling; a powered-down rank is woken early enough to
        // meet its refresh deadline
        if self.refresh_countdown[self.refresh_rank] == 0 {
            self.command_queue.need_refresh(self.refresh_rank);
            ranks[self.refresh_rank].refresh_waiting = true;
            self.refresh_countdown[self.refresh_rank] = p.refresh_cycles;
            self.refresh_rank = (self.refresh_rank + 1) % num_ranks;
        } else if self.power_down[self.refresh_rank]
            && self.refresh_countdown[self.refresh_rank] <= p.txp
        {
            ranks[self.refresh_rank].refresh_waiting = true;
        }

        // pick at most one command and put it on the command bus
        if let Some(packet) = self.command_queue.pop(self.clock, &self.bank_states) {
            if packet.kind.is_write() {
                self.write_data_to_send.push_back(BusPacket::new(
                    CommandKind::Data,
                    packet.addr,
                    packet.column,
                    packet.row,
                    packet.rank,
                    packet.bank,
                    packet.data.clone(),
                ));
                self.write_data_countdown.push_back(p.wl);
            }
            self.apply_command(&packet);
            if p.debug.bus {
                debug!(" -- MC issuing on command bus: {}", packet);
            }
            self.write_verification(&packet);
            assert!(self.outgoing_cmd.is_none(), "command bus collision");
            self.cmd_cycles_left = p.tcmd;
            self.outgoing_cmd = Some(packet);
        }

        // break one transaction into its ACTIVATE + column pair; the pair
        // must fit in the target queue together
        for i in 0..self.transaction_queue.len() {
            let mapped = map_address(self.transaction_queue[i].addr, &p);
            let rank = mapped.rank as usize;
            let bank = mapped.bank as usize;
            if !self.command_queue.has_room_for(2, rank, bank) {
                continue;
            }
            let transaction = self.transaction_queue.remove(i);
            if p.debug.addr_map {
                debug!(
                    "== new transaction {} -> rank {} bank {} row {} col {}",
                    transaction, rank, bank, mapped.row, mapped.col
                );
            }
            let activate = BusPacket::new(
                CommandKind::Activate,
                transaction.addr,
                mapped.col,
                mapped.row,
                rank,
                bank,
                None,
            );
            let column = BusPacket::new(
                transaction.column_command_kind(p.row_buffer_policy),
                transaction.addr,
                mapped.col,
                mapped.row,
                rank,
                bank,
                transaction.data.clone(),
            );
            self.command_queue.enqueue(activate);
            self.command_queue.enqueue(column);
            if transaction.kind == TransactionKind::Read {
                self.pending_read_transactions.push(transaction);
            }
            // one transaction scheduled per cycle
            break;
        }

        // low-power control and background energy, per rank
        for i in 0..num_ranks {
            if p.use_low_power {
                if self.command_queue.is_empty(i) && !ranks[i].refresh_waiting {
                    let all_idle = self.bank_states[i]
                        .iter()
                        .all(|bs| bs.state == BankMode::Idle);
                    if all_idle {
                        self.power_down[i] = true;
                        ranks[i].power_down();
                        for bs in self.bank_states[i].iter_mut() {
                            bs.state = BankMode::PowerDown;
                            bs.next_powerup = self.clock + p.tcke;
                        }
                    }
                } else if self.power_down[i] && self.clock >= self.bank_states[i][0].next_powerup
                {
                    self.power_down[i] = false;
                    ranks[i].power_up();
                    for bs in self.bank_states[i].iter_mut() {
                        bs.state = BankMode::Idle;
                        bs.next_activate = self.clock + p.txp;
                    }
                }
            }

            let bank_open = self.bank_states[i]
                .iter()
                .any(|bs| matches!(bs.state, BankMode::RowActive | BankMode::Refreshing));
            let idd = if bank_open {
                p.idd3n
            } else if self.power_down[i] {
                p.idd2p
            } else {
                p.idd2n
            };
            if p.debug.power {
                trace!(" ++ rank {} background current {} mA", i, idd);
            }
            self.background_energy[i] += idd * p.num_devices;
        }

        // hand one completed read back per cycle
        if let Some(returned) = self.return_transactions.pop_front() {
            self.total_transactions += 1;
            let index = self
                .pending_read_transactions
                .iter()
                .position(|t| t.addr == returned.addr)
                .unwrap_or_else(|| {
                    panic!("no pending read matches returned address 0x{:x}", returned.addr)
                });
            let pending = self.pending_read_transactions.remove(index);
            let mapped = map_address(returned.addr, &p);
            self.insert_histogram(
                self.clock - pending.time_added,
                mapped.rank as usize,
                mapped.bank as usize,
            );
            completions.push(Completion::Read {
                addr: returned.addr,
                cycle: self.clock,
                data: returned.data,
            });
        }

        for countdown in self.refresh_countdown.iter_mut() {
            *countdown = countdown.saturating_sub(1);
        }

        if p.debug.trans_q {
            debug!("== transaction queue ({} entries)", self.transaction_queue.len());
            for (i, transaction) in self.transaction_queue.iter().enumerate() {
                debug!("  {}] {}", i, transaction);
            }
        }
        if p.debug.bankstate {
            for (i, rank_states) in self.bank_states.iter().enumerate() {
                let row: Vec<String> = rank_states.iter().map(|bs| bs.to_string()).collect();
                debug!("rank {}: {}", i, row.join(" "));
            }
        }
        if p.debug.cmd_q {
            self.command_queue.log_queues();
        }

        completions
    }

    // Bank-state transitions and energy accrual for a command leaving the
    // command queue. The floors are applied at dispatch time; ranks repeat
    // them at receipt time.
    fn apply_command(&mut self, packet: &BusPacket) {
        let p = self.params.clone();
        let clock = self.clock;
        let rank = packet.rank;
        let bank = packet.bank;

        match packet.kind {
            CommandKind::Read | CommandKind::ReadP => {
                self.burst_energy[rank] += (p.idd4r - p.idd3n) * p.bl / 2 * p.num_devices;
                if packet.kind == CommandKind::ReadP {
                    let bs = &mut self.bank_states[rank][bank];
                    bs.next_activate = bs.next_activate.max(clock + p.read_autopre_delay);
                    bs.last_command = CommandKind::ReadP;
                    bs.state_change_countdown = p.read_to_pre_delay;
                } else {
                    let bs = &mut self.bank_states[rank][bank];
                    bs.next_precharge = bs.next_precharge.max(clock + p.read_to_pre_delay);
                    bs.last_command = CommandKind::Read;
                }

                for (i, rank_states) in self.bank_states.iter_mut().enumerate() {
                    for bs in rank_states.iter_mut() {
                        if i != rank {
                            if bs.state == BankMode::RowActive {
                                bs.next_read =
                                    bs.next_read.max(clock + p.bl / 2 + p.trtrs);
                                bs.next_write =
                                    bs.next_write.max(clock + p.read_to_write_delay);
                            }
                        } else {
                            bs.next_read = bs.next_read.max(clock + p.tccd.max(p.bl / 2));
                            bs.next_write = bs.next_write.max(clock + p.read_to_write_delay);
                        }
                    }
                }

                if packet.kind == CommandKind::ReadP {
                    // block further column access until the implicit
                    // precharge has run its course
                    let bs = &mut self.bank_states[rank][bank];
                    bs.next_read = bs.next_activate;
                    bs.next_write = bs.next_activate;
                }
            }
            CommandKind::Write | CommandKind::WriteP => {
                self.burst_energy[rank] += (p.idd4w - p.idd3n) * p.bl / 2 * p.num_devices;
                if packet.kind == CommandKind::WriteP {
                    let bs = &mut self.bank_states[rank][bank];
                    bs.next_activate = bs.next_activate.max(clock + p.write_autopre_delay);
                    bs.last_command = CommandKind::WriteP;
                    bs.state_change_countdown = p.write_to_pre_delay;
                } else {
                    let bs = &mut self.bank_states[rank][bank];
                    bs.next_precharge = bs.next_precharge.max(clock + p.write_to_pre_delay);
                    bs.last_command = CommandKind::Write;
                }

                for (i, rank_states) in self.bank_states.iter_mut().enumerate() {
                    for bs in rank_states.iter_mut() {
                        if i != rank {
                            if bs.state == BankMode::RowActive {
                                bs.next_write =
                                    bs.next_write.max(clock + p.bl / 2 + p.trtrs);
                                bs.next_read =
                                    bs.next_read.max(clock + p.write_to_read_delay_r);
                            }
                        } else {
                            bs.next_write = bs.next_write.max(clock + p.tccd.max(p.bl / 2));
                            bs.next_read = bs.next_read.max(clock + p.write_to_read_delay_b);
                        }
                    }
                }

                if packet.kind == CommandKind::WriteP {
                    let bs = &mut self.bank_states[rank][bank];
                    bs.next_read = bs.next_activate;
                    bs.next_write = bs.next_activate;
                }
            }
            CommandKind::Activate => {
                self.actpre_energy[rank] += (p.idd0 * p.trc)
                    .saturating_sub(p.idd3n * p.tras + p.idd2n * (p.trc - p.tras))
                    * p.num_devices;

                let bs = &mut self.bank_states[rank][bank];
                bs.state = BankMode::RowActive;
                bs.last_command = CommandKind::Activate;
                bs.open_row = packet.row;
                bs.next_activate = bs.next_activate.max(clock + p.trc);
                bs.next_precharge = bs.next_precharge.max(clock + p.tras);
                // posted-CAS lets the column command go out earlier
                let col_floor = clock + p.trcd.saturating_sub(p.al);
                bs.next_read = bs.next_read.max(col_floor);
                bs.next_write = bs.next_write.max(col_floor);

                for (i, bs) in self.bank_states[rank].iter_mut().enumerate() {
                    if i != bank {
                        bs.next_activate = bs.next_activate.max(clock + p.trrd);
                    }
                }
            }
            CommandKind::Precharge => {
                let bs = &mut self.bank_states[rank][bank];
                bs.state = BankMode::Precharging;
                bs.last_command = CommandKind::Precharge;
                bs.state_change_countdown = p.trp;
                bs.next_activate = bs.next_activate.max(clock + p.trp);
            }
            CommandKind::Refresh => {
                self.refresh_energy[rank] += (p.idd5 - p.idd3n) * p.trfc * p.num_devices;
                for bs in self.bank_states[rank].iter_mut() {
                    bs.next_activate = clock + p.trfc;
                    bs.state = BankMode::Refreshing;
                    bs.last_command = CommandKind::Refresh;
                    bs.state_change_countdown = p.trfc;
                }
            }
            CommandKind::Data => panic!("popped a DATA packet from the command queue"),
        }
    }

    fn insert_histogram(&mut self, latency: u64, rank: usize, bank: usize) {
        let s = self.seq(rank, bank);
        self.total_epoch_latency[s] += latency;
        self.latencies.record(latency);
    }

    fn write_verification(&mut self, packet: &BusPacket) {
        if let Some(log) = &self.verify_log {
            let mut out = log.lock().expect("verification log poisoned");
            let _ = writeln!(
                out,
                "{} {} {} {} {} {}",
                self.clock, packet.kind, packet.rank, packet.bank, packet.row, packet.column
            );
        }
    }

    pub fn step(&mut self) {
        self.clock += 1;
    }

    pub fn current_clock_cycle(&self) -> u64 {
        self.clock
    }

    pub fn pending_reads(&self) -> usize {
        self.pending_read_transactions.len()
    }

    pub fn transaction_queue_len(&self) -> usize {
        self.transaction_queue.len()
    }

    pub fn latency_histogram(&self) -> &LatencyHistogram {
        &self.latencies
    }

    pub fn print_stats(
        &mut self,
        final_stats: bool,
        csv: &mut CsvWriter,
        report_power: Option<&PowerCallback>,
    ) {
        let p = self.params.clone();
        let num_ranks = p.num_ranks as usize;
        let num_banks = p.num_banks as usize;
        let channel = self.channel_id as u64;

        let cycles_elapsed = if self.clock % p.epoch_length == 0 {
            p.epoch_length
        } else {
            self.clock % p.epoch_length
        };
        let bytes_per_transaction = p.bytes_per_transaction();
        let total_bytes = self.total_transactions * bytes_per_transaction;
        let seconds_this_epoch = cycles_elapsed as f64 * p.tck * 1e-9;

        let mut bandwidth = vec![0.0f64; num_ranks * num_banks];
        let mut average_latency = vec![0.0f64; num_ranks * num_banks];
        let mut total_bandwidth = 0.0f64;
        for r in 0..num_ranks {
            for b in 0..num_banks {
                let s = self.seq(r, b);
                let accesses = self.total_reads_per_bank[s] + self.total_writes_per_bank[s];
                bandwidth[s] = accesses as f64 * bytes_per_transaction as f64
                    / (1024.0 * 1024.0 * 1024.0)
                    / seconds_this_epoch;
                average_latency[s] = if self.total_reads_per_bank[s] > 0 {
                    self.total_epoch_latency[s] as f64 / self.total_reads_per_bank[s] as f64
                        * p.tck
                } else {
                    0.0
                };
                total_bandwidth += bandwidth[s];
                self.total_reads_per_rank[r] += self.total_reads_per_bank[s];
                self.total_writes_per_rank[r] += self.total_writes_per_bank[s];
            }
        }

        info!("======= channel {} statistics =======", channel);
        info!(
            "  total return transactions: {} ({} bytes), aggregate {:.3} GB/s",
            self.total_transactions, total_bytes, total_bandwidth
        );

        for r in 0..num_ranks {
            info!(
                "  rank {}: {} reads, {} writes",
                r, self.total_reads_per_rank[r], self.total_writes_per_rank[r]
            );

            // IDD values accumulate in mA*cycles, so scale by Vdd and the
            // epoch length to get average watts
            let to_watts = |energy: u64| energy as f64 / cycles_elapsed as f64 * p.vdd / 1000.0;
            let background = to_watts(self.background_energy[r]);
            let burst = to_watts(self.burst_energy[r]);
            let refresh = to_watts(self.refresh_energy[r]);
            let actpre = to_watts(self.actpre_energy[r]);
            let average = to_watts(
                self.background_energy[r]
                    + self.burst_energy[r]
                    + self.refresh_energy[r]
                    + self.actpre_energy[r],
            );
            info!(
                "    power: avg {:.3} W (background {:.3}, act/pre {:.3}, burst {:.3}, refresh {:.3})",
                average, background, actpre, burst, refresh
            );

            if let Some(callback) = report_power {
                let mut callback = callback.write().expect("power callback poisoned");
                (&mut *callback)(background, burst, refresh, actpre);
            }

            if p.vis_file_output {
                csv.entry(indexed_name("Background_Power", &[channel, r as u64]), background);
                csv.entry(indexed_name("ACT_PRE_Power", &[channel, r as u64]), actpre);
                csv.entry(indexed_name("Burst_Power", &[channel, r as u64]), burst);
                csv.entry(indexed_name("Refresh_Power", &[channel, r as u64]), refresh);
                let mut rank_bandwidth = 0.0;
                for b in 0..num_banks {
                    let s = self.seq(r, b);
                    rank_bandwidth += bandwidth[s];
                    csv.entry(
                        indexed_name("Bandwidth", &[channel, r as u64, b as u64]),
                        bandwidth[s],
                    );
                    csv.entry(
                        indexed_name("Average_Latency", &[channel, r as u64, b as u64]),
                        average_latency[s],
                    );
                }
                csv.entry(
                    indexed_name("Rank_Aggregate_Bandwidth", &[channel, r as u64]),
                    rank_bandwidth,
                );
                csv.entry(
                    indexed_name("Rank_Average_Bandwidth", &[channel, r as u64]),
                    rank_bandwidth / num_ranks as f64,
                );
            }
        }

        if p.vis_file_output {
            csv.entry(indexed_name("Aggregate_Bandwidth", &[channel]), total_bandwidth);
            csv.entry(
                indexed_name("Average_Bandwidth", &[channel]),
                total_bandwidth / (num_ranks * num_banks) as f64,
            );
        }

        // histogram only at the very end, it would swamp the epoch output
        if final_stats {
            info!("  --- latency histogram ({} bins)", self.latencies.len());
            if p.vis_file_output && csv.is_finalized() {
                let _ = writeln!(csv.raw(), "!!HISTOGRAM_DATA");
            }
            let bin_size = self.latencies.bin_size();
            for (bin, count) in self.latencies.iter() {
                info!("    [{}-{}] : {}", bin, bin + bin_size - 1, count);
                if p.vis_file_output && csv.is_finalized() {
                    let _ = writeln!(csv.raw(), "{}={}", bin, count);
                }
            }
            info!("  --- grand total bank accesses");
            for r in 0..num_ranks {
                let row: Vec<String> = (0..num_banks)
                    .map(|b| {
                        let s = self.seq(r, b);
                        (self.grand_total_bank_accesses[s]
                            + self.total_reads_per_bank[s]
                            + self.total_writes_per_bank[s])
                            .to_string()
                    })
                    .collect();
                info!("    rank {}: {}", r, row.join(" "));
            }
        }

        info!(
            "  == pending read transactions: {} ({})",
            self.pending_read_transactions.len(),
            self.clock
        );

        self.reset_stats();
    }

    fn reset_stats(&mut self) {
        let num_ranks = self.params.num_ranks as usize;
        let num_banks = self.params.num_banks as usize;
        for r in 0..num_ranks {
            for b in 0..num_banks {
                let s = self.seq(r, b);
                self.grand_total_bank_accesses[s] +=
                    self.total_reads_per_bank[s] + self.total_writes_per_bank[s];
                self.total_reads_per_bank[s] = 0;
                self.total_writes_per_bank[s] = 0;
                self.total_epoch_latency[s] = 0;
            }
            self.lifetime_energy[0] += self.background_energy[r];
            self.lifetime_energy[1] += self.burst_energy[r];
            self.lifetime_energy[2] += self.actpre_energy[r];
            self.lifetime_energy[3] += self.refresh_energy[r];
            self.background_energy[r] = 0;
            self.burst_energy[r] = 0;
            self.actpre_energy[r] = 0;
            self.refresh_energy[r] = 0;
            self.total_reads_per_rank[r] = 0;
            self.total_writes_per_rank[r] = 0;
        }
    }

    pub fn summary(&self) -> ChannelSummary {
        let epoch_reads: u64 = self.total_reads_per_bank.iter().sum();
        let epoch_writes: u64 = self.total_writes_per_bank.iter().sum();
        let grand: u64 = self.grand_total_bank_accesses.iter().sum();
        let reads_and_writes = grand + epoch_reads + epoch_writes;
        ChannelSummary {
            channel: self.channel_id,
            reads: epoch_reads,
            writes: epoch_writes,
            bytes: reads_and_writes * self.params.bytes_per_transaction(),
            background_energy: self.lifetime_energy[0]
                + self.background_energy.iter().sum::<u64>(),
            burst_energy: self.lifetime_energy[1] + self.burst_energy.iter().sum::<u64>(),
            actpre_energy: self.lifetime_energy[2] + self.actpre_energy.iter().sum::<u64>(),
            refresh_energy: self.lifetime_energy[3] + self.refresh_energy.iter().sum::<u64>(),
        }
    }
}
