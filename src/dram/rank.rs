use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;

use crate::config::Params;

use super::bank::Bank;
use super::bus::{BusPacket, CommandKind};
use super::state::{BankMode, BankState};

// One rank of devices: the banks, a local copy of the bank-state table kept
// in lock step with the controller's (applied at command receipt), the read
// return pipeline, and the power-down latch. Posted-CAS needs no special
// handling here: the additive latency is folded into RL and WL.
pub struct Rank {
    id: usize,
    params: Arc<Params>,
    banks: Vec<Bank>,
    bank_states: Vec<BankState>,
    pub refresh_waiting: bool,
    power_down: bool,
    read_return_packets: VecDeque<BusPacket>,
    read_return_countdown: VecDeque<u64>,
    outgoing_data: Option<BusPacket>,
    data_cycles_left: u64,
    clock: u64,
}

impl Rank {
    pub fn new(id: usize, params: Arc<Params>) -> Self {
        let banks = (0..params.num_banks)
            .map(|_| Bank::new(params.num_cols, params.transaction_size, params.debug.banks))
            .collect();
        let bank_states = (0..params.num_banks).map(|_| BankState::default()).collect();
        Self {
            id,
            params,
            banks,
            bank_states,
            refresh_waiting: false,
            power_down: false,
            read_return_packets: VecDeque::new(),
            read_return_countdown: VecDeque::new(),
            outgoing_data: None,
            data_cycles_left: 0,
            clock: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_powered_down(&self) -> bool {
        self.power_down
    }

    pub fn receive_from_bus(&mut self, mut packet: BusPacket) {
        assert_eq!(
            packet.rank, self.id,
            "rank {} received a packet addressed to rank {}",
            self.id, packet.rank
        );
        if self.params.debug.bus {
            debug!(" -- rank {} receiving: {}", self.id, packet);
        }
        match packet.kind {
            CommandKind::Read | CommandKind::ReadP => {
                let bs = &self.bank_states[packet.bank];
                assert!(
                    bs.state == BankMode::RowActive
                        && self.clock >= bs.next_read
                        && packet.row == bs.open_row,
                    "rank {} got {} for a bank in an illegal state",
                    self.id,
                    packet
                );
                self.apply_column_read(packet.bank, packet.kind);
                self.banks[packet.bank].read(&mut packet);
                self.read_return_packets.push_back(packet);
                self.read_return_countdown.push_back(self.params.rl);
            }
            CommandKind::Write | CommandKind::WriteP => {
                let bs = &self.bank_states[packet.bank];
                assert!(
                    bs.state == BankMode::RowActive
                        && self.clock >= bs.next_write
                        && packet.row == bs.open_row,
                    "rank {} got {} for a bank in an illegal state",
                    self.id,
                    packet
                );
                self.apply_column_write(packet.bank, packet.kind);
                // the payload follows on the data bus as a DATA packet
            }
            CommandKind::Activate => {
                let clock = self.clock;
                let p = self.params.clone();
                {
                    let bs = &mut self.bank_states[packet.bank];
                    bs.state = BankMode::RowActive;
                    bs.last_command = CommandKind::Activate;
                    bs.open_row = packet.row;
                    bs.next_activate = bs.next_activate.max(clock + p.trc);
                    bs.next_precharge = bs.next_precharge.max(clock + p.tras);
                    let col_floor = clock + p.trcd.saturating_sub(p.al);
                    bs.next_read = bs.next_read.max(col_floor);
                    bs.next_write = bs.next_write.max(col_floor);
                }
                for (b, bs) in self.bank_states.iter_mut().enumerate() {
                    if b != packet.bank {
                        bs.next_activate = bs.next_activate.max(clock + p.trrd);
                    }
                }
            }
            CommandKind::Precharge => {
                let bs = &mut self.bank_states[packet.bank];
                assert!(
                    bs.state == BankMode::RowActive,
                    "rank {} got PRE for a bank with no open row",
                    self.id
                );
                bs.state = BankMode::Precharging;
                bs.last_command = CommandKind::Precharge;
                bs.state_change_countdown = self.params.trp;
                bs.next_activate = bs.next_activate.max(self.clock + self.params.trp);
            }
            CommandKind::Refresh => {
                self.refresh_waiting = false;
                let clock = self.clock;
                let trfc = self.params.trfc;
                for bs in self.bank_states.iter_mut() {
                    assert!(
                        bs.state == BankMode::Idle,
                        "rank {} told to refresh while a bank is not idle",
                        self.id
                    );
                    bs.state = BankMode::Refreshing;
                    bs.last_command = CommandKind::Refresh;
                    bs.next_activate = clock + trfc;
                    bs.state_change_countdown = trfc;
                }
            }
            CommandKind::Data => {
                self.banks[packet.bank].write(&packet);
            }
        }
    }

    // Same-rank timing floors after a read, mirroring the controller's
    // bookkeeping at receipt time.
    fn apply_column_read(&mut self, bank: usize, kind: CommandKind) {
        let clock = self.clock;
        let p = self.params.clone();
        for bs in self.bank_states.iter_mut() {
            bs.next_read = bs.next_read.max(clock + p.tccd.max(p.bl / 2));
            bs.next_write = bs.next_write.max(clock + p.read_to_write_delay);
        }
        let bs = &mut self.bank_states[bank];
        if kind == CommandKind::ReadP {
            bs.next_activate = bs.next_activate.max(clock + p.read_autopre_delay);
            bs.last_command = CommandKind::ReadP;
            bs.state_change_countdown = p.read_to_pre_delay;
            bs.next_read = bs.next_activate;
            bs.next_write = bs.next_activate;
        } else {
            bs.next_precharge = bs.next_precharge.max(clock + p.read_to_pre_delay);
            bs.last_command = CommandKind::Read;
        }
    }

    fn apply_column_write(&mut self, bank: usize, kind: CommandKind) {
        let clock = self.clock;
        let p = self.params.clone();
        for bs in self.bank_states.iter_mut() {
            bs.next_write = bs.next_write.max(clock + p.tccd.max(p.bl / 2));
            bs.next_read = bs.next_read.max(clock + p.write_to_read_delay_b);
        }
        let bs = &mut self.bank_states[bank];
        if kind == CommandKind::WriteP {
            bs.next_activate = bs.next_activate.max(clock + p.write_autopre_delay);
            bs.last_command = CommandKind::WriteP;
            bs.state_change_countdown = p.write_to_pre_delay;
            bs.next_read = bs.next_activate;
            bs.next_write = bs.next_activate;
        } else {
            bs.next_precharge = bs.next_precharge.max(clock + p.write_to_pre_delay);
            bs.last_command = CommandKind::Write;
        }
    }

    // One DRAM cycle. Returns the DATA packet that finished its data-bus
    // transfer this cycle, if any; the channel forwards it to the controller.
    pub fn update(&mut self) -> Option<BusPacket> {
        for bs in self.bank_states.iter_mut() {
            bs.tick(self.params.trp);
        }

        let mut delivered = None;
        if self.outgoing_data.is_some() {
            self.data_cycles_left -= 1;
            if self.data_cycles_left == 0 {
                delivered = self.outgoing_data.take();
            }
        }

        for countdown in self.read_return_countdown.iter_mut() {
            *countdown -= 1;
        }
        if self.read_return_countdown.front() == Some(&0) {
            // RL has elapsed since the column command arrived, the burst
            // occupies the data bus for BL/2 cycles
            assert!(
                self.outgoing_data.is_none(),
                "data bus collision at rank {}",
                self.id
            );
            self.outgoing_data = self.read_return_packets.pop_front();
            self.read_return_countdown.pop_front();
            self.data_cycles_left = self.params.bl / 2;
        }

        delivered
    }

    pub fn power_down(&mut self) {
        debug_assert!(
            self.bank_states
                .iter()
                .all(|bs| bs.state != BankMode::RowActive),
            "rank {} powering down with an open row",
            self.id
        );
        for bs in self.bank_states.iter_mut() {
            bs.next_powerup = self.clock + self.params.tcke;
            bs.state = BankMode::PowerDown;
        }
        self.power_down = true;
    }

    pub fn power_up(&mut self) {
        assert!(
            self.power_down,
            "rank {} told to power up while not powered down",
            self.id
        );
        let clock = self.clock;
        let txp = self.params.txp;
        for bs in self.bank_states.iter_mut() {
            assert!(
                clock >= bs.next_powerup,
                "rank {} powering up before tCKE has elapsed",
                self.id
            );
            bs.state = BankMode::Idle;
            bs.next_activate = bs.next_activate.max(clock + txp);
        }
        self.power_down = false;
    }

    pub fn step(&mut self) {
        self.clock += 1;
    }
}
