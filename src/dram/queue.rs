use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;

use crate::config::{Params, QueuingStructure, RowBufferPolicy, SchedulingPolicy};

use super::bus::{BusPacket, CommandKind};
use super::state::{BankMode, BankState};

// Per-rank (or per-rank-per-bank) FIFOs of pending commands plus the
// scheduling state that picks at most one issuable command per cycle:
// round-robin pointers, the per-rank four-activate window, per-bank
// row-access counters, the refresh drain, and the posted-CAS pairing flag.
pub struct CommandQueue {
    params: Arc<Params>,
    queues: Vec<Vec<VecDeque<BusPacket>>>,
    // decrementing counters, one per in-window ACTIVATE; head is the oldest
    tfaw_countdown: Vec<VecDeque<u64>>,
    row_access_counters: Vec<Vec<u64>>,
    next_rank: usize,
    next_bank: usize,
    next_rank_pre: usize,
    next_bank_pre: usize,
    refresh_rank: usize,
    pub refresh_waiting: bool,
    send_act: bool,
}

impl CommandQueue {
    pub fn new(params: Arc<Params>) -> Self {
        let num_ranks = params.num_ranks as usize;
        let num_banks = params.num_banks as usize;
        let bank_queues = match params.queuing_structure {
            QueuingStructure::PerRank => 1,
            QueuingStructure::PerRankPerBank => num_banks,
        };
        Self {
            queues: (0..num_ranks)
                .map(|_| (0..bank_queues).map(|_| VecDeque::new()).collect())
                .collect(),
            tfaw_countdown: (0..num_ranks).map(|_| VecDeque::new()).collect(),
            row_access_counters: vec![vec![0; num_banks]; num_ranks],
            next_rank: 0,
            next_bank: 0,
            next_rank_pre: 0,
            next_bank_pre: 0,
            refresh_rank: 0,
            refresh_waiting: false,
            send_act: true,
            params,
        }
    }

    fn queue_index(&self, bank: usize) -> usize {
        match self.params.queuing_structure {
            QueuingStructure::PerRank => 0,
            QueuingStructure::PerRankPerBank => bank,
        }
    }

    pub fn has_room_for(&self, count: usize, rank: usize, bank: usize) -> bool {
        let queue = &self.queues[rank][self.queue_index(bank)];
        self.params.cmd_queue_depth - queue.len() >= count
    }

    // Callers must check has_room_for first; overflow is a simulator bug.
    pub fn enqueue(&mut self, packet: BusPacket) {
        let rank = packet.rank;
        let index = self.queue_index(packet.bank);
        let queue = &mut self.queues[rank][index];
        queue.push_back(packet);
        assert!(
            queue.len() <= self.params.cmd_queue_depth,
            "enqueued past the command queue depth, check has_room_for before enqueueing"
        );
    }

    pub fn is_empty(&self, rank: usize) -> bool {
        self.queues[rank].iter().all(|queue| queue.is_empty())
    }

    pub fn need_refresh(&mut self, rank: usize) {
        self.refresh_waiting = true;
        self.refresh_rank = rank;
    }

    pub fn is_issuable(
        &self,
        packet: &BusPacket,
        clock: u64,
        states: &[Vec<BankState>],
    ) -> bool {
        let bs = &states[packet.rank][packet.bank];
        match packet.kind {
            CommandKind::Refresh => true,
            CommandKind::Activate => {
                (bs.state == BankMode::Idle || bs.state == BankMode::Refreshing)
                    && clock >= bs.next_activate
                    && self.tfaw_countdown[packet.rank].len() < 4
            }
            CommandKind::Read | CommandKind::ReadP => {
                bs.state == BankMode::RowActive
                    && clock >= bs.next_read
                    && packet.row == bs.open_row
                    && self.row_access_counters[packet.rank][packet.bank]
                        < self.params.total_row_accesses
            }
            CommandKind::Write | CommandKind::WriteP => {
                bs.state == BankMode::RowActive
                    && clock >= bs.next_write
                    && packet.row == bs.open_row
                    && self.row_access_counters[packet.rank][packet.bank]
                        < self.params.total_row_accesses
            }
            CommandKind::Precharge => {
                bs.state == BankMode::RowActive && clock >= bs.next_precharge
            }
            CommandKind::Data => panic!("DATA packets are never scheduled"),
        }
    }

    // Called once per cycle. Picks at most one command: refresh work first,
    // then the normal round-robin scan, then (open page) a precharge to a
    // drained bank.
    pub fn pop(&mut self, clock: u64, states: &[Vec<BankState>]) -> Option<BusPacket> {
        // tFAW bookkeeping happens whether or not anything issues; the head
        // is always the smallest counter
        for rank in self.tfaw_countdown.iter_mut() {
            for counter in rank.iter_mut() {
                *counter -= 1;
            }
            if rank.front() == Some(&0) {
                rank.pop_front();
            }
        }

        let packet = match self.params.row_buffer_policy {
            RowBufferPolicy::ClosePage => {
                let refresh = if self.refresh_waiting {
                    self.close_page_refresh(clock, states)
                } else {
                    None
                };
                match refresh {
                    Some(packet) => packet,
                    None => self.scan_close_page(clock, states)?,
                }
            }
            RowBufferPolicy::OpenPage => {
                let refresh = if self.refresh_waiting {
                    self.open_page_refresh(clock, states)
                } else {
                    None
                };
                match refresh {
                    Some(packet) => packet,
                    None => match self.scan_open_page(clock, states) {
                        Some(packet) => packet,
                        None => self.precharge_scan(clock, states)?,
                    },
                }
            }
        };

        // posted-CAS pairing: after sending an activate, hold the round
        // robin pointer so the very next pop offers its column access
        if self.params.al > 0 && self.send_act {
            self.send_act = false;
        } else {
            self.send_act = true;
            advance(
                self.params.scheduling_policy,
                self.params.num_ranks as usize,
                self.params.num_banks as usize,
                &mut self.next_rank,
                &mut self.next_bank,
            );
        }

        if packet.kind == CommandKind::Activate {
            self.tfaw_countdown[packet.rank].push_back(self.params.tfaw);
        }

        Some(packet)
    }

    // Refresh path under close page: open banks drain their already-queued
    // column accesses (auto-precharge variants close the row); the REFRESH
    // itself goes out only once every bank on the rank sits idle.
    fn close_page_refresh(
        &mut self,
        clock: u64,
        states: &[Vec<BankState>],
    ) -> Option<BusPacket> {
        let rr = self.refresh_rank;
        let mut blocked = false;
        let mut result = None;
        for b in 0..self.params.num_banks as usize {
            let bs = &states[rr][b];
            if bs.state == BankMode::RowActive {
                blocked = true;
                // make sure nothing else is headed to the open row before
                // it closes; only the first match matters
                let index = self.queue_index(b);
                let mut take = None;
                {
                    let queue = &self.queues[rr][index];
                    if let Some(i) = queue
                        .iter()
                        .position(|pkt| pkt.row == bs.open_row && pkt.bank == b)
                    {
                        if queue[i].kind != CommandKind::Activate
                            && self.is_issuable(&queue[i], clock, states)
                        {
                            take = Some(i);
                        }
                    }
                }
                if let Some(i) = take {
                    result = self.queues[rr][index].remove(i);
                }
                break;
            } else if bs.state != BankMode::Idle || bs.next_activate > clock {
                blocked = true;
                break;
            }
        }

        if !blocked && states[rr][0].state != BankMode::PowerDown {
            self.refresh_waiting = false;
            result = Some(refresh_packet(rr));
        }
        result
    }

    // Refresh path under open page: issue pending work to open rows, close
    // rows with no pending work, and refresh once the rank is fully idle.
    fn open_page_refresh(
        &mut self,
        clock: u64,
        states: &[Vec<BankState>],
    ) -> Option<BusPacket> {
        let rr = self.refresh_rank;
        let mut send_ref = true;
        let mut result = None;
        for b in 0..self.params.num_banks as usize {
            let bs = &states[rr][b];
            if bs.state == BankMode::RowActive {
                send_ref = false;
                let mut close_row = true;
                let index = self.queue_index(b);
                let mut take = None;
                {
                    let queue = &self.queues[rr][index];
                    if let Some(i) = queue
                        .iter()
                        .position(|pkt| pkt.row == bs.open_row && pkt.bank == b)
                    {
                        if queue[i].kind != CommandKind::Activate {
                            close_row = false;
                            if self.is_issuable(&queue[i], clock, states) {
                                take = Some(i);
                            }
                        }
                    }
                }
                if let Some(i) = take {
                    result = self.queues[rr][index].remove(i);
                } else if close_row && clock >= bs.next_precharge {
                    self.row_access_counters[rr][b] = 0;
                    result = Some(precharge_packet(rr, b));
                }
                break;
            } else if bs.state != BankMode::Idle || bs.next_activate > clock {
                send_ref = false;
                break;
            }
        }

        if send_ref && states[rr][0].state != BankMode::PowerDown {
            self.refresh_waiting = false;
            result = Some(refresh_packet(rr));
        }
        result
    }

    fn scan_close_page(&mut self, clock: u64, states: &[Vec<BankState>]) -> Option<BusPacket> {
        let starting_rank = self.next_rank;
        let starting_bank = self.next_bank;
        loop {
            let rank = self.next_rank;
            let index = self.queue_index(self.next_bank);
            // a rank waiting on a refresh gets nothing new until the
            // refresh logic has drained it
            let skip = self.refresh_waiting && rank == self.refresh_rank;
            let mut take = None;
            if !skip {
                let queue = &self.queues[rank][index];
                match self.params.queuing_structure {
                    QueuingStructure::PerRank => {
                        for i in 0..queue.len() {
                            if self.is_issuable(&queue[i], clock, states) {
                                // a column access paired with its own
                                // activate travels behind it, never first
                                if i > 0
                                    && queue[i - 1].kind == CommandKind::Activate
                                    && queue[i - 1].addr == queue[i].addr
                                {
                                    continue;
                                }
                                take = Some(i);
                                break;
                            }
                        }
                    }
                    QueuingStructure::PerRankPerBank => {
                        // if the front can't go, nothing behind it can
                        if !queue.is_empty() && self.is_issuable(&queue[0], clock, states) {
                            take = Some(0);
                        }
                    }
                }
            }
            if let Some(i) = take {
                return self.queues[rank][index].remove(i);
            }

            if !self.advance_scan_pointer(starting_rank, starting_bank) {
                return None;
            }
        }
    }

    fn scan_open_page(&mut self, clock: u64, states: &[Vec<BankState>]) -> Option<BusPacket> {
        let starting_rank = self.next_rank;
        let starting_bank = self.next_bank;
        loop {
            let rank = self.next_rank;
            let index = self.queue_index(self.next_bank);
            let skip = self.refresh_waiting && rank == self.refresh_rank;
            let mut take: Option<(usize, bool)> = None;
            if !skip {
                let queue = &self.queues[rank][index];
                'search: for i in 0..queue.len() {
                    let packet = &queue[i];
                    if !self.is_issuable(packet, clock, states) {
                        continue;
                    }
                    // an earlier command to the same bank and row must go
                    // first to preserve ordering
                    for j in 0..i {
                        let prev = &queue[j];
                        if prev.kind != CommandKind::Activate
                            && prev.bank == packet.bank
                            && prev.row == packet.row
                        {
                            continue 'search;
                        }
                    }
                    let paired_act = i > 0 && queue[i - 1].kind == CommandKind::Activate;
                    take = Some((i, paired_act));
                    break;
                }
            }
            if let Some((i, paired_act)) = take {
                let queue = &mut self.queues[rank][index];
                let packet = queue.remove(i).expect("scanned index in bounds");
                if paired_act {
                    // the activate ahead of this column access was its pair
                    queue.remove(i - 1);
                    self.row_access_counters[packet.rank][packet.bank] += 1;
                }
                return Some(packet);
            }

            if !self.advance_scan_pointer(starting_rank, starting_bank) {
                return None;
            }
        }
    }

    // Open-page fallback: close any open bank with no pending work to its
    // row, or one that has hit the row-access cap.
    fn precharge_scan(&mut self, clock: u64, states: &[Vec<BankState>]) -> Option<BusPacket> {
        let starting_rank = self.next_rank_pre;
        let starting_bank = self.next_bank_pre;
        loop {
            let rank = self.next_rank_pre;
            let bank = self.next_bank_pre;
            let bs = &states[rank][bank];
            if bs.state == BankMode::RowActive {
                let queue = &self.queues[rank][self.queue_index(bank)];
                let pending = queue
                    .iter()
                    .any(|pkt| pkt.bank == bank && pkt.row == bs.open_row);
                let capped =
                    self.row_access_counters[rank][bank] == self.params.total_row_accesses;
                if (!pending || capped) && clock >= bs.next_precharge {
                    self.row_access_counters[rank][bank] = 0;
                    return Some(precharge_packet(rank, bank));
                }
            }
            advance(
                self.params.scheduling_policy,
                self.params.num_ranks as usize,
                self.params.num_banks as usize,
                &mut self.next_rank_pre,
                &mut self.next_bank_pre,
            );
            if self.next_rank_pre == starting_rank && self.next_bank_pre == starting_bank {
                return None;
            }
        }
    }

    // Advance the normal scan pointer; false once the scan has wrapped all
    // the way around. Per-rank queuing rotates over ranks only.
    fn advance_scan_pointer(&mut self, starting_rank: usize, starting_bank: usize) -> bool {
        match self.params.queuing_structure {
            QueuingStructure::PerRank => {
                self.next_rank = (self.next_rank + 1) % self.params.num_ranks as usize;
                self.next_rank != starting_rank
            }
            QueuingStructure::PerRankPerBank => {
                advance(
                    self.params.scheduling_policy,
                    self.params.num_ranks as usize,
                    self.params.num_banks as usize,
                    &mut self.next_rank,
                    &mut self.next_bank,
                );
                !(self.next_rank == starting_rank && self.next_bank == starting_bank)
            }
        }
    }

    pub fn log_queues(&self) {
        for (rank, queues) in self.queues.iter().enumerate() {
            for (index, queue) in queues.iter().enumerate() {
                debug!("  rank {} queue {} size {}", rank, index, queue.len());
                for (i, packet) in queue.iter().enumerate() {
                    debug!("    {}] {}", i, packet);
                }
            }
        }
    }
}

fn refresh_packet(rank: usize) -> BusPacket {
    BusPacket::new(CommandKind::Refresh, 0, 0, 0, rank, 0, None)
}

fn precharge_packet(rank: usize, bank: usize) -> BusPacket {
    BusPacket::new(CommandKind::Precharge, 0, 0, 0, rank, bank, None)
}

fn advance(
    policy: SchedulingPolicy,
    num_ranks: usize,
    num_banks: usize,
    rank: &mut usize,
    bank: &mut usize,
) {
    match policy {
        SchedulingPolicy::RankThenBankRoundRobin => {
            *rank += 1;
            if *rank == num_ranks {
                *rank = 0;
                *bank += 1;
                if *bank == num_banks {
                    *bank = 0;
                }
            }
        }
        SchedulingPolicy::BankThenRankRoundRobin => {
            *bank += 1;
            if *bank == num_banks {
                *bank = 0;
                *rank += 1;
                if *rank == num_ranks {
                    *rank = 0;
                }
            }
        }
    }
}
