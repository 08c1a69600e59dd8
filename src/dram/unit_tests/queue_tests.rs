use crate::config::{Params, QueuingStructure, RowBufferPolicy, SchedulingPolicy};
use crate::dram::bus::{BusPacket, CommandKind};
use crate::dram::queue::CommandQueue;
use crate::dram::state::{BankMode, BankState};

use super::small_params;

fn idle_states(p: &Params) -> Vec<Vec<BankState>> {
    vec![vec![BankState::default(); p.num_banks as usize]; p.num_ranks as usize]
}

fn activate(rank: usize, bank: usize, row: u64, addr: u64) -> BusPacket {
    BusPacket::new(CommandKind::Activate, addr, 0, row, rank, bank, None)
}

fn column(kind: CommandKind, rank: usize, bank: usize, row: u64, addr: u64) -> BusPacket {
    BusPacket::new(kind, addr, 0, row, rank, bank, None)
}

#[test]
fn four_activate_window_defers_fifth() {
    let p = small_params(|d, s| {
        d.num_banks = 8;
        d.tfaw = 12;
        d.trrd = 1;
        s.queuing_structure = QueuingStructure::PerRank;
    });
    let mut queue = CommandQueue::new(p.clone());
    let states = idle_states(&p);

    for b in 0..5 {
        queue.enqueue(activate(0, b, 0, (b as u64) << 12));
    }

    let mut issued = Vec::new();
    for clock in 1..=40u64 {
        if let Some(packet) = queue.pop(clock, &states) {
            assert_eq!(packet.kind, CommandKind::Activate);
            issued.push((clock, packet.bank));
        }
    }

    assert_eq!(issued.len(), 5);
    let first = issued[0].0;
    let in_window = issued.iter().filter(|(c, _)| *c < first + p.tfaw).count();
    assert_eq!(in_window, 4);
    assert!(issued[4].0 >= first + p.tfaw);
}

#[test]
#[should_panic(expected = "command queue depth")]
fn enqueue_past_depth_is_fatal() {
    let p = small_params(|_, s| s.cmd_queue_depth = 2);
    let mut queue = CommandQueue::new(p);
    for i in 0..3 {
        queue.enqueue(activate(0, 0, i, i << 12));
    }
}

#[test]
fn has_room_for_counts_slots() {
    let p = small_params(|_, _| {});
    let mut queue = CommandQueue::new(p.clone());
    for i in 0..7 {
        queue.enqueue(activate(0, 0, i, i << 11));
    }
    assert!(queue.has_room_for(1, 0, 0));
    assert!(!queue.has_room_for(2, 0, 0));
    assert!(queue.has_room_for(2, 1, 0));
    assert!(!queue.is_empty(0));
    assert!(queue.is_empty(1));
}

#[test]
fn paired_column_never_overtakes_its_activate() {
    let p = small_params(|_, s| {
        s.row_buffer_policy = RowBufferPolicy::ClosePage;
        s.queuing_structure = QueuingStructure::PerRank;
    });
    let mut queue = CommandQueue::new(p.clone());
    let mut states = idle_states(&p);

    // the target row happens to be open, but the queued pair's activate is
    // timing-blocked; the column access must not jump the pair
    states[0][0].state = BankMode::RowActive;
    states[0][0].open_row = 5;
    states[0][0].next_activate = 100;
    queue.enqueue(activate(0, 0, 5, 0xAA00));
    queue.enqueue(column(CommandKind::ReadP, 0, 0, 5, 0xAA00));

    assert!(queue.pop(1, &states).is_none());
}

#[test]
fn close_page_pair_issues_in_order() {
    let p = small_params(|_, s| {
        s.row_buffer_policy = RowBufferPolicy::ClosePage;
    });
    let mut queue = CommandQueue::new(p.clone());
    let mut states = idle_states(&p);
    queue.enqueue(activate(0, 0, 5, 0xAA00));
    queue.enqueue(column(CommandKind::ReadP, 0, 0, 5, 0xAA00));

    let first = queue.pop(1, &states).expect("activate issuable");
    assert_eq!(first.kind, CommandKind::Activate);
    states[0][0].state = BankMode::RowActive;
    states[0][0].open_row = 5;
    states[0][0].next_read = 1 + p.trcd;

    assert!(queue.pop(2, &states).is_none());
    assert!(queue.pop(3, &states).is_none());
    let second = queue.pop(1 + p.trcd, &states).expect("column ready");
    assert_eq!(second.kind, CommandKind::ReadP);
}

#[test]
fn open_page_same_row_order_is_preserved() {
    let p = small_params(|_, _| {});
    let mut queue = CommandQueue::new(p.clone());
    let mut states = idle_states(&p);
    states[0][0].state = BankMode::RowActive;
    states[0][0].open_row = 5;
    states[0][0].next_write = 50;

    queue.enqueue(column(CommandKind::Write, 0, 0, 5, 0x100));
    queue.enqueue(column(CommandKind::Read, 0, 0, 5, 0x140));

    // the read is ready but an earlier write to the same row blocks it
    assert!(queue.pop(1, &states).is_none());

    states[0][0].next_write = 0;
    let first = queue.pop(2, &states).expect("write goes first");
    assert_eq!(first.kind, CommandKind::Write);
    let second = queue.pop(3, &states).expect("then the read");
    assert_eq!(second.kind, CommandKind::Read);
}

#[test]
fn open_page_closes_drained_banks() {
    let p = small_params(|_, _| {});
    let mut queue = CommandQueue::new(p.clone());
    let mut states = idle_states(&p);
    states[0][1].state = BankMode::RowActive;
    states[0][1].open_row = 7;

    let packet = queue.pop(1, &states).expect("synthesized precharge");
    assert_eq!(packet.kind, CommandKind::Precharge);
    assert_eq!(packet.rank, 0);
    assert_eq!(packet.bank, 1);

    // nothing left to close
    states[0][1].state = BankMode::Precharging;
    assert!(queue.pop(2, &states).is_none());
}

#[test]
fn refresh_synthesized_once_rank_is_idle() {
    let p = small_params(|_, _| {});
    let mut queue = CommandQueue::new(p.clone());
    let states = idle_states(&p);

    queue.need_refresh(1);
    let packet = queue.pop(1, &states).expect("refresh ready");
    assert_eq!(packet.kind, CommandKind::Refresh);
    assert_eq!(packet.rank, 1);
    assert!(!queue.refresh_waiting);
}

#[test]
fn refresh_drains_open_banks_first() {
    let p = small_params(|_, _| {});
    let mut queue = CommandQueue::new(p.clone());
    let mut states = idle_states(&p);
    states[1][0].state = BankMode::RowActive;
    states[1][0].open_row = 3;

    queue.need_refresh(1);
    let packet = queue.pop(1, &states).expect("precharge to close the row");
    assert_eq!(packet.kind, CommandKind::Precharge);
    assert_eq!((packet.rank, packet.bank), (1, 0));
    assert!(queue.refresh_waiting);

    // precharging still blocks the refresh
    states[1][0].state = BankMode::Precharging;
    states[1][0].next_activate = 1 + p.trp;
    assert!(queue.pop(2, &states).is_none());

    states[1][0].state = BankMode::Idle;
    let packet = queue.pop(1 + p.trp, &states).expect("refresh after close");
    assert_eq!(packet.kind, CommandKind::Refresh);
    assert!(!queue.refresh_waiting);
}

#[test]
fn scheduling_policy_orders_the_scan() {
    for (policy, expect_first) in [
        (SchedulingPolicy::RankThenBankRoundRobin, (1, 0)),
        (SchedulingPolicy::BankThenRankRoundRobin, (0, 1)),
    ] {
        let p = small_params(|_, s| s.scheduling_policy = policy);
        let mut queue = CommandQueue::new(p.clone());
        let states = idle_states(&p);
        queue.enqueue(activate(1, 0, 0, 0x8000));
        queue.enqueue(activate(0, 1, 0, 0x200));

        let packet = queue.pop(1, &states).expect("one of the two activates");
        assert_eq!((packet.rank, packet.bank), expect_first);
    }
}
