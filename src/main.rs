use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use clap::Parser;
use log::{info, warn};

use deuteron::config::{OverrideMap, SimConfig};
use deuteron::dram::bus::tracer_payload;
use deuteron::dram::TransactionCallback;
use deuteron::MultiChannelMemorySystem;

#[derive(Parser)]
#[command(version, about)]
struct DeuteronArgs {
    /// device configuration (timing, geometry, currents)
    #[arg(long, default_value = "configs/DDR3_1333.toml")]
    device: PathBuf,

    /// system configuration (topology, queues, policies)
    #[arg(long, default_value = "configs/system.toml")]
    system: PathBuf,

    /// trace file of "<hex-addr> <READ|WRITE> [cycle]" lines; a built-in
    /// stride pattern runs when omitted
    #[arg(long)]
    trace: Option<PathBuf>,

    /// total memory in MiB (power of two); 0 keeps the configured ranks
    #[arg(long, default_value_t = 0)]
    megs: u64,

    /// host cycles to simulate
    #[arg(long, default_value_t = 10000)]
    cycles: u64,

    /// base name for the .vis output
    #[arg(long)]
    vis: Option<PathBuf>,

    /// write a JSON run summary here at the end
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
struct TraceEntry {
    addr: u64,
    is_write: bool,
    cycle: u64,
}

fn parse_trace(path: &PathBuf) -> Vec<TraceEntry> {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read trace {}: {}", path.display(), e));
    let mut entries = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let addr = fields
            .next()
            .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok());
        let kind = fields.next();
        let cycle = fields
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        match (addr, kind) {
            (Some(addr), Some(kind)) => entries.push(TraceEntry {
                addr,
                is_write: kind.eq_ignore_ascii_case("write") || kind.contains("WR"),
                cycle,
            }),
            _ => warn!("skipping malformed trace line {}: {}", lineno + 1, line),
        }
    }
    entries
}

pub fn main() {
    env_logger::init();
    let argv = DeuteronArgs::parse();

    let config = if argv.device.exists() && argv.system.exists() {
        SimConfig::load(&argv.device, &argv.system, &OverrideMap::new())
    } else {
        warn!("config files not found, using the built-in DDR3-1333 profile");
        SimConfig::default()
    };

    let mut memory = MultiChannelMemorySystem::new(config, argv.megs, argv.vis.as_deref());
    memory.set_cpu_clock_speed(0);

    let read_done: TransactionCallback =
        Arc::new(RwLock::new(|id: usize, addr: u64, cycle: u64| {
            info!("[callback] read done: channel {} 0x{:x} @ {}", id, addr, cycle);
        }));
    let write_done: TransactionCallback =
        Arc::new(RwLock::new(|id: usize, addr: u64, cycle: u64| {
            info!("[callback] write done: channel {} 0x{:x} @ {}", id, addr, cycle);
        }));
    memory.register_callbacks(Some(read_done), Some(write_done), None);

    let trace = argv.trace.as_ref().map(parse_trace).unwrap_or_default();
    let transaction_size = memory.params().transaction_size;
    let mut next = 0usize;

    for cycle in 0..argv.cycles {
        if argv.trace.is_some() {
            while next < trace.len() && trace[next].cycle <= cycle {
                let entry = trace[next];
                let data = entry.is_write.then(|| tracer_payload(transaction_size));
                if memory.add_transaction_with_data(entry.is_write, entry.addr, data) {
                    next += 1;
                } else {
                    break;
                }
            }
        } else if cycle % 7 == 0 && memory.will_accept_transaction() {
            // striding pattern: alternating writes and reads walking across
            // rows, just enough to exercise the scheduler standalone
            let addr = (cycle / 7) * transaction_size * 64;
            memory.add_transaction(cycle % 14 == 0, addr);
        }
        memory.update();
    }

    memory.print_stats(true);
    if let Some(path) = &argv.summary {
        deuteron::stats::write_summary(path, &memory.run_summary());
    }
}
