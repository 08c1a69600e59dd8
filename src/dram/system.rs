use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::clock::ClockDomainCrosser;
use crate::config::{Params, SimConfig};
use crate::stats::{CsvWriter, RunSummary};

use super::address::map_address;
use super::bus::DataPayload;
use super::channel::{MemorySystem, PowerCallback, TransactionCallback};
use super::controller::VerifyLog;

// The public face of the simulator: shards transactions over the channels by
// the mapped channel bits, drives every channel one DRAM cycle at a time
// through the clock crosser, and owns the output sinks.
pub struct MultiChannelMemorySystem {
    params: Arc<Params>,
    config: SimConfig,
    channels: Vec<MemorySystem>,
    crosser: ClockDomainCrosser,
    csv: CsvWriter,
    clock: u64,
}

impl MultiChannelMemorySystem {
    // megs_of_memory == 0 keeps the configured rank count. vis_base, when
    // given and VIS_FILE_OUTPUT is on, becomes "<base>.vis" next to which a
    // "<base>.cmds" verification trace is created if enabled.
    pub fn new(config: SimConfig, megs_of_memory: u64, vis_base: Option<&Path>) -> Self {
        let params = Params::derive(&config, megs_of_memory);

        let csv = if params.vis_file_output {
            let path = vis_base
                .map(|base| base.with_extension("vis"))
                .unwrap_or_else(|| Path::new("results.vis").to_path_buf());
            info!("writing vis file to {}", path.display());
            let file = File::create(&path)
                .unwrap_or_else(|e| panic!("cannot open vis file {}: {}", path.display(), e));
            CsvWriter::new(Box::new(BufWriter::new(file)))
        } else {
            CsvWriter::sink()
        };

        let verify_log = if params.verification_output {
            let path = vis_base
                .map(|base| base.with_extension("cmds"))
                .unwrap_or_else(|| Path::new("results.cmds").to_path_buf());
            let file = File::create(&path).unwrap_or_else(|e| {
                panic!("cannot open verification file {}: {}", path.display(), e)
            });
            Some(Arc::new(Mutex::new(
                Box::new(BufWriter::new(file)) as Box<dyn Write + Send>
            )))
        } else {
            None
        };

        Self::build(config, params, csv, verify_log)
    }

    // Test-friendly constructor with caller-supplied sinks.
    pub fn with_writers(
        config: SimConfig,
        megs_of_memory: u64,
        vis_out: Box<dyn Write>,
        verify_out: Option<Box<dyn Write + Send>>,
    ) -> Self {
        let params = Params::derive(&config, megs_of_memory);
        let csv = CsvWriter::new(vis_out);
        let verify_log: Option<VerifyLog> = verify_out.map(|out| Arc::new(Mutex::new(out)));
        Self::build(config, params, csv, verify_log)
    }

    fn build(
        config: SimConfig,
        params: Params,
        csv: CsvWriter,
        verify_log: Option<VerifyLog>,
    ) -> Self {
        let params = Arc::new(params);
        let channels = (0..params.num_chans as usize)
            .map(|i| MemorySystem::new(i, params.clone(), verify_log.clone()))
            .collect();
        Self {
            config,
            channels,
            crosser: ClockDomainCrosser::default(),
            csv,
            clock: 0,
            params,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn current_clock_cycle(&self) -> u64 {
        self.clock
    }

    pub fn register_callbacks(
        &mut self,
        read_done: Option<TransactionCallback>,
        write_done: Option<TransactionCallback>,
        report_power: Option<PowerCallback>,
    ) {
        for channel in self.channels.iter_mut() {
            channel.register_callbacks(
                read_done.clone(),
                write_done.clone(),
                report_power.clone(),
            );
        }
    }

    // 0 means run the host in lockstep with the DRAM clock.
    pub fn set_cpu_clock_speed(&mut self, cpu_clock_hz: u64) {
        let dram_clock_hz = (1.0 / (self.params.tck * 1e-9)) as u64;
        let cpu = if cpu_clock_hz == 0 {
            dram_clock_hz
        } else {
            cpu_clock_hz
        };
        self.crosser.set_clocks(dram_clock_hz, cpu);
        debug!(
            "dram clock {} Hz, host clock {} Hz (ratio {}:{})",
            dram_clock_hz, cpu, self.crosser.clock1, self.crosser.clock2
        );
    }

    fn find_channel(&self, addr: u64) -> usize {
        if self.params.num_chans == 1 {
            return 0;
        }
        let chan = map_address(addr, &self.params).chan;
        assert!(
            chan < self.params.num_chans,
            "address 0x{:x} maps to channel {} but only {} exist",
            addr,
            chan,
            self.params.num_chans
        );
        chan as usize
    }

    pub fn add_transaction(&mut self, is_write: bool, addr: u64) -> bool {
        let channel = self.find_channel(addr);
        self.channels[channel].add_transaction(is_write, addr)
    }

    pub fn add_transaction_with_data(
        &mut self,
        is_write: bool,
        addr: u64,
        data: Option<DataPayload>,
    ) -> bool {
        let channel = self.find_channel(addr);
        self.channels[channel].add_transaction_with_data(is_write, addr, data)
    }

    pub fn will_accept_transaction(&self) -> bool {
        self.channels
            .iter()
            .all(|channel| channel.will_accept_transaction())
    }

    pub fn will_accept_transaction_addr(&self, addr: u64) -> bool {
        self.channels[self.find_channel(addr)].will_accept_transaction()
    }

    // Advance one host cycle; the crosser decides how many DRAM cycles that
    // releases (possibly zero).
    pub fn update(&mut self) {
        for _ in 0..self.crosser.tick() {
            self.actual_update();
        }
    }

    fn actual_update(&mut self) {
        if self.clock % self.params.epoch_length == 0 {
            self.csv
                .entry("ms", self.clock as f64 * self.params.tck * 1e-6);
            for channel in self.channels.iter_mut() {
                channel.print_stats(false, &mut self.csv);
            }
            self.csv.finalize();
        }
        for channel in self.channels.iter_mut() {
            channel.update();
        }
        self.clock += 1;
    }

    pub fn print_stats(&mut self, final_stats: bool) {
        self.csv
            .entry("ms", self.clock as f64 * self.params.tck * 1e-6);
        for (i, channel) in self.channels.iter_mut().enumerate() {
            info!("==== channel [{}] ====", i);
            channel.print_stats(final_stats, &mut self.csv);
        }
        self.csv.finalize();
    }

    pub fn run_summary(&self) -> RunSummary {
        let per_channel: Vec<_> = self.channels.iter().map(|c| c.summary()).collect();
        let total_bytes = per_channel.iter().map(|c| c.bytes).sum();
        RunSummary {
            cycles: self.clock,
            total_bytes,
            per_channel,
        }
    }

    pub fn pending_reads(&self) -> usize {
        self.channels.iter().map(|c| c.pending_reads()).sum()
    }

    // Typed getters over the merged raw configuration; None means the field
    // is not present.
    pub fn get_ini_bool(&self, field: &str) -> Option<bool> {
        self.config.get_bool(field)
    }

    pub fn get_ini_uint(&self, field: &str) -> Option<u32> {
        self.config.get_uint(field)
    }

    pub fn get_ini_uint64(&self, field: &str) -> Option<u64> {
        self.config.get_uint64(field)
    }

    pub fn get_ini_float(&self, field: &str) -> Option<f32> {
        self.config.get_float(field)
    }
}
