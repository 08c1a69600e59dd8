mod address_tests;
mod controller_tests;
mod queue_tests;

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::config::{DeviceConfig, Params, SimConfig, SystemConfig};

// Small, fast geometry shared by the suites: 2 ranks x 4 banks x 16 rows x
// 64 cols, 64-byte transactions, short timing so scenarios resolve in tens
// of cycles. Refresh is parked far away unless a test pulls it closer.
pub(crate) fn small_config() -> (DeviceConfig, SystemConfig) {
    let device = DeviceConfig {
        num_banks: 4,
        num_rows: 16,
        num_cols: 64,
        device_width: 8,
        refresh_period: 64000.0,
        tck: 1.0,
        cl: 4,
        al: 0,
        bl: 8,
        tras: 8,
        trcd: 3,
        trrd: 2,
        trc: 11,
        trp: 3,
        tccd: 4,
        trtp: 3,
        twtr: 2,
        twr: 3,
        trtrs: 1,
        trfc: 20,
        tfaw: 16,
        tcke: 2,
        txp: 2,
        tcmd: 1,
        ..DeviceConfig::default()
    };
    let mut system = SystemConfig::default();
    system.num_ranks = 2;
    system.trans_queue_depth = 8;
    system.cmd_queue_depth = 8;
    system.epoch_length = 1_000_000;
    system.use_low_power = false;
    (device, system)
}

pub(crate) fn small_params(
    tweak: impl FnOnce(&mut DeviceConfig, &mut SystemConfig),
) -> Arc<Params> {
    let (mut device, mut system) = small_config();
    tweak(&mut device, &mut system);
    Arc::new(Params::derive(&SimConfig::from_parts(device, system), 0))
}

// A Write sink tests can read back out of.
#[derive(Clone, Default)]
pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).expect("utf8 output")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
