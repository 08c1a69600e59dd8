use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

// Section-based configuration. A device file carries a [device] table
// (timing, geometry, currents) and a system file a [system] table (topology,
// queue depths, policies). Keys use the canonical uppercase names so that
// configs can be diffed against datasheets; a programmatic override map can
// replace individual keys before anything is deserialized.

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        let Some(value) = section else {
            warn!("config section missing, falling back to the built-in DDR3 profile");
            return Self::default();
        };
        value
            .clone()
            .try_into()
            .unwrap_or_else(|e| panic!("bad config section: {}", e))
    }
}

pub type OverrideMap = HashMap<String, Value>;

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(rename = "NUM_BANKS")]
    pub num_banks: u64,
    #[serde(rename = "NUM_ROWS")]
    pub num_rows: u64,
    #[serde(rename = "NUM_COLS")]
    pub num_cols: u64,
    #[serde(rename = "DEVICE_WIDTH")]
    pub device_width: u64,

    // tCK and REFRESH_PERIOD are in nanoseconds, everything else in cycles.
    #[serde(rename = "REFRESH_PERIOD")]
    pub refresh_period: f64,
    #[serde(rename = "tCK")]
    pub tck: f64,
    #[serde(rename = "CL")]
    pub cl: u64,
    #[serde(rename = "AL")]
    pub al: u64,
    #[serde(rename = "BL")]
    pub bl: u64,
    #[serde(rename = "tRAS")]
    pub tras: u64,
    #[serde(rename = "tRCD")]
    pub trcd: u64,
    #[serde(rename = "tRRD")]
    pub trrd: u64,
    #[serde(rename = "tRC")]
    pub trc: u64,
    #[serde(rename = "tRP")]
    pub trp: u64,
    #[serde(rename = "tCCD")]
    pub tccd: u64,
    #[serde(rename = "tRTP")]
    pub trtp: u64,
    #[serde(rename = "tWTR")]
    pub twtr: u64,
    #[serde(rename = "tWR")]
    pub twr: u64,
    #[serde(rename = "tRTRS")]
    pub trtrs: u64,
    #[serde(rename = "tRFC")]
    pub trfc: u64,
    #[serde(rename = "tFAW")]
    pub tfaw: u64,
    #[serde(rename = "tCKE")]
    pub tcke: u64,
    #[serde(rename = "tXP")]
    pub txp: u64,
    #[serde(rename = "tCMD")]
    pub tcmd: u64,

    // IDDn currents in mA, from the device datasheet
    #[serde(rename = "IDD0")]
    pub idd0: u64,
    #[serde(rename = "IDD1")]
    pub idd1: u64,
    #[serde(rename = "IDD2P")]
    pub idd2p: u64,
    #[serde(rename = "IDD2Q")]
    pub idd2q: u64,
    #[serde(rename = "IDD2N")]
    pub idd2n: u64,
    #[serde(rename = "IDD3Pf")]
    pub idd3pf: u64,
    #[serde(rename = "IDD3Ps")]
    pub idd3ps: u64,
    #[serde(rename = "IDD3N")]
    pub idd3n: u64,
    #[serde(rename = "IDD4W")]
    pub idd4w: u64,
    #[serde(rename = "IDD4R")]
    pub idd4r: u64,
    #[serde(rename = "IDD5")]
    pub idd5: u64,
    #[serde(rename = "IDD6")]
    pub idd6: u64,
    #[serde(rename = "IDD6L")]
    pub idd6l: u64,
    #[serde(rename = "IDD7")]
    pub idd7: u64,
    #[serde(rename = "Vdd")]
    pub vdd: f64,
}

impl Config for DeviceConfig {}

impl Default for DeviceConfig {
    // DDR3-1333 x8 profile
    fn default() -> Self {
        Self {
            num_banks: 8,
            num_rows: 32768,
            num_cols: 1024,
            device_width: 8,
            refresh_period: 7800.0,
            tck: 1.5,
            cl: 10,
            al: 0,
            bl: 8,
            tras: 24,
            trcd: 10,
            trrd: 4,
            trc: 34,
            trp: 10,
            tccd: 4,
            trtp: 5,
            twtr: 5,
            twr: 10,
            trtrs: 1,
            trfc: 107,
            tfaw: 20,
            tcke: 4,
            txp: 4,
            tcmd: 1,
            idd0: 1305,
            idd1: 1395,
            idd2p: 600,
            idd2q: 1170,
            idd2n: 1187,
            idd3pf: 1035,
            idd3ps: 742,
            idd3n: 1334,
            idd4w: 1660,
            idd4r: 2155,
            idd5: 3016,
            idd6: 1200,
            idd6l: 1100,
            idd7: 3360,
            vdd: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RowBufferPolicy {
    #[serde(rename = "open_page")]
    OpenPage,
    #[serde(rename = "close_page")]
    ClosePage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SchedulingPolicy {
    #[serde(rename = "rank_then_bank_round_robin")]
    RankThenBankRoundRobin,
    #[serde(rename = "bank_then_rank_round_robin")]
    BankThenRankRoundRobin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum QueuingStructure {
    #[serde(rename = "per_rank")]
    PerRank,
    #[serde(rename = "per_rank_per_bank")]
    PerRankPerBank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressMappingScheme {
    Scheme1,
    Scheme2,
    Scheme3,
    Scheme4,
    Scheme5,
    Scheme6,
    Scheme7,
    Scheme8,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct DebugFlags {
    #[serde(rename = "DEBUG_TRANS_Q", default)]
    pub trans_q: bool,
    #[serde(rename = "DEBUG_CMD_Q", default)]
    pub cmd_q: bool,
    #[serde(rename = "DEBUG_ADDR_MAP", default)]
    pub addr_map: bool,
    #[serde(rename = "DEBUG_BANKSTATE", default)]
    pub bankstate: bool,
    #[serde(rename = "DEBUG_BUS", default)]
    pub bus: bool,
    #[serde(rename = "DEBUG_BANKS", default)]
    pub banks: bool,
    #[serde(rename = "DEBUG_POWER", default)]
    pub power: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SystemConfig {
    #[serde(rename = "NUM_CHANS")]
    pub num_chans: u64,
    #[serde(rename = "NUM_RANKS")]
    pub num_ranks: u64,
    #[serde(rename = "JEDEC_DATA_BUS_BITS")]
    pub jedec_data_bus_bits: u64,
    #[serde(rename = "TRANS_QUEUE_DEPTH")]
    pub trans_queue_depth: usize,
    #[serde(rename = "CMD_QUEUE_DEPTH")]
    pub cmd_queue_depth: usize,
    #[serde(rename = "EPOCH_LENGTH")]
    pub epoch_length: u64,
    #[serde(rename = "TOTAL_ROW_ACCESSES")]
    pub total_row_accesses: u64,
    #[serde(rename = "ROW_BUFFER_POLICY")]
    pub row_buffer_policy: RowBufferPolicy,
    #[serde(rename = "SCHEDULING_POLICY")]
    pub scheduling_policy: SchedulingPolicy,
    #[serde(rename = "ADDRESS_MAPPING_SCHEME")]
    pub address_mapping_scheme: AddressMappingScheme,
    #[serde(rename = "QUEUING_STRUCTURE")]
    pub queuing_structure: QueuingStructure,
    #[serde(rename = "HISTOGRAM_BIN_SIZE", default = "default_histogram_bin_size")]
    pub histogram_bin_size: u64,
    #[serde(rename = "USE_LOW_POWER", default)]
    pub use_low_power: bool,
    #[serde(rename = "VIS_FILE_OUTPUT", default)]
    pub vis_file_output: bool,
    #[serde(rename = "VERIFICATION_OUTPUT", default)]
    pub verification_output: bool,
    #[serde(flatten)]
    pub debug: DebugFlags,
}

fn default_histogram_bin_size() -> u64 {
    10
}

impl Config for SystemConfig {}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            num_chans: 1,
            num_ranks: 1,
            jedec_data_bus_bits: 64,
            trans_queue_depth: 32,
            cmd_queue_depth: 32,
            epoch_length: 100000,
            total_row_accesses: 4,
            row_buffer_policy: RowBufferPolicy::OpenPage,
            scheduling_policy: SchedulingPolicy::RankThenBankRoundRobin,
            address_mapping_scheme: AddressMappingScheme::Scheme2,
            queuing_structure: QueuingStructure::PerRankPerBank,
            histogram_bin_size: 10,
            use_low_power: true,
            vis_file_output: false,
            verification_output: false,
            debug: DebugFlags::default(),
        }
    }
}

// The loaded configuration: the two typed sections plus the merged raw
// table, which is kept around to serve the typed field getters.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub device: DeviceConfig,
    pub system: SystemConfig,
    raw: Value,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig::from_tables(Value::Table(Default::default()), &OverrideMap::new())
    }
}

impl SimConfig {
    pub fn load(device_path: &Path, system_path: &Path, overrides: &OverrideMap) -> Self {
        let mut root = read_table(device_path);
        let system_root = read_table(system_path);
        merge_sections(&mut root, system_root);
        SimConfig::from_tables(root, overrides)
    }

    // Programmatic construction for hosts that embed the simulator without
    // config files; the raw table stays empty so the getters return None.
    pub fn from_parts(device: DeviceConfig, system: SystemConfig) -> Self {
        Self {
            device,
            system,
            raw: Value::Table(Default::default()),
        }
    }

    pub fn from_tables(mut root: Value, overrides: &OverrideMap) -> Self {
        apply_overrides(&mut root, overrides);
        let device = DeviceConfig::from_section(root.get("device"));
        let system = SystemConfig::from_section(root.get("system"));
        Self {
            device,
            system,
            raw: root,
        }
    }

    fn lookup(&self, field: &str) -> Option<&Value> {
        for section in ["device", "system"] {
            if let Some(value) = self.raw.get(section).and_then(|s| s.get(field)) {
                return Some(value);
            }
        }
        None
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.lookup(field).and_then(Value::as_bool)
    }

    pub fn get_uint(&self, field: &str) -> Option<u32> {
        self.lookup(field)
            .and_then(Value::as_integer)
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn get_uint64(&self, field: &str) -> Option<u64> {
        self.lookup(field)
            .and_then(Value::as_integer)
            .and_then(|v| u64::try_from(v).ok())
    }

    pub fn get_float(&self, field: &str) -> Option<f32> {
        self.lookup(field).and_then(|v| match v {
            Value::Float(f) => Some(*f as f32),
            Value::Integer(i) => Some(*i as f32),
            _ => None,
        })
    }
}

fn read_table(path: &Path) -> Value {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read config file {}: {}", path.display(), e));
    text.parse::<Value>()
        .unwrap_or_else(|e| panic!("cannot parse config file {}: {}", path.display(), e))
}

// Bring the sections of a second config file into the root table.
fn merge_sections(root: &mut Value, other: Value) {
    let (Value::Table(root), Value::Table(other)) = (root, other) else {
        panic!("config files must be tables at the top level");
    };
    for (name, section) in other {
        if root.insert(name.clone(), section).is_some() {
            panic!("config section [{}] defined in both files", name);
        }
    }
}

// Overrides replace keys that already exist in some section; a key that
// matches no section is a caller error.
fn apply_overrides(root: &mut Value, overrides: &OverrideMap) {
    let Value::Table(sections) = root else {
        panic!("config files must be tables at the top level");
    };
    for (key, value) in overrides {
        let mut applied = false;
        for (_, section) in sections.iter_mut() {
            if let Value::Table(table) = section {
                if table.contains_key(key) {
                    table.insert(key.clone(), value.clone());
                    applied = true;
                }
            }
        }
        if !applied {
            panic!("override for unknown config key {}", key);
        }
    }
}

fn log2_strict(value: u64, what: &str) -> u32 {
    assert!(
        value.is_power_of_two(),
        "{} must be a nonzero power of two, got {}",
        what,
        value
    );
    value.trailing_zeros()
}

// Everything the simulator needs at runtime, derived once from the config
// and immutable afterwards. Cycle quantities are DRAM cycles.
#[derive(Debug, Clone)]
pub struct Params {
    pub tck: f64,

    pub cl: u64,
    pub al: u64,
    pub bl: u64,
    pub tras: u64,
    pub trcd: u64,
    pub trrd: u64,
    pub trc: u64,
    pub trp: u64,
    pub tccd: u64,
    pub trtp: u64,
    pub twtr: u64,
    pub twr: u64,
    pub trtrs: u64,
    pub trfc: u64,
    pub tfaw: u64,
    pub tcke: u64,
    pub txp: u64,
    pub tcmd: u64,

    pub rl: u64,
    pub wl: u64,
    pub read_to_pre_delay: u64,
    pub write_to_pre_delay: u64,
    pub read_to_write_delay: u64,
    pub write_to_read_delay_b: u64,
    pub write_to_read_delay_r: u64,
    pub read_autopre_delay: u64,
    pub write_autopre_delay: u64,
    pub refresh_cycles: u64,

    pub num_chans: u64,
    pub num_ranks: u64,
    pub num_banks: u64,
    pub num_rows: u64,
    pub num_cols: u64,
    pub num_devices: u64,
    pub device_width: u64,
    pub jedec_data_bus_bits: u64,
    pub transaction_size: u64,
    pub total_storage: u64,

    pub chan_width: u32,
    pub rank_width: u32,
    pub bank_width: u32,
    pub row_width: u32,
    pub col_width: u32,
    pub col_low_width: u32,
    pub byte_offset_width: u32,

    pub trans_queue_depth: usize,
    pub cmd_queue_depth: usize,
    pub epoch_length: u64,
    pub total_row_accesses: u64,
    pub histogram_bin_size: u64,

    pub row_buffer_policy: RowBufferPolicy,
    pub scheduling_policy: SchedulingPolicy,
    pub queuing_structure: QueuingStructure,
    pub address_mapping_scheme: AddressMappingScheme,

    pub use_low_power: bool,
    pub vis_file_output: bool,
    pub verification_output: bool,
    pub debug: DebugFlags,

    pub idd0: u64,
    pub idd2p: u64,
    pub idd2n: u64,
    pub idd3n: u64,
    pub idd4w: u64,
    pub idd4r: u64,
    pub idd5: u64,
    pub vdd: f64,
}

impl Params {
    // megs_of_memory == 0 keeps the configured NUM_RANKS; a nonzero value
    // (power of two, total across channels) overrides it.
    pub fn derive(config: &SimConfig, megs_of_memory: u64) -> Params {
        let d = &config.device;
        let s = &config.system;

        assert!(s.num_chans > 0, "NUM_CHANS must be nonzero");
        let chan_width = log2_strict(s.num_chans, "NUM_CHANS");
        let bank_width = log2_strict(d.num_banks, "NUM_BANKS");
        let row_width = log2_strict(d.num_rows, "NUM_ROWS");
        let col_width = log2_strict(d.num_cols, "NUM_COLS");
        log2_strict(d.device_width, "DEVICE_WIDTH");
        log2_strict(d.bl, "BL");
        log2_strict(s.jedec_data_bus_bits, "JEDEC_DATA_BUS_BITS");
        assert!(d.tck > 0.0, "tCK must be positive");
        assert!(d.tcmd > 0, "tCMD must be nonzero");
        assert!(d.bl >= 2, "BL must be at least 2");
        assert!(d.cl + d.al >= 1, "CL + AL must be nonzero");

        let num_devices = s.jedec_data_bus_bits / d.device_width;
        let bytes_per_rank =
            d.num_rows * d.num_cols * d.device_width * d.num_banks * num_devices / 8;

        let num_ranks = if megs_of_memory == 0 {
            s.num_ranks
        } else {
            assert!(
                megs_of_memory.is_power_of_two(),
                "memory size in MiB must be a power of two, got {}",
                megs_of_memory
            );
            let per_chan = (megs_of_memory / s.num_chans) << 20;
            let ranks = per_chan / bytes_per_rank;
            if ranks == 0 {
                warn!(
                    "{} MiB is below the minimum of one rank per channel, clamping",
                    megs_of_memory
                );
            }
            ranks.max(1)
        };
        let rank_width = log2_strict(num_ranks, "derived rank count");

        let rl = d.cl + d.al;
        let wl = rl - 1;
        let bl_half = d.bl / 2;

        let transaction_size = s.jedec_data_bus_bits / 8 * d.bl;
        let byte_offset_width = log2_strict(s.jedec_data_bus_bits / 8, "bus width in bytes");
        let col_low_width = log2_strict(d.bl, "BL");
        assert!(
            col_width > col_low_width,
            "NUM_COLS too small for burst length {}",
            d.bl
        );

        Params {
            tck: d.tck,
            cl: d.cl,
            al: d.al,
            bl: d.bl,
            tras: d.tras,
            trcd: d.trcd,
            trrd: d.trrd,
            trc: d.trc,
            trp: d.trp,
            tccd: d.tccd,
            trtp: d.trtp,
            twtr: d.twtr,
            twr: d.twr,
            trtrs: d.trtrs,
            trfc: d.trfc,
            tfaw: d.tfaw,
            tcke: d.tcke,
            txp: d.txp,
            tcmd: d.tcmd,
            rl,
            wl,
            read_to_pre_delay: d.al + bl_half + d.trtp.saturating_sub(d.tccd),
            write_to_pre_delay: wl + bl_half + d.twr,
            read_to_write_delay: (rl + bl_half + d.trtrs).saturating_sub(wl),
            // CWL + BL/2 + tWTR, with CWL = WL - AL
            write_to_read_delay_b: (wl + bl_half + d.twtr).saturating_sub(d.al),
            write_to_read_delay_r: (wl + bl_half + d.trtrs).saturating_sub(rl),
            read_autopre_delay: d.al + d.trtp + bl_half,
            write_autopre_delay: d.al + bl_half + d.twr,
            refresh_cycles: (d.refresh_period / d.tck) as u64,
            num_chans: s.num_chans,
            num_ranks,
            num_banks: d.num_banks,
            num_rows: d.num_rows,
            num_cols: d.num_cols,
            num_devices,
            device_width: d.device_width,
            jedec_data_bus_bits: s.jedec_data_bus_bits,
            transaction_size,
            total_storage: s.num_chans * num_ranks * bytes_per_rank,
            chan_width,
            rank_width,
            bank_width,
            row_width,
            col_width,
            col_low_width,
            byte_offset_width,
            trans_queue_depth: s.trans_queue_depth,
            cmd_queue_depth: s.cmd_queue_depth,
            epoch_length: s.epoch_length,
            total_row_accesses: s.total_row_accesses,
            histogram_bin_size: s.histogram_bin_size,
            row_buffer_policy: s.row_buffer_policy,
            scheduling_policy: s.scheduling_policy,
            queuing_structure: s.queuing_structure,
            address_mapping_scheme: s.address_mapping_scheme,
            use_low_power: s.use_low_power,
            vis_file_output: s.vis_file_output,
            verification_output: s.verification_output,
            debug: s.debug,
            idd0: d.idd0,
            idd2p: d.idd2p,
            idd2n: d.idd2n,
            idd3n: d.idd3n,
            idd4w: d.idd4w,
            idd4r: d.idd4r,
            idd5: d.idd5,
            vdd: d.vdd,
        }
    }

    pub fn bytes_per_transaction(&self) -> u64 {
        self.jedec_data_bus_bits * self.bl / 8
    }
}
