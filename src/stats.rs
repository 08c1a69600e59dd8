use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use log::warn;
use serde::Serialize;

// Writes CSV rows with a header collected on the fly. Field names are
// captured until the first finalize() emits the header row; after that the
// names are ignored and the values are written out, one row per finalize().
// Callers must keep the field order identical across epochs.
pub struct CsvWriter {
    output: Box<dyn Write>,
    field_names: Vec<String>,
    finalized: bool,
    idx: usize,
}

impl CsvWriter {
    pub fn new(output: Box<dyn Write>) -> Self {
        Self {
            output,
            field_names: Vec::new(),
            finalized: false,
            idx: 0,
        }
    }

    pub fn sink() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    pub fn entry<V: std::fmt::Display>(&mut self, name: impl Into<String>, value: V) {
        if self.finalized {
            let _ = write!(self.output, "{},", value);
            self.idx += 1;
        } else {
            self.field_names.push(name.into());
        }
    }

    pub fn finalize(&mut self) {
        if !self.finalized {
            for name in &self.field_names {
                let _ = write!(self.output, "{},", name);
            }
            let _ = writeln!(self.output);
            let _ = self.output.flush();
            self.finalized = true;
        } else {
            if self.idx < self.field_names.len() {
                warn!(
                    "csv row has {} values for {} fields",
                    self.idx,
                    self.field_names.len()
                );
            }
            self.idx = 0;
            let _ = writeln!(self.output);
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    // Escape hatch for non-tabular trailers like the histogram dump.
    pub fn raw(&mut self) -> &mut dyn Write {
        &mut self.output
    }
}

// "Bandwidth[0][1][2]" style field names for per-chan/rank/bank quantities.
pub fn indexed_name(base: &str, indices: &[u64]) -> String {
    use std::fmt::Write as _;
    let mut name = String::from(base);
    for index in indices {
        let _ = write!(name, "[{}]", index);
    }
    name
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyHistogram {
    bin_size: u64,
    bins: BTreeMap<u64, u64>,
}

impl LatencyHistogram {
    pub fn new(bin_size: u64) -> Self {
        Self {
            bin_size: bin_size.max(1),
            bins: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, latency: u64) {
        let bin = latency / self.bin_size * self.bin_size;
        *self.bins.entry(bin).or_insert(0) += 1;
    }

    pub fn accumulate(&mut self, other: &LatencyHistogram) {
        for (bin, count) in &other.bins {
            *self.bins.entry(*bin).or_insert(0) += count;
        }
    }

    pub fn bin_size(&self) -> u64 {
        self.bin_size
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.bins.iter().map(|(bin, count)| (*bin, *count))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelSummary {
    pub channel: usize,
    pub reads: u64,
    pub writes: u64,
    pub bytes: u64,
    pub background_energy: u64,
    pub burst_energy: u64,
    pub actpre_energy: u64,
    pub refresh_energy: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub total_bytes: u64,
    pub per_channel: Vec<ChannelSummary>,
}

pub fn write_summary(path: &Path, summary: &RunSummary) {
    if let Ok(payload) = serde_json::to_string_pretty(summary) {
        let _ = fs::write(path, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_header_then_rows() {
        let mut csv = CsvWriter::new(Box::new(Vec::<u8>::new()));
        csv.entry("Bandwidth", 0.5);
        csv.entry("Latency", 5);
        csv.finalize();
        csv.entry("Bandwidth", 1.5);
        csv.entry("Latency", 15);
        csv.finalize();
        // first finalize emits the header only, values start on row two
        assert!(csv.is_finalized());
    }

    #[test]
    fn indexed_names() {
        assert_eq!(indexed_name("Bandwidth", &[0, 1, 2]), "Bandwidth[0][1][2]");
        assert_eq!(indexed_name("Aggregate", &[3]), "Aggregate[3]");
    }

    #[test]
    fn histogram_bins() {
        let mut hist = LatencyHistogram::new(10);
        hist.record(0);
        hist.record(9);
        hist.record(10);
        hist.record(25);
        let bins: Vec<_> = hist.iter().collect();
        assert_eq!(bins, vec![(0, 2), (10, 1), (20, 1)]);
    }
}
