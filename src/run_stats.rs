//! Track stats for the whole scan
//!

use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::{Deserialize, Serialize};
use unwrap::unwrap;

#[derive(Default, Deserialize, Serialize)]
pub struct ScanRunStats {
    pub total_alignment_count: u64,
    pub unknown_readgroup_skip_count: u64,
    pub discordant_read_count: u64,
    pub region_registered_count: u64,
    pub region_discarded_count: u64,
    pub graph_flush_count: u64,
    pub sv_call_count: u64,
}

impl ScanRunStats {
    pub fn log_summary(&self) {
        info!(
            "Processed {} alignments ({} skipped for unknown read group)",
            self.total_alignment_count, self.unknown_readgroup_skip_count
        );
        info!(
            "Buffered {} discordant reads into {} regions ({} discarded), {} graph flushes",
            self.discordant_read_count,
            self.region_registered_count,
            self.region_discarded_count,
            self.graph_flush_count
        );
        info!("Reported {} SV calls", self.sv_call_count);
    }
}

/// Write run stats out in json format
pub fn write_scan_run_stats(filename: &Utf8Path, run_stats: &ScanRunStats) {
    info!("Writing run statistics to file: '{filename}'");

    let f = unwrap!(
        File::create(filename),
        "Unable to create run statistics json file: '{filename}'"
    );
    unwrap!(
        serde_json::to_writer_pretty(&f, run_stats),
        "Unable to serialize run statistics to json file: '{filename}'"
    );
}
