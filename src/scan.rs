use std::collections::HashSet;
use std::io::Write;

use log::{info, warn};
use rust_htslib::bam::{self, Read};
use unwrap::unwrap;

use crate::bed_output;
use crate::chrom_list::ChromList;
use crate::cli::Settings;
use crate::fastq_output::FastqWriter;
use crate::library_config::ScanConfig;
use crate::read_info::{self, ReadInfo};
use crate::run_stats::write_scan_run_stats;
use crate::sv_candidate::SvCall;
use crate::sv_output;
use crate::sweep::SweepCaller;

/// Enabled output destinations for emitted SV calls
///
/// Records are written in call-emission order as the sweep produces them, so output written
/// before an abort is retained.
///
struct ResultSinks<'a> {
    settings: &'a Settings,
    config: &'a ScanConfig,
    chrom_list: &'a ChromList,
    stdout: std::io::Stdout,
    fastq_writer: Option<FastqWriter>,
}

impl<'a> ResultSinks<'a> {
    fn new(settings: &'a Settings, config: &'a ScanConfig, chrom_list: &'a ChromList) -> Self {
        let stdout = std::io::stdout();
        {
            let mut handle = stdout.lock();
            unwrap!(
                sv_output::write_header(&mut handle, settings, config),
                "Failed to write output header"
            );
        }
        let fastq_writer = settings
            .prefix_fastq
            .as_ref()
            .map(|prefix| FastqWriter::new(prefix));
        Self {
            settings,
            config,
            chrom_list,
            stdout,
            fastq_writer,
        }
    }

    fn write_call(&mut self, call: &SvCall) {
        {
            let mut handle = self.stdout.lock();
            unwrap!(
                sv_output::write_sv_record(&mut handle, call, self.chrom_list, self.settings),
                "Failed to write SV record"
            );
            unwrap!(handle.flush(), "Failed to flush SV output");
        }
        if let Some(fastq_writer) = &mut self.fastq_writer {
            fastq_writer.dump_support_reads(call.flag, &call.support_reads, self.config);
        }
        if let Some(bed_filename) = &self.settings.dump_bed {
            bed_output::append_sv_track(bed_filename, call, self.chrom_list, self.config);
        }
    }

    fn finish(&mut self) {
        if let Some(fastq_writer) = &mut self.fastq_writer {
            fastq_writer.flush();
        }
    }
}

/// Run the full sweep over the merged alignment stream
///
pub fn run_scan(settings: &Settings) {
    let config = ScanConfig::from_json_file(&settings.config_filename);
    info!(
        "Read scan configuration for {} libraries from '{}'",
        config.libraries.len(),
        settings.config_filename
    );
    info!(
        "Using a read window size of {} bases",
        config.max_read_window_size()
    );

    let mut bam_reader = unwrap!(
        bam::Reader::from_path(&settings.bam_filename),
        "Failed to open input alignment file: '{}'",
        settings.bam_filename
    );
    let chrom_list = ChromList::from_bam_header(bam_reader.header());

    let need_sequence = settings.need_sequence_data();
    let mut caller = SweepCaller::new(settings, &config);
    let mut sinks = ResultSinks::new(settings, &config, &chrom_list);
    let mut unknown_readgroups: HashSet<String> = HashSet::new();

    let mut record = bam::Record::new();
    while let Some(r) = bam_reader.read(&mut record) {
        unwrap!(r, "Failed to parse alignment record");
        caller.stats.total_alignment_count += 1;

        if read_info::filter_out_alignment_record(&record) {
            continue;
        }

        // Without a configured library there are no insert-size cutoffs to classify against
        let readgroup = read_info::get_read_group(&record);
        let lib_index = match readgroup
            .as_ref()
            .and_then(|rg| config.library_index_for_readgroup(rg))
        {
            Some(x) => x,
            None => {
                caller.stats.unknown_readgroup_skip_count += 1;
                let rg = readgroup.unwrap_or_else(|| "<missing>".to_string());
                if unknown_readgroups.insert(rg.clone()) {
                    warn!("Skipping alignments from unknown read group '{rg}'");
                }
                continue;
            }
        };

        caller.push_read(ReadInfo::from_bam_record(&record, lib_index, need_sequence));
        for call in caller.take_calls() {
            sinks.write_call(&call);
        }
    }

    caller.finish();
    for call in caller.take_calls() {
        sinks.write_call(&call);
    }
    sinks.finish();

    info!(
        "Accumulated normal-read density for {} groups",
        caller.read_density().len()
    );
    caller.stats.log_summary();
    if let Some(stats_filename) = &settings.stats {
        write_scan_run_stats(stats_filename, &caller.stats);
    }
}
