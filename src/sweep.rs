use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::classify::{classify_read, Disposition};
use crate::cli::Settings;
use crate::library_config::ScanConfig;
use crate::read_info::{PairOrientation, ReadInfo};
use crate::region_store::RegionStore;
use crate::run_stats::ScanRunStats;
use crate::score_sv::{compute_log_pvalue, phred_from_log_pvalue};
use crate::sv_candidate::{build_sptype, SvCall, SvEvidence};

/// Single-pass sweep over the sorted alignment stream
///
/// Classified discordant reads accumulate into the open region until a gap larger than the read
/// window (or a chromosome change) closes it. Closed regions that pass the span and coverage
/// filters are registered in the store together with their mate links; every `buffer_size`
/// registrations the mate-link graph is flushed into SV calls.
///
/// Emitted calls queue in `calls` and are drained by the driver, so partial output survives an
/// aborted run.
///
pub struct SweepCaller<'a> {
    settings: &'a Settings,
    config: &'a ScanConfig,
    max_read_window_size: i64,

    store: RegionStore,

    /// Genome-wide normal-read counts per grouping key, the denominator of copy-number
    /// estimation
    read_density: BTreeMap<String, u64>,

    // Open-region sweep state
    reads_in_current_region: Vec<ReadInfo>,
    collecting_normal_reads: bool,
    nnormal_reads: u32,
    ntotal_nucleotides: u64,
    max_readlen: i64,
    buffer_size: u32,
    region_start_tid: i32,
    region_start_pos: i64,
    region_end_tid: i32,
    region_end_pos: i64,

    /// Mate links from the open region's reads to already-registered regions
    pending_links: BTreeMap<u32, u32>,

    /// Pairs whose mates both sit in the open region
    pending_self_links: u32,

    /// Coordinates of the open region's reads, for same-region mate detection
    open_read_coords: HashSet<(i32, i64)>,

    /// Normal reads per grouping key since the last region closed
    normal_reads_by_key: BTreeMap<String, u32>,

    calls: Vec<SvCall>,
    pub stats: ScanRunStats,
}

impl<'a> SweepCaller<'a> {
    pub fn new(settings: &'a Settings, config: &'a ScanConfig) -> Self {
        Self {
            settings,
            config,
            max_read_window_size: config.max_read_window_size(),
            store: RegionStore::default(),
            read_density: BTreeMap::new(),
            reads_in_current_region: Vec::new(),
            collecting_normal_reads: false,
            nnormal_reads: 0,
            ntotal_nucleotides: 0,
            max_readlen: 0,
            buffer_size: 0,
            region_start_tid: -1,
            region_start_pos: -1,
            region_end_tid: -1,
            region_end_pos: -1,
            pending_links: BTreeMap::new(),
            pending_self_links: 0,
            open_read_coords: HashSet::new(),
            normal_reads_by_key: BTreeMap::new(),
            calls: Vec::new(),
            stats: ScanRunStats::default(),
        }
    }

    fn grouping_key(&self, lib_index: usize) -> &str {
        let lib_config = &self.config.libraries[lib_index];
        if self.settings.cn_by_library {
            &lib_config.name
        } else {
            &lib_config.bam_file
        }
    }

    /// Classify one alignment and advance the sweep
    pub fn push_read(&mut self, mut read: ReadInfo) {
        let lib_config = &self.config.libraries[read.lib_index];
        let classification = classify_read(&mut read, lib_config, self.settings);

        if classification.tally_normal {
            let key = self.grouping_key(read.lib_index).to_string();
            *self.read_density.entry(key.clone()).or_insert(0) += 1;
            *self.normal_reads_by_key.entry(key).or_insert(0) += 1;
        }

        match classification.disposition {
            Disposition::Drop => {}
            Disposition::Concordant => {
                // Each concordant pair counts once, on its positive-insert mate
                if self.collecting_normal_reads && read.isize > 0 {
                    self.nnormal_reads += 1;
                }
            }
            Disposition::Discordant => {
                self.push_discordant_read(read);
            }
        }
    }

    fn push_discordant_read(&mut self, read: ReadInfo) {
        debug_assert!(read.flag.is_discordant());
        self.stats.discordant_read_count += 1;

        let do_break = read.tid != self.region_end_tid
            || read.pos - self.region_end_pos > self.max_read_window_size;
        if do_break {
            self.process_region_boundary();
            self.reset_region(read.tid, read.pos);
        }

        // Resolve the mate: a registered region first, then the open buffer for same-region
        // pairs
        if let Some(mate_region) = self.store.lookup_read_region(read.mate_tid, read.mate_pos) {
            *self.pending_links.entry(mate_region).or_insert(0) += 1;
        } else if self.open_read_coords.contains(&(read.mate_tid, read.mate_pos)) {
            self.pending_self_links += 1;
        }

        let (tid, pos, read_len) = (read.tid, read.pos, read.read_len);
        self.open_read_coords.insert((tid, pos));
        self.reads_in_current_region.push(read);
        if self.reads_in_current_region.len() == 1 {
            self.collecting_normal_reads = true;
        }
        self.region_end_tid = tid;
        self.region_end_pos = pos;
        if self.collecting_normal_reads {
            self.ntotal_nucleotides += read_len as u64;
            self.max_readlen = self.max_readlen.max(read_len);
        }
    }

    /// Close the open region: register it when it spans enough at credible coverage, otherwise
    /// fold its accumulated links into the last surviving region
    ///
    fn process_region_boundary(&mut self) {
        if self.reads_in_current_region.is_empty() {
            return;
        }

        let seq_coverage = self.ntotal_nucleotides as f64
            / (self.region_end_pos - self.region_start_pos + 1 + self.max_readlen) as f64;
        let normal_reads_by_key = std::mem::take(&mut self.normal_reads_by_key);
        let pending_links = std::mem::take(&mut self.pending_links);
        let pending_self_links = std::mem::take(&mut self.pending_self_links);

        if self.region_end_pos - self.region_start_pos > self.settings.min_len
            && seq_coverage < self.settings.seq_coverage_lim
        {
            let reads = std::mem::take(&mut self.reads_in_current_region);
            self.store.register_region(
                self.region_start_tid,
                self.region_start_pos,
                self.region_end_pos,
                self.nnormal_reads,
                normal_reads_by_key,
                reads,
                &pending_links,
                pending_self_links,
            );
            self.stats.region_registered_count += 1;

            self.buffer_size += 1;
            if self.buffer_size > self.settings.buffer_size {
                self.build_connections();
                self.buffer_size = 0;
            }
        } else {
            self.store.merge_into_last_region(
                &normal_reads_by_key,
                &pending_links,
                pending_self_links,
            );
            self.reads_in_current_region.clear();
            self.stats.region_discarded_count += 1;
        }
    }

    fn reset_region(&mut self, tid: i32, pos: i64) {
        self.region_start_tid = tid;
        self.region_start_pos = pos;
        self.region_end_tid = tid;
        self.region_end_pos = pos;
        self.reads_in_current_region.clear();
        self.collecting_normal_reads = false;
        self.nnormal_reads = 0;
        self.max_readlen = 0;
        self.ntotal_nucleotides = 0;
        self.pending_links.clear();
        self.pending_self_links = 0;
        self.open_read_coords.clear();
    }

    /// Flush the mate-link graph: enumerate every connected component, visit every edge once by
    /// consuming it, and turn qualifying node-sets into SV calls
    ///
    /// The traversal owns the detached graph, so evidence consumption can freely mutate the
    /// store mid-walk; endpoint existence and edge weight are checked at visit time.
    ///
    fn build_connections(&mut self) {
        self.stats.graph_flush_count += 1;
        let mut graph = self.store.take_graph();
        let mut free_nodes: BTreeSet<u32> = BTreeSet::new();

        while let Some((&entry, _)) = graph.iter().next() {
            let mut tails = vec![entry];
            while !tails.is_empty() {
                let mut newtails = Vec::new();
                for tail in tails {
                    if !graph.contains_key(&tail) {
                        continue;
                    }
                    loop {
                        let (neighbor, weight) = {
                            let Some(adjacency) = graph.get_mut(&tail) else {
                                break;
                            };
                            let Some((&neighbor, &weight)) = adjacency.iter().next() else {
                                break;
                            };
                            adjacency.remove(&neighbor);
                            (neighbor, weight)
                        };
                        if neighbor != tail {
                            if let Some(mate_adjacency) = graph.get_mut(&neighbor) {
                                mate_adjacency.remove(&tail);
                            }
                        }

                        if weight < self.settings.min_read_pair
                            || !self.store.region_exists(tail)
                            || !self.store.region_exists(neighbor)
                        {
                            continue;
                        }

                        let snodes = if neighbor != tail {
                            vec![tail.min(neighbor), tail.max(neighbor)]
                        } else {
                            vec![neighbor]
                        };
                        newtails.push(neighbor);
                        self.process_sv(&snodes, &mut free_nodes);
                    }
                    graph.remove(&tail);
                }
                tails = newtails;
            }
        }

        // Release regions whose reads were consumed as evidence. The residual count compares
        // individual reads against a pair threshold; legacy behavior, kept as-is.
        for &id in free_nodes.iter() {
            if self.store.num_reads_in_region(id) < self.settings.min_read_pair as usize {
                self.store.remove_region(id);
            }
        }
    }

    /// Compile one candidate node-set into at most one SV call
    fn process_sv(&mut self, snodes: &[u32], free_nodes: &mut BTreeSet<u32>) {
        let mut evidence = SvEvidence::from_regions(snodes, &self.store);

        // Observed reads are spent evidence, release them before any thresholding
        for &id in snodes.iter() {
            self.store.remove_observed_reads(id, &evidence.observed);
        }

        if evidence.num_pairs < self.settings.min_read_pair {
            return;
        }

        if evidence.dominant_pair_count() >= self.settings.min_read_pair {
            let copy_number = if snodes.len() == 2 && evidence.flag != PairOrientation::Ctx {
                let between_counts = self
                    .store
                    .accumulate_reads_between_regions(snodes[0], snodes[1]);
                evidence.compute_copy_number(
                    &between_counts,
                    &self.read_density,
                    self.config.covered_reference_length,
                )
            } else {
                BTreeMap::new()
            };

            evidence.apply_start_padding(self.max_readlen);

            let total_region_size = self.store.sum_of_region_sizes(snodes);
            let log_pvalue = compute_log_pvalue(
                total_region_size,
                &evidence.dominant_library_read_counts(),
                evidence.flag,
                self.settings.fisher,
                self.config,
            );
            let phred_q = phred_from_log_pvalue(log_pvalue);

            if phred_q > self.settings.score_threshold {
                let per_bam_copy_number = if !self.settings.cn_by_library
                    && evidence.flag != PairOrientation::Ctx
                {
                    Some(
                        self.config
                            .bam_files()
                            .iter()
                            .map(|bam_file| copy_number.get(*bam_file).copied())
                            .collect(),
                    )
                } else {
                    None
                };
                let sptype = build_sptype(
                    &evidence,
                    &copy_number,
                    self.config,
                    self.settings.cn_by_library,
                );
                self.stats.sv_call_count += 1;
                self.calls.push(SvCall {
                    chr: evidence.chr,
                    pos: evidence.pos,
                    fwd_read_count: evidence.fwd_read_count,
                    rev_read_count: evidence.rev_read_count,
                    sv_type: self.settings.sv_type_label(evidence.flag).to_string(),
                    size: evidence.size_estimate(self.config),
                    phred_q,
                    num_pairs: evidence.dominant_pair_count(),
                    sptype,
                    allele_frequency: evidence.allele_frequency(),
                    per_bam_copy_number,
                    flag: evidence.flag,
                    support_reads: std::mem::take(&mut evidence.support_reads),
                });
            }
        }

        free_nodes.extend(snodes.iter().copied());
    }

    /// Close out the stream: flush the final open region, then drain the whole graph
    pub fn finish(&mut self) {
        self.process_region_boundary();
        self.build_connections();
    }

    /// Drain calls emitted since the last drain, in emission order
    pub fn take_calls(&mut self) -> Vec<SvCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn read_density(&self) -> &BTreeMap<String, u64> {
        &self.read_density
    }
}
