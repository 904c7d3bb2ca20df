use std::collections::{BTreeMap, HashMap, HashSet};

use crate::library_config::ScanConfig;
use crate::read_info::{PairOrientation, ReadInfo};
use crate::region_store::RegionStore;

/// Supporting evidence compiled from the reads of one candidate node-set
///
/// A read pair only counts when both mates are present in the candidate set; such reads are
/// "observed" and become spent evidence once the candidate is processed.
///
pub struct SvEvidence {
    /// Dominant pair-orientation category, the one with the most complete pairs; ties break by
    /// the fixed category order
    pub flag: PairOrientation,

    /// Complete pairs across all categories
    pub num_pairs: u32,

    /// Complete pairs per category
    pub flag_counts: BTreeMap<PairOrientation, u32>,

    /// Observed reads per category and library; both mates of a pair count
    pub library_read_counts: BTreeMap<PairOrientation, BTreeMap<usize, u32>>,

    /// Summed absolute insert size per category and library, one term per pair
    pub library_span_sums: BTreeMap<PairOrientation, BTreeMap<usize, f64>>,

    /// Query names seen on both mates
    pub observed: HashSet<String>,

    /// Both mates of every complete pair, in completion order
    pub support_reads: Vec<ReadInfo>,

    pub chr: [i32; 2],
    pub pos: [i64; 2],
    pub fwd_read_count: [u32; 2],
    pub rev_read_count: [u32; 2],

    /// Concordant pairs counted while the supporting regions were open
    pub normal_pair_count: u32,
}

impl SvEvidence {
    /// Compile evidence from one or two regions
    ///
    /// `snodes` must reference live regions and is expected in ascending id order, which for a
    /// sorted input stream is also genomic order.
    ///
    pub fn from_regions(snodes: &[u32], store: &RegionStore) -> Self {
        assert!(snodes.len() == 1 || snodes.len() == 2);

        let mut flag_counts = BTreeMap::new();
        let mut library_read_counts: BTreeMap<PairOrientation, BTreeMap<usize, u32>> =
            BTreeMap::new();
        let mut library_span_sums: BTreeMap<PairOrientation, BTreeMap<usize, f64>> =
            BTreeMap::new();
        let mut observed = HashSet::new();
        let mut support_reads = Vec::new();
        let mut fwd_read_count = [0u32; 2];
        let mut rev_read_count = [0u32; 2];
        let mut num_pairs = 0u32;

        let mut first_sighting: HashMap<&str, (usize, &ReadInfo)> = HashMap::new();
        for (node_index, &region_id) in snodes.iter().enumerate() {
            for read in store.region(region_id).reads.iter() {
                match first_sighting.remove(read.qname.as_str()) {
                    None => {
                        first_sighting.insert(read.qname.as_str(), (node_index, read));
                    }
                    Some((mate_node_index, mate)) => {
                        num_pairs += 1;
                        *flag_counts.entry(read.flag).or_insert(0) += 1;
                        *library_read_counts
                            .entry(read.flag)
                            .or_default()
                            .entry(read.lib_index)
                            .or_insert(0) += 2;
                        *library_span_sums
                            .entry(read.flag)
                            .or_default()
                            .entry(read.lib_index)
                            .or_insert(0.0) += read.abs_isize() as f64;

                        for (index, r) in [(mate_node_index, mate), (node_index, read)] {
                            if r.is_reverse {
                                rev_read_count[index] += 1;
                            } else {
                                fwd_read_count[index] += 1;
                            }
                        }
                        observed.insert(read.qname.clone());
                        support_reads.push(mate.clone());
                        support_reads.push(read.clone());
                    }
                }
            }
        }

        // BTreeMap iteration is in category order, and only a strictly greater count replaces
        // the current choice, so ties resolve to the earliest category.
        let mut flag = PairOrientation::Na;
        let mut best_count = 0u32;
        for (&candidate, &count) in flag_counts.iter() {
            if count > best_count {
                flag = candidate;
                best_count = count;
            }
        }

        let (chr, pos) = if snodes.len() == 1 {
            let region = store.region(snodes[0]);
            ([region.tid; 2], [region.begin, region.last])
        } else {
            let first = store.region(snodes[0]);
            let second = store.region(snodes[1]);
            ([first.tid, second.tid], [first.last, second.begin])
        };

        // A one-node candidate reports the same strand tallies on both endpoints
        if snodes.len() == 1 {
            fwd_read_count[1] = fwd_read_count[0];
            rev_read_count[1] = rev_read_count[0];
        }

        let normal_pair_count = snodes
            .iter()
            .map(|&id| store.region(id).normal_read_count)
            .sum();

        Self {
            flag,
            num_pairs,
            flag_counts,
            library_read_counts,
            library_span_sums,
            observed,
            support_reads,
            chr,
            pos,
            fwd_read_count,
            rev_read_count,
            normal_pair_count,
        }
    }

    /// Complete pairs supporting the dominant category
    pub fn dominant_pair_count(&self) -> u32 {
        self.flag_counts.get(&self.flag).copied().unwrap_or(0)
    }

    /// Observed reads per library for the dominant category
    pub fn dominant_library_read_counts(&self) -> BTreeMap<usize, u32> {
        self.library_read_counts
            .get(&self.flag)
            .cloned()
            .unwrap_or_default()
    }

    /// Pad the start coordinate toward the second breakpoint by one read length
    ///
    /// RF-type (and the folded RR) evidence points outward from the event, so its start is left
    /// unpadded.
    ///
    pub fn apply_start_padding(&mut self, max_readlen: i64) {
        use PairOrientation::*;
        if self.flag != Rf && self.flag != Rr && self.pos[0] + max_readlen - 5 < self.pos[1] {
            self.pos[0] += max_readlen - 5;
        }
    }

    /// Estimated SV size: mean observed span of the dominant category less the expected insert
    /// size, averaged over its supporting pairs
    ///
    pub fn size_estimate(&self, config: &ScanConfig) -> i64 {
        let pair_count = self.dominant_pair_count();
        if pair_count == 0 {
            return 0;
        }
        let mut diff = 0.0f64;
        if let Some(span_sums) = self.library_span_sums.get(&self.flag) {
            for (&lib_index, &span_sum) in span_sums.iter() {
                let read_count = self.library_read_counts[&self.flag][&lib_index] as f64;
                diff += span_sum - read_count * config.libraries[lib_index].mean_insert_size;
            }
        }
        (diff / pair_count as f64 + 0.5) as i64
    }

    /// Observed pairs against the normal pairs of the supporting regions
    pub fn allele_frequency(&self) -> f64 {
        self.num_pairs as f64 / (self.num_pairs + self.normal_pair_count) as f64
    }

    /// Copy number per grouping key from the normal-read density between the breakpoints
    ///
    /// `between_counts` holds the normal reads observed between the candidate regions,
    /// `read_density` the genome-wide counts per key. Must be called before start padding, the
    /// span is the unpadded breakpoint distance.
    ///
    pub fn compute_copy_number(
        &self,
        between_counts: &BTreeMap<String, u32>,
        read_density: &BTreeMap<String, u64>,
        covered_reference_length: u64,
    ) -> BTreeMap<String, f64> {
        let mut copy_number = BTreeMap::new();
        let span = self.pos[1] - self.pos[0];
        if span <= 0 {
            return copy_number;
        }
        for (key, &count) in between_counts.iter() {
            let Some(&genome_wide) = read_density.get(key) else {
                continue;
            };
            if genome_wide == 0 {
                continue;
            }
            let density = genome_wide as f64 / covered_reference_length as f64;
            copy_number.insert(key.clone(), count as f64 / (density * span as f64));
        }
        copy_number
    }
}

/// One reportable SV, ready for the output formatters
///
/// Coordinates are 0-based here; the output boundary converts to 1-based.
///
pub struct SvCall {
    pub chr: [i32; 2],
    pub pos: [i64; 2],
    pub fwd_read_count: [u32; 2],
    pub rev_read_count: [u32; 2],
    pub sv_type: String,
    pub size: i64,
    pub phred_q: i32,
    pub num_pairs: u32,
    pub sptype: String,
    pub allele_frequency: f64,

    /// Copy number per configured source file, only present for per-file grouping of
    /// intra-chromosomal calls
    pub per_bam_copy_number: Option<Vec<Option<f64>>>,

    pub flag: PairOrientation,
    pub support_reads: Vec<ReadInfo>,
}

/// Build the per-library (or per-source-file) support summary column
///
/// Library grouping lists `lib|reads,CN`; file grouping lists `file|reads`, with copy numbers
/// deferred to dedicated trailing columns.
///
pub fn build_sptype(
    evidence: &SvEvidence,
    copy_number: &BTreeMap<String, f64>,
    config: &ScanConfig,
    cn_by_library: bool,
) -> String {
    use itertools::Itertools;

    let read_counts = evidence.dominant_library_read_counts();
    if cn_by_library {
        read_counts
            .iter()
            .map(|(&lib_index, &read_count)| {
                let lib = &config.libraries[lib_index];
                let copy_number_str = if evidence.flag == PairOrientation::Ctx {
                    "NA".to_string()
                } else {
                    match copy_number.get(&lib.name) {
                        Some(x) => format!("{x:.2}"),
                        None => "NA".to_string(),
                    }
                };
                format!("{}|{read_count},{copy_number_str}", lib.name)
            })
            .join(":")
    } else {
        let mut bam_read_counts: BTreeMap<&str, u32> = BTreeMap::new();
        for (&lib_index, &read_count) in read_counts.iter() {
            *bam_read_counts
                .entry(config.libraries[lib_index].bam_file.as_str())
                .or_insert(0) += read_count;
        }
        if bam_read_counts.is_empty() {
            "NA".to_string()
        } else {
            bam_read_counts
                .iter()
                .map(|(bam_file, read_count)| format!("{bam_file}|{read_count}"))
                .join(":")
        }
    }
}
