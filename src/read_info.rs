use rust_htslib::bam;
use rust_htslib::bam::record::Aux;

/// Pair-orientation category of a single alignment
///
/// This is the pair-level anomaly type, not the raw per-record alignment bits. `Na` and the
/// unmapped categories are discarded at classification, the `Normal*` categories are counted as
/// background, and everything else is discordant evidence that enters the region buffer.
///
/// The declaration order of the discordant categories defines the fixed tie-break order used when
/// selecting the dominant category of an SV candidate.
///
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, strum::AsRefStr, strum::EnumIter,
)]
pub enum PairOrientation {
    #[strum(serialize = "NA")]
    Na,
    #[strum(serialize = "normal_FR")]
    NormalFr,
    #[strum(serialize = "normal_RF")]
    NormalRf,
    #[strum(serialize = "FR_big_insert")]
    FrBigInsert,
    #[strum(serialize = "FR_small_insert")]
    FrSmallInsert,
    #[strum(serialize = "RF")]
    Rf,
    #[strum(serialize = "FF")]
    Ff,
    #[strum(serialize = "RR")]
    Rr,
    #[strum(serialize = "CTX")]
    Ctx,
    #[strum(serialize = "mate_unmapped")]
    MateUnmapped,
    #[strum(serialize = "unmapped")]
    Unmapped,
}

impl PairOrientation {
    /// True for the categories that can support an SV call
    pub fn is_discordant(&self) -> bool {
        use PairOrientation::*;
        matches!(self, FrBigInsert | FrSmallInsert | Rf | Ff | Rr | Ctx)
    }
}

/// One alignment record as seen by the sweep engine
///
/// Created at ingestion, moved into a region buffer, and possibly consumed as SV evidence during a
/// graph flush.
///
#[derive(Clone, Debug)]
pub struct ReadInfo {
    pub tid: i32,
    pub pos: i64,
    pub is_reverse: bool,
    pub mate_tid: i32,
    pub mate_pos: i64,
    pub isize: i64,
    pub mapq: u8,
    pub read_len: i64,
    pub qname: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    pub lib_index: usize,
    pub flag: PairOrientation,
}

impl ReadInfo {
    pub fn abs_isize(&self) -> i64 {
        self.isize.abs()
    }

    /// Build a ReadInfo from a BAM record
    ///
    /// Sequence and quality are only copied out when an output mode needs them.
    ///
    pub fn from_bam_record(record: &bam::Record, lib_index: usize, need_sequence: bool) -> Self {
        let (seq, qual) = if need_sequence {
            (record.seq().as_bytes(), record.qual().to_vec())
        } else {
            (Vec::new(), Vec::new())
        };
        Self {
            tid: record.tid(),
            pos: record.pos(),
            is_reverse: record.is_reverse(),
            mate_tid: record.mtid(),
            mate_pos: record.mpos(),
            isize: record.insert_size(),
            mapq: record.mapq(),
            read_len: record.seq_len() as i64,
            qname: String::from_utf8_lossy(record.qname()).to_string(),
            seq,
            qual,
            lib_index,
            flag: raw_pair_orientation(record),
        }
    }
}

/// Derive the pair-orientation category from the alignment record flag bits
///
/// Opposite-strand pairs are typed by the orientation of the leftmost mate; same-strand pairs are
/// inversion-type evidence regardless of order.
///
pub fn raw_pair_orientation(record: &bam::Record) -> PairOrientation {
    use PairOrientation::*;

    if !record.is_paired() {
        return Na;
    }
    if record.is_unmapped() {
        return Unmapped;
    }
    if record.is_mate_unmapped() {
        return MateUnmapped;
    }
    if record.tid() != record.mtid() {
        return Ctx;
    }

    let self_reverse = record.is_reverse();
    let mate_reverse = record.is_mate_reverse();
    if self_reverse == mate_reverse {
        if self_reverse {
            Rr
        } else {
            Ff
        }
    } else {
        let self_is_leftmost = record.pos() < record.mpos()
            || (record.pos() == record.mpos() && !self_reverse);
        let leftmost_is_forward = if self_is_leftmost {
            !self_reverse
        } else {
            !mate_reverse
        };
        if leftmost_is_forward {
            NormalFr
        } else {
            NormalRf
        }
    }
}

/// True for records the sweep should never see: non-primary alignments, duplicates, QC failures
pub fn filter_out_alignment_record(record: &bam::Record) -> bool {
    record.is_secondary()
        || record.is_supplementary()
        || record.is_duplicate()
        || record.is_quality_check_failed()
}

/// Read-group tag of the record, if present
pub fn get_read_group(record: &bam::Record) -> Option<String> {
    match record.aux(b"RG") {
        Ok(Aux::String(rg)) => Some(rg.to_string()),
        _ => None,
    }
}
