use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use clap::Parser;
use simple_error::{bail, SimpleResult};

use crate::read_info::PairOrientation;

#[derive(Parser)]
#[command(author, version, about)]
#[clap(rename_all = "kebab_case")]
pub struct Settings {
    /// Position-sorted merged alignment file in BAM format
    #[arg(long = "bam", value_name = "FILE")]
    pub bam_filename: Utf8PathBuf,

    /// Scan configuration in json format (per-library insert-size statistics, read-group map,
    /// genome-wide flag distribution)
    #[arg(long = "config", value_name = "FILE")]
    pub config_filename: Utf8PathBuf,

    /// Minimum alignment mapping quality, used wherever the library configuration does not
    /// provide its own threshold
    #[arg(long, default_value_t = 35)]
    pub min_map_qual: i32,

    /// Maximum absolute insert size for intra-chromosomal read pairs; pairs mapped further apart
    /// are ignored
    #[arg(long, default_value_t = 1_000_000_000)]
    pub max_sd: i64,

    /// Minimum genomic span required to register a region
    #[arg(long, default_value_t = 7)]
    pub min_len: i64,

    /// Maximum per-region sequencing coverage; regions above this are treated as unreliable and
    /// not registered
    #[arg(long, default_value_t = 1000.0)]
    pub seq_coverage_lim: f64,

    /// Number of registered regions that triggers a graph flush
    #[arg(long, default_value_t = 100)]
    pub buffer_size: u32,

    /// Minimum number of supporting read pairs per SV call, also the minimum mate-link edge
    /// weight followed during the graph traversal
    #[arg(long, default_value_t = 2)]
    pub min_read_pair: u32,

    /// Only analyze inter-chromosomal rearrangements
    #[arg(long)]
    pub transchr_rearrange: bool,

    /// Expect the long-insert (RF concordant) library orientation model
    #[arg(long)]
    pub long_insert: bool,

    /// Group read counts and copy number by library instead of by source alignment file
    #[arg(long)]
    pub cn_by_library: bool,

    /// Combine per-library p-values with Fisher's method
    #[arg(long)]
    pub fisher: bool,

    /// Minimum Phred-scaled confidence score for an SV record to be reported
    #[arg(long, default_value_t = 30)]
    pub score_threshold: i32,

    /// Append the allele frequency column to each record
    #[arg(long)]
    pub print_af: bool,

    /// Directory for supporting-read FASTQ output, one file pair per library; omit to disable
    #[arg(long, value_name = "DIR")]
    pub prefix_fastq: Option<Utf8PathBuf>,

    /// BED file receiving one appended track of supporting reads per SV; omit to disable
    #[arg(long, value_name = "FILE")]
    pub dump_bed: Option<Utf8PathBuf>,

    /// Write run statistics to this file in json format
    #[arg(long, value_name = "FILE")]
    pub stats: Option<Utf8PathBuf>,

    /// Turn on extra debug logging
    #[arg(long)]
    pub debug: bool,

    /// Human-readable SV type label per dominant pair-orientation category; categories outside
    /// the map report "UN"
    #[clap(skip)]
    pub sv_type_labels: BTreeMap<PairOrientation, String>,
}

impl Settings {
    /// True when an enabled output mode needs query sequence and quality retained per read
    pub fn need_sequence_data(&self) -> bool {
        self.prefix_fastq.is_some() || self.dump_bed.is_some()
    }

    pub fn sv_type_label(&self, flag: PairOrientation) -> &str {
        match self.sv_type_labels.get(&flag) {
            Some(x) => x.as_str(),
            None => "UN",
        }
    }
}

pub fn default_sv_type_labels() -> BTreeMap<PairOrientation, String> {
    use PairOrientation::*;
    let mut labels = BTreeMap::new();
    labels.insert(FrBigInsert, "DEL".to_string());
    labels.insert(FrSmallInsert, "INS".to_string());
    labels.insert(Rf, "ITX".to_string());
    labels.insert(Ff, "INV".to_string());
    labels.insert(Ctx, "CTX".to_string());
    labels
}

/// Validate settings and update parameters that can't be processed automatically by clap
///
pub fn validate_and_fix_settings_impl(mut settings: Settings) -> SimpleResult<Settings> {
    fn check_required_filename(filename: &Utf8PathBuf, label: &str) -> SimpleResult<()> {
        if filename.as_str().is_empty() {
            bail!("Must specify {label} file");
        }
        if !filename.exists() {
            bail!("Can't find specified {label} file: '{filename}'");
        }
        Ok(())
    }

    check_required_filename(&settings.bam_filename, "alignment")?;
    check_required_filename(&settings.config_filename, "scan configuration")?;

    if settings.min_read_pair == 0 {
        bail!("--min-read-pair argument must be greater than 0");
    }
    if settings.buffer_size == 0 {
        bail!("--buffer-size argument must be greater than 0");
    }
    if settings.seq_coverage_lim <= 0.0 {
        bail!("--seq-coverage-lim argument must be greater than 0");
    }

    if let Some(prefix) = &settings.prefix_fastq {
        if !prefix.is_dir() {
            bail!("FASTQ output directory does not exist: '{prefix}'");
        }
    }

    settings.sv_type_labels = default_sv_type_labels();

    Ok(settings)
}

/// Validate settings, exiting with a usage error code on any problem
///
pub fn validate_and_fix_settings(settings: Settings) -> Settings {
    match validate_and_fix_settings_impl(settings) {
        Ok(x) => x,
        Err(msg) => {
            eprintln!("Invalid command-line setting: {}", msg);
            std::process::exit(exitcode::USAGE);
        }
    }
}

pub fn parse_settings() -> Settings {
    Settings::parse()
}

#[cfg(test)]
pub mod test_utils {
    use super::*;

    /// Settings matching the documented defaults, without touching the filesystem
    pub fn test_settings() -> Settings {
        Settings {
            bam_filename: Utf8PathBuf::new(),
            config_filename: Utf8PathBuf::new(),
            min_map_qual: 35,
            max_sd: 1_000_000_000,
            min_len: 7,
            seq_coverage_lim: 1000.0,
            buffer_size: 100,
            min_read_pair: 2,
            transchr_rearrange: false,
            long_insert: false,
            cn_by_library: false,
            fisher: false,
            score_threshold: 30,
            print_af: false,
            prefix_fastq: None,
            dump_bed: None,
            stats: None,
            debug: false,
            sv_type_labels: default_sv_type_labels(),
        }
    }
}
