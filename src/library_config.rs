use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use unwrap::unwrap;

use crate::read_info::PairOrientation;

/// Per-library entry of the scan configuration, produced offline by the configuration step
///
/// `min_mapping_quality` below zero means "use the global command-line threshold".
///
#[derive(Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    pub name: String,

    /// Source alignment file tag the library was read from, used for per-file read counts and
    /// copy-number output
    pub bam_file: String,

    pub mean_insert_size: f64,
    pub lower_cutoff: f64,
    pub upper_cutoff: f64,
    pub min_mapping_quality: i32,
    pub read_len: f64,

    /// Genome-wide read counts per pair-orientation category, keyed by category label
    #[serde(default)]
    pub read_count_by_flag: BTreeMap<String, u64>,
}

/// Immutable configuration for one scan
///
#[derive(Deserialize, Serialize)]
pub struct ScanConfig {
    pub libraries: Vec<LibraryConfig>,

    /// Read-group tag to library name
    pub readgroup_library: BTreeMap<String, String>,

    /// Total reference length covered by the configured libraries, used for scoring and
    /// copy-number normalization
    pub covered_reference_length: u64,
}

impl ScanConfig {
    pub fn from_json_file(filename: &Utf8Path) -> Self {
        use std::fs::File;
        use std::io::BufReader;

        let file = unwrap!(
            File::open(filename),
            "Unable to read scan configuration json file: '{filename}'"
        );
        let reader = BufReader::new(file);
        let config: ScanConfig = unwrap!(
            serde_json::from_reader(reader),
            "Unable to parse scan configuration from json file: '{filename}'"
        );
        config
    }

    pub fn library_index_by_name(&self, name: &str) -> Option<usize> {
        self.libraries.iter().position(|x| x.name == name)
    }

    /// Library index for a read-group tag, or None for read groups outside the configuration
    pub fn library_index_for_readgroup(&self, readgroup: &str) -> Option<usize> {
        let name = self.readgroup_library.get(readgroup)?;
        self.library_index_by_name(name)
    }

    /// Genome-wide read count observed for `flag` in library `lib_index`
    pub fn flag_read_count(&self, lib_index: usize, flag: PairOrientation) -> u64 {
        self.libraries[lib_index]
            .read_count_by_flag
            .get(flag.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// Source alignment files in configured order, deduplicated
    pub fn bam_files(&self) -> Vec<&str> {
        let mut files = Vec::new();
        for lib in self.libraries.iter() {
            if !files.contains(&lib.bam_file.as_str()) {
                files.push(lib.bam_file.as_str());
            }
        }
        files
    }

    /// Largest gap allowed between consecutive discordant reads of one region
    ///
    /// Derived from the tightest library: mean insert size less two read lengths, floored at 50.
    ///
    pub fn max_read_window_size(&self) -> i64 {
        let mut window = 1.0e8f64;
        for lib in self.libraries.iter() {
            if lib.mean_insert_size > 0.0 {
                window = window.min(lib.mean_insert_size - 2.0 * lib.read_len);
            }
        }
        window.max(50.0) as i64
    }
}
