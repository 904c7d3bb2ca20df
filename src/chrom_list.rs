use rust_htslib::bam;

/// Chromosome name and length info from the alignment file header
///
pub struct ChromInfo {
    pub label: String,
    #[allow(dead_code)]
    pub length: u64,
}

/// List of chromosome names and lengths, with order matching the `tid` indexing scheme of the
/// input alignment file
///
#[derive(Default)]
pub struct ChromList {
    pub data: Vec<ChromInfo>,
}

impl ChromList {
    pub fn from_bam_header(header: &bam::HeaderView) -> Self {
        let mut data = Vec::new();
        for tid in 0..header.target_count() {
            let label = String::from_utf8_lossy(header.tid2name(tid)).to_string();
            let length = header.target_len(tid).unwrap_or(0);
            data.push(ChromInfo { label, length });
        }
        Self { data }
    }

    /// Chromosome label for `tid`
    ///
    /// Asserts on an out of range tid, which would mean the input stream disagrees with its own
    /// header.
    ///
    pub fn label(&self, tid: i32) -> &str {
        assert!(tid >= 0 && (tid as usize) < self.data.len());
        &self.data[tid as usize].label
    }
}

#[cfg(test)]
impl ChromList {
    /// Test-only construction from bare labels
    pub fn from_labels(labels: &[&str]) -> Self {
        let data = labels
            .iter()
            .map(|x| ChromInfo {
                label: x.to_string(),
                length: 0,
            })
            .collect();
        Self { data }
    }
}
