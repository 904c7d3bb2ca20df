use std::collections::BTreeMap;

use log::error;
use statrs::distribution::{ChiSquared, ContinuousCDF, DiscreteCDF, Poisson};

use crate::library_config::ScanConfig;
use crate::read_info::PairOrientation;

/// Floor for log p-values; anything below this is reported as certain
pub const LZERO: f64 = -99.0;

/// Log of the combined probability of observing the per-library supporting read counts by chance
///
/// For each library the observed count is tested against a Poisson whose rate is the genome-wide
/// density of reads carrying the dominant category, scaled to the candidate's total region size.
/// Library log tails are accumulated with Kahan compensation since they can span many orders of
/// magnitude. When `fisher` is set the sum is recombined through a chi-squared right tail with
/// two degrees of freedom per library.
///
pub fn compute_log_pvalue(
    total_region_size: i64,
    library_read_counts: &BTreeMap<usize, u32>,
    flag: PairOrientation,
    fisher: bool,
    config: &ScanConfig,
) -> f64 {
    let mut log_pvalue = 0.0f64;
    let mut err = 0.0f64;
    for (&lib_index, &read_count) in library_read_counts.iter() {
        let flag_read_count = config.flag_read_count(lib_index, flag);
        let lambda = (total_region_size as f64)
            * (flag_read_count as f64 / config.covered_reference_length as f64);
        let lambda = lambda.max(1.0e-10);

        let tail = poisson_right_tail(lambda, read_count as u64);
        let tmp_a = tail.ln() - err;
        let tmp_b = log_pvalue + tmp_a;
        err = (tmp_b - log_pvalue) - tmp_a;
        log_pvalue = tmp_b;
    }

    if fisher && log_pvalue < 0.0 {
        // Fisher's method: -2 sum(ln p) is chi-squared with 2n degrees of freedom
        let freedom = 2.0 * library_read_counts.len() as f64;
        match ChiSquared::new(freedom) {
            Ok(chisq) => {
                let fisher_p = chisq.sf(-2.0 * log_pvalue);
                log_pvalue = if fisher_p > LZERO.exp() {
                    fisher_p.ln()
                } else {
                    LZERO
                };
            }
            Err(_) => {
                error!(
                    "chi squared combination failed: N={}, log(p)={}",
                    freedom, log_pvalue
                );
            }
        }
    }

    log_pvalue
}

/// P(X >= k) under Poisson(lambda)
fn poisson_right_tail(lambda: f64, k: u64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    // Lambda is pre-floored above zero so construction cannot fail
    let poisson = Poisson::new(lambda).unwrap();
    poisson.sf(k - 1)
}

/// Phred-like quality from a log p-value, capped at 99
pub fn phred_from_log_pvalue(log_pvalue: f64) -> i32 {
    let phred = -10.0 * log_pvalue / std::f64::consts::LN_10;
    if phred > 99.0 {
        99
    } else {
        (phred + 0.5) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library_config::LibraryConfig;

    fn test_config_n(flag_count: u64, num_libraries: usize) -> ScanConfig {
        let mut read_count_by_flag = BTreeMap::new();
        read_count_by_flag.insert("FR_big_insert".to_string(), flag_count);
        let libraries = (0..num_libraries)
            .map(|i| LibraryConfig {
                name: format!("lib{i}"),
                bam_file: format!("{i}.bam"),
                mean_insert_size: 500.0,
                lower_cutoff: 400.0,
                upper_cutoff: 600.0,
                min_mapping_quality: -1,
                read_len: 100.0,
                read_count_by_flag: read_count_by_flag.clone(),
            })
            .collect();
        ScanConfig {
            libraries,
            readgroup_library: BTreeMap::new(),
            covered_reference_length: 1_000_000,
        }
    }

    fn test_config(flag_count: u64) -> ScanConfig {
        test_config_n(flag_count, 1)
    }

    #[test]
    fn test_more_support_is_more_significant() {
        let config = test_config(1000);
        let mut previous = 0.0;
        for read_count in [2u32, 5, 10, 20] {
            let mut counts = BTreeMap::new();
            counts.insert(0usize, read_count);
            let log_p = compute_log_pvalue(
                1000,
                &counts,
                PairOrientation::FrBigInsert,
                false,
                &config,
            );
            assert!(log_p <= previous, "k={read_count}: {log_p} > {previous}");
            previous = log_p;
        }
    }

    #[test]
    fn test_zero_observed_reads_is_certain_noise() {
        let config = test_config(1000);
        let mut counts = BTreeMap::new();
        counts.insert(0usize, 0u32);
        let log_p =
            compute_log_pvalue(1000, &counts, PairOrientation::FrBigInsert, false, &config);
        approx::assert_ulps_eq!(log_p, 0.0, max_ulps = 4);
        assert_eq!(phred_from_log_pvalue(log_p), 0);
    }

    #[test]
    fn test_unseen_flag_uses_lambda_floor() {
        // No genome-wide reads for the category: the rate floors at 1e-10 and any observation is
        // highly significant
        let config = test_config(0);
        let mut counts = BTreeMap::new();
        counts.insert(0usize, 4u32);
        let log_p =
            compute_log_pvalue(1000, &counts, PairOrientation::FrBigInsert, false, &config);
        assert!(log_p < -90.0);
        assert_eq!(phred_from_log_pvalue(log_p), 99);
    }

    #[test]
    fn test_fisher_is_identity_for_one_library() {
        // Chi-squared with two degrees of freedom has sf(x) = exp(-x/2), so recombining a single
        // library's tail must return it unchanged
        let config = test_config(1000);
        let mut counts = BTreeMap::new();
        counts.insert(0usize, 10u32);
        let plain =
            compute_log_pvalue(1000, &counts, PairOrientation::FrBigInsert, false, &config);
        let fisher =
            compute_log_pvalue(1000, &counts, PairOrientation::FrBigInsert, true, &config);
        approx::assert_abs_diff_eq!(plain, fisher, epsilon = 1e-6);
    }

    #[test]
    fn test_fisher_combination_moderates_two_libraries() {
        let config = test_config_n(1000, 2);
        let mut counts = BTreeMap::new();
        counts.insert(0usize, 10u32);
        counts.insert(1usize, 10u32);
        let plain =
            compute_log_pvalue(1000, &counts, PairOrientation::FrBigInsert, false, &config);
        let fisher =
            compute_log_pvalue(1000, &counts, PairOrientation::FrBigInsert, true, &config);
        // The combined tail is weaker than the naive product of tails but still significant
        assert!(fisher > plain);
        assert!(fisher < 0.0);
    }

    #[test]
    fn test_phred_rounding_and_cap() {
        assert_eq!(phred_from_log_pvalue(0.001f64.ln()), 30);
        assert_eq!(phred_from_log_pvalue(-1000.0), 99);
        assert_eq!(phred_from_log_pvalue(LZERO), 99);
    }
}
