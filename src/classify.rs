use crate::cli::Settings;
use crate::library_config::LibraryConfig;
use crate::read_info::{PairOrientation, ReadInfo};

/// What the sweep should do with one classified alignment
///
pub enum Disposition {
    /// Not usable as evidence or background
    Drop,

    /// Concordant pair, counted as background while a region is open
    Concordant,

    /// Discordant pair, enters the region buffer
    Discordant,
}

pub struct Classification {
    pub disposition: Disposition,

    /// True when the read should bump the genome-wide and between-region normal-read counters
    ///
    /// Evaluated on the flag as it arrived, before insert-size reclassification, so reads later
    /// promoted to a discordant category still count toward the normal background.
    ///
    pub tally_normal: bool,
}

impl Classification {
    fn drop(tally_normal: bool) -> Self {
        Self {
            disposition: Disposition::Drop,
            tally_normal,
        }
    }
}

/// Reassign the pair-orientation category from the insert size, given the library cutoffs
///
/// Under the long-insert model the expected concordant orientation is RF, otherwise FR. The upper
/// threshold is strict-greater and the lower threshold strict-less, so exact boundary values stay
/// concordant. Applying the reassignment twice yields the same category.
///
pub fn reclassify_insert_size(
    flag: PairOrientation,
    abs_isize: i64,
    lib_config: &LibraryConfig,
    long_insert: bool,
) -> PairOrientation {
    use PairOrientation::*;

    let abs_isize = abs_isize as f64;
    let mut flag = flag;
    if long_insert {
        if abs_isize > lib_config.upper_cutoff && flag == NormalRf {
            flag = Rf;
        }
        if abs_isize <= lib_config.upper_cutoff && flag == Rf {
            flag = NormalRf;
        }
        if abs_isize < lib_config.lower_cutoff && flag == NormalRf {
            flag = FrSmallInsert;
        }
    } else {
        if abs_isize > lib_config.upper_cutoff && flag == NormalFr {
            flag = FrBigInsert;
        }
        if abs_isize <= lib_config.upper_cutoff && flag == FrBigInsert {
            flag = NormalFr;
        }
        if abs_isize < lib_config.lower_cutoff && flag == NormalFr {
            flag = FrSmallInsert;
        }
        if flag == NormalRf {
            flag = Rf;
        }
    }

    // FF and RR are the same inversion-type evidence
    if flag == Rr {
        flag = Ff;
    }
    flag
}

/// Classify one alignment against its library configuration and the global options
///
/// The read's pair-orientation flag may be reassigned in place.
///
pub fn classify_read(
    read: &mut ReadInfo,
    lib_config: &LibraryConfig,
    settings: &Settings,
) -> Classification {
    use PairOrientation::*;

    if read.flag == Na {
        return Classification::drop(false);
    }

    // A negative library threshold means the config did not provide one, fall back to the
    // command-line default rather than admit everything.
    let min_mapq = if lib_config.min_mapping_quality >= 0 {
        lib_config.min_mapping_quality
    } else {
        settings.min_map_qual
    };
    if (read.mapq as i32) <= min_mapq {
        return Classification::drop(false);
    }

    let tally_normal = (read.mapq as i32) > settings.min_map_qual
        && matches!(read.flag, NormalFr | NormalRf);

    if (settings.transchr_rearrange && read.flag != Ctx)
        || read.flag == MateUnmapped
        || read.flag == Unmapped
    {
        return Classification::drop(tally_normal);
    }

    // Skip read pairs mapped too distantly on the same chromosome
    if read.flag != Ctx && read.abs_isize() > settings.max_sd {
        return Classification::drop(tally_normal);
    }

    read.flag = reclassify_insert_size(
        read.flag,
        read.abs_isize(),
        lib_config,
        settings.long_insert,
    );

    let disposition = if matches!(read.flag, NormalFr | NormalRf) {
        Disposition::Concordant
    } else {
        Disposition::Discordant
    };
    Classification {
        disposition,
        tally_normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_utils::test_settings;
    use crate::read_info::test_utils::test_read;

    fn test_library() -> LibraryConfig {
        LibraryConfig {
            name: "libA".to_string(),
            bam_file: "a.bam".to_string(),
            mean_insert_size: 500.0,
            lower_cutoff: 400.0,
            upper_cutoff: 600.0,
            min_mapping_quality: -1,
            read_len: 100.0,
            read_count_by_flag: Default::default(),
        }
    }

    #[test]
    fn test_short_insert_reclassification() {
        use PairOrientation::*;
        let lib = test_library();

        assert_eq!(reclassify_insert_size(NormalFr, 2500, &lib, false), FrBigInsert);
        assert_eq!(reclassify_insert_size(NormalFr, 200, &lib, false), FrSmallInsert);
        assert_eq!(reclassify_insert_size(NormalFr, 500, &lib, false), NormalFr);
        assert_eq!(reclassify_insert_size(FrBigInsert, 500, &lib, false), NormalFr);
        assert_eq!(reclassify_insert_size(NormalRf, 500, &lib, false), Rf);
        assert_eq!(reclassify_insert_size(Rr, 500, &lib, false), Ff);
    }

    #[test]
    fn test_long_insert_reclassification() {
        use PairOrientation::*;
        let lib = test_library();

        assert_eq!(reclassify_insert_size(NormalRf, 2500, &lib, true), Rf);
        assert_eq!(reclassify_insert_size(NormalRf, 200, &lib, true), FrSmallInsert);
        assert_eq!(reclassify_insert_size(Rf, 500, &lib, true), NormalRf);
        // An aligner-flagged RF pair demoted below the lower cutoff becomes small-insert evidence
        assert_eq!(reclassify_insert_size(Rf, 200, &lib, true), FrSmallInsert);
    }

    #[test]
    fn test_boundary_values_stay_concordant() {
        use PairOrientation::*;
        let lib = test_library();

        assert_eq!(reclassify_insert_size(NormalFr, 600, &lib, false), NormalFr);
        assert_eq!(reclassify_insert_size(FrBigInsert, 600, &lib, false), NormalFr);
        assert_eq!(reclassify_insert_size(NormalFr, 400, &lib, false), NormalFr);
        assert_eq!(reclassify_insert_size(Rf, 600, &lib, true), NormalRf);
    }

    #[test]
    fn test_reclassification_is_idempotent() {
        use strum::IntoEnumIterator;
        let lib = test_library();

        for flag in PairOrientation::iter() {
            for abs_isize in [0, 200, 400, 500, 600, 2500] {
                for long_insert in [false, true] {
                    let once = reclassify_insert_size(flag, abs_isize, &lib, long_insert);
                    let twice = reclassify_insert_size(once, abs_isize, &lib, long_insert);
                    assert_eq!(once, twice, "flag {flag:?} isize {abs_isize}");
                }
            }
        }
    }

    #[test]
    fn test_mapq_thresholds() {
        use PairOrientation::*;
        let settings = test_settings();
        let mut lib = test_library();

        let mut read = test_read("r1", 0, 1000, false, 0, 3500, 2500, NormalFr);
        read.mapq = 35;
        let c = classify_read(&mut read, &lib, &settings);
        assert!(matches!(c.disposition, Disposition::Drop));
        assert!(!c.tally_normal);

        // The per-library threshold overrides the global one when present
        lib.min_mapping_quality = 59;
        let mut read = test_read("r1", 0, 1000, false, 0, 3500, 2500, NormalFr);
        read.mapq = 59;
        let c = classify_read(&mut read, &lib, &settings);
        assert!(matches!(c.disposition, Disposition::Drop));
    }

    #[test]
    fn test_normal_tally_precedes_reclassification() {
        use PairOrientation::*;
        let settings = test_settings();
        let lib = test_library();

        // Promoted to big-insert evidence, but still tallied as background
        let mut read = test_read("r1", 0, 1000, false, 0, 3500, 2500, NormalFr);
        let c = classify_read(&mut read, &lib, &settings);
        assert!(matches!(c.disposition, Disposition::Discordant));
        assert!(c.tally_normal);
        assert_eq!(read.flag, FrBigInsert);
    }

    #[test]
    fn test_transchr_rearrange_keeps_only_ctx() {
        use PairOrientation::*;
        let mut settings = test_settings();
        settings.transchr_rearrange = true;
        let lib = test_library();

        let mut read = test_read("r1", 0, 1000, false, 0, 3500, 2500, NormalFr);
        let c = classify_read(&mut read, &lib, &settings);
        assert!(matches!(c.disposition, Disposition::Drop));

        let mut read = test_read("r1", 0, 1000, false, 2, 3500, 0, Ctx);
        let c = classify_read(&mut read, &lib, &settings);
        assert!(matches!(c.disposition, Disposition::Discordant));
    }

    #[test]
    fn test_max_sd_spares_ctx() {
        use PairOrientation::*;
        let mut settings = test_settings();
        settings.max_sd = 1000;
        let lib = test_library();

        let mut read = test_read("r1", 0, 1000, false, 0, 5000000, 5000000, NormalFr);
        let c = classify_read(&mut read, &lib, &settings);
        assert!(matches!(c.disposition, Disposition::Drop));

        let mut read = test_read("r1", 0, 1000, false, 2, 5000000, 0, Ctx);
        let c = classify_read(&mut read, &lib, &settings);
        assert!(matches!(c.disposition, Disposition::Discordant));
    }
}
