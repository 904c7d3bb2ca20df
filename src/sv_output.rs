use std::io::Write;

use crate::chrom_list::ChromList;
use crate::cli::Settings;
use crate::library_config::ScanConfig;
use crate::sv_candidate::SvCall;

/// Column header line, written once before the first record
///
pub fn write_header(
    writer: &mut impl Write,
    settings: &Settings,
    config: &ScanConfig,
) -> std::io::Result<()> {
    write!(
        writer,
        "#Chr1\tPos1\tOrientation1\tChr2\tPos2\tOrientation2\tType\tSize\tScore\tnum_Reads\tnum_Reads_lib"
    )?;
    if settings.print_af {
        write!(writer, "\tAllele_frequency")?;
    }
    if !settings.cn_by_library {
        for bam_file in config.bam_files() {
            write!(writer, "\t{bam_file}")?;
        }
    }
    writeln!(writer)
}

/// Format one SV record as a tab-separated line
///
/// This is the 1-based output boundary: internal coordinates are converted here.
///
pub fn format_sv_record(call: &SvCall, chrom_list: &ChromList, settings: &Settings) -> String {
    use std::fmt::Write;

    let mut line = String::new();
    write!(
        line,
        "{}\t{}\t{}+{}-\t{}\t{}\t{}+{}-\t{}\t{}\t{}\t{}\t{}",
        chrom_list.label(call.chr[0]),
        call.pos[0] + 1,
        call.fwd_read_count[0],
        call.rev_read_count[0],
        chrom_list.label(call.chr[1]),
        call.pos[1] + 1,
        call.fwd_read_count[1],
        call.rev_read_count[1],
        call.sv_type,
        call.size,
        call.phred_q,
        call.num_pairs,
        call.sptype,
    )
    .unwrap();

    if settings.print_af {
        write!(line, "\t{:.2}", call.allele_frequency).unwrap();
    }

    if let Some(per_bam_copy_number) = &call.per_bam_copy_number {
        for copy_number in per_bam_copy_number.iter() {
            match copy_number {
                Some(x) => write!(line, "\t{x:.2}").unwrap(),
                None => write!(line, "\tNA").unwrap(),
            }
        }
    }

    line
}

pub fn write_sv_record(
    writer: &mut impl Write,
    call: &SvCall,
    chrom_list: &ChromList,
    settings: &Settings,
) -> std::io::Result<()> {
    writeln!(writer, "{}", format_sv_record(call, chrom_list, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_utils::test_settings;
    use crate::read_info::PairOrientation;

    fn test_call() -> SvCall {
        SvCall {
            chr: [0, 0],
            pos: [1545, 3000],
            fwd_read_count: [10, 0],
            rev_read_count: [0, 10],
            sv_type: "DEL".to_string(),
            size: 1500,
            phred_q: 99,
            num_pairs: 10,
            sptype: "a.bam|20".to_string(),
            allele_frequency: 0.5,
            per_bam_copy_number: Some(vec![Some(1.2345), None]),
            flag: PairOrientation::FrBigInsert,
            support_reads: Vec::new(),
        }
    }

    #[test]
    fn test_record_is_one_based_with_strand_counts() {
        let chrom_list = ChromList::from_labels(&["chr1", "chr2"]);
        let settings = test_settings();
        let line = format_sv_record(&test_call(), &chrom_list, &settings);
        assert_eq!(
            line,
            "chr1\t1546\t10+0-\tchr1\t3001\t0+10-\tDEL\t1500\t99\t10\ta.bam|20\t1.23\tNA"
        );
    }

    #[test]
    fn test_allele_frequency_column_is_optional() {
        let chrom_list = ChromList::from_labels(&["chr1"]);
        let mut settings = test_settings();
        settings.print_af = true;
        let mut call = test_call();
        call.per_bam_copy_number = None;
        let line = format_sv_record(&call, &chrom_list, &settings);
        assert!(line.ends_with("a.bam|20\t0.50"));
    }
}
