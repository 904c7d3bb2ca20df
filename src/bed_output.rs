use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use camino::Utf8Path;
use unwrap::unwrap;

use crate::chrom_list::ChromList;
use crate::library_config::ScanConfig;
use crate::sv_candidate::SvCall;

static PROG_NAME: &str = env!("CARGO_PKG_NAME");

/// Append one track of supporting reads for an emitted SV
///
/// Note the feature end is `pos - query_length - 1`, a negative span consumed as-is by the
/// downstream assembly tooling; kept bit-compatible.
///
pub fn append_sv_track(
    filename: &Utf8Path,
    call: &SvCall,
    chrom_list: &ChromList,
    config: &ScanConfig,
) {
    let file = unwrap!(
        OpenOptions::new().create(true).append(true).open(filename),
        "Unable to open BED output file: '{filename}'"
    );
    let mut writer = BufWriter::new(file);
    let result = write_sv_track(&mut writer, call, chrom_list, config);
    unwrap!(result, "Failed writing to BED output file: '{filename}'");
}

fn write_sv_track(
    writer: &mut impl Write,
    call: &SvCall,
    chrom_list: &ChromList,
    config: &ScanConfig,
) -> std::io::Result<()> {
    let chrom = chrom_list.label(call.chr[0]);
    let pos1 = call.pos[0] + 1;
    let track_name = format!("{}_{}_{}_{}", chrom, pos1, call.sv_type, call.size);
    writeln!(
        writer,
        "track name={track_name}\tdescription=\"{PROG_NAME} {chrom} {pos1} {} {}\"\tuseScore=0",
        call.sv_type, call.size
    )?;

    for read in call.support_reads.iter() {
        if read.seq.is_empty() || read.qual.is_empty() || read.flag != call.flag {
            continue;
        }
        let aln_end = read.pos - read.read_len - 1;
        let (strand, color) = if read.is_reverse {
            ('-', "255,0,0")
        } else {
            ('+', "0,0,255")
        };
        writeln!(
            writer,
            "chr{}\t{}\t{}\t{}|{}\t{}\t{}\t{}\t{}\t{}",
            chrom_list.label(read.tid),
            read.pos,
            aln_end,
            read.qname,
            config.libraries[read.lib_index].name,
            read.mapq as u32 * 10,
            strand,
            read.pos,
            aln_end,
            color,
        )?;
    }
    Ok(())
}
