use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use unwrap::unwrap;

use crate::library_config::ScanConfig;
use crate::read_info::{PairOrientation, ReadInfo};

/// Writes supporting reads of emitted SVs out as per-library FASTQ mate files
///
/// File handles are opened in append mode on first use and cached for the rest of the run.
///
pub struct FastqWriter {
    prefix: Utf8PathBuf,
    files: HashMap<Utf8PathBuf, BufWriter<File>>,
}

impl FastqWriter {
    pub fn new(prefix: &Utf8Path) -> Self {
        Self {
            prefix: prefix.to_owned(),
            files: HashMap::new(),
        }
    }

    /// Dump the supporting pairs of one SV, restricted to its dominant category
    ///
    /// The first sighting of a query name goes to the library's file 2 and the second to file 1;
    /// legacy assignment, kept as-is for downstream compatibility.
    ///
    pub fn dump_support_reads(
        &mut self,
        flag: PairOrientation,
        support_reads: &[ReadInfo],
        config: &ScanConfig,
    ) {
        let mut seen = HashSet::new();
        for read in support_reads.iter() {
            if read.seq.is_empty() || read.qual.is_empty() || read.flag != flag {
                continue;
            }
            let suffix = if seen.contains(read.qname.as_str()) {
                "1"
            } else {
                "2"
            };
            let lib_name = &config.libraries[read.lib_index].name;
            let filename = self.prefix.join(format!("{lib_name}.{suffix}.fastq"));
            let writer = self.files.entry(filename.clone()).or_insert_with(|| {
                let file = unwrap!(
                    OpenOptions::new().create(true).append(true).open(&filename),
                    "Unable to open FASTQ output file: '{filename}'"
                );
                BufWriter::new(file)
            });
            unwrap!(
                write_fastq_record(writer, read),
                "Failed writing to FASTQ output file: '{filename}'"
            );
            seen.insert(read.qname.clone());
        }
    }

    pub fn flush(&mut self) {
        for (filename, writer) in self.files.iter_mut() {
            unwrap!(
                writer.flush(),
                "Failed flushing FASTQ output file: '{filename}'"
            );
        }
    }
}

fn write_fastq_record(writer: &mut impl Write, read: &ReadInfo) -> std::io::Result<()> {
    writeln!(writer, "@{}", read.qname)?;
    writer.write_all(&read.seq)?;
    writeln!(writer)?;
    writeln!(writer, "+")?;
    for &q in read.qual.iter() {
        writer.write_all(&[q + 33])?;
    }
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_info::test_utils::test_read;

    #[test]
    fn test_fastq_record_encodes_phred() {
        let read = test_read("r0", 0, 50, false, 0, 2550, 2500, PairOrientation::FrBigInsert);
        let mut out = Vec::new();
        write_fastq_record(&mut out, &read).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "@r0\nACGT\n+\n????\n");
    }
}
