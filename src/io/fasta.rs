//!
//! FASTA input/output
//!
use crate::common::Sequence;
use bio::io::fasta;
use std::io::{self, Write};
use std::path::Path;

/// A named sequence, observed DNA or decoded symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct FastaRecord {
    pub name: String,
    pub seq: Sequence,
}

pub fn read_fasta<P: AsRef<Path>>(path: P) -> io::Result<Vec<FastaRecord>> {
    let reader = fasta::Reader::new(std::fs::File::open(path)?);
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(FastaRecord {
            name: record.id().to_string(),
            seq: record.seq().to_vec(),
        });
    }
    Ok(records)
}

pub fn write_fasta<W: Write>(out: W, records: &[FastaRecord]) -> io::Result<()> {
    let mut writer = fasta::Writer::new(out);
    for record in records {
        writer.write(&record.name, None, &record.seq)?;
    }
    writer.flush()
}
