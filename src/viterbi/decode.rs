//!
//! Decode driver
//!
use super::input_model::InputModel;
use super::matrix::ViterbiMatrix;
use super::DecodeError;
use crate::io::fasta::FastaRecord;
use crate::machine::Machine;
use crate::mutator::MutatorParams;
use log::debug;
use rayon::prelude::*;

///
/// Decode each observed DNA record back into its most likely input symbol
/// string. Records are independent and decoded in parallel; output order
/// equals input order. A record with no valid decoding yields an empty
/// sequence (and a warning from the traceback).
///
pub fn decode_records(
    machine: &Machine,
    params: &MutatorParams,
    records: &[FastaRecord],
) -> Result<Vec<FastaRecord>, DecodeError> {
    let input_alphabet = machine.input_alphabet(true, true, true);
    // Somewhat arbitrary penalty for control characters. Rationale:
    // maxDupLen is typically half of codeword length; paths to control
    // chars are typically <1.5*codeword length.
    let control_weight = 4f64.powi(-4 * params.max_dup_len() as i32);
    let input_model = InputModel::new(machine, &input_alphabet, 1.0, control_weight);
    debug!("input model for Viterbi decoding:\n{}", input_model);

    records
        .par_iter()
        .map(|record| {
            let matrix = ViterbiMatrix::new(machine, &input_model, params, &record.seq)?;
            let decoded = matrix.traceback()?;
            debug!(
                "decoded {} ({} bases): loglike {}",
                record.name,
                record.seq.len(),
                matrix.loglike()
            );
            Ok(FastaRecord {
                name: record.name.clone(),
                seq: decoded.into_bytes(),
            })
        })
        .collect()
}
