//!
//! Joint Viterbi decoding over transducer states and mutator states
//!
//! # Overview of calculation
//!
//! x = x[0],...,x[L-1] : observed DNA bases
//!
//! For every observed position `p`, machine state `s` and mutator layer,
//! the matrix stores the best log-probability of a path that consumes
//! x[0..p] and sits in that joint state:
//!
//! ```text
//! S[s][p]    match-or-substitute layer
//!  = max(  (emit)      S[s'][p-1] + score(s'->s) + noGap + sub[base(s'->s)][x[p-1]]
//!          (null)      S[s'][p]   + score(s'->s)
//!          (del end)   D[s][p]    + delEnd
//!          (dup exit)  T[s][p-1][0] + sub[ctx(s, 0)][x[p-1]]  )
//!
//! D[s][p]    deletion-in-progress layer (consumes machine emissions,
//!            not observed positions)
//!  = max(  (emit)      max(D[s'][p] + delExtend, S[s'][p] + delOpen) + score(s'->s)
//!          (null)      D[s'][p]   + score(s'->s)  )
//!
//! T[s][p][k] k+1 bases into a tandem-duplicate run re-emitting the left
//!            context of s
//!  = max(  (shift)     T[s][p-1][k+1] + sub[ctx(s, k+1)][x[p-1]]
//!          (entry)     S[s][p] + tanDup + len[k]  )
//! ```
//!
//! where `ctx(s, k)` is the k-th most recently emitted base recorded in the
//! left context of `s`. Null transitions form chains that are resolved by a
//! per-row worklist relaxation (see [`matrix`]); the final score is
//! `S[end][L]` in global mode and `max_s S[s][L]` in local mode.
//!
pub mod decode;
pub mod input_model;
pub mod matrix;
pub mod scores;
pub mod traceback;

pub use decode::decode_records;
pub use input_model::InputModel;
pub use matrix::ViterbiMatrix;
pub use traceback::MutState;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Machine(#[from] crate::machine::MachineError),
    #[error("invalid base '{base}' at position {pos} of observed sequence")]
    InvalidBase { pos: usize, base: char },
    #[error(
        "traceback failure at ({state},{pos},{mut_state}): computed traceback score ({computed}) \
         didn't match stored value in matrix ({stored})"
    )]
    TracebackInvariant {
        state: String,
        pos: usize,
        mut_state: String,
        computed: f64,
        stored: f64,
    },
    #[error("traceback failure at ({state},{pos},{mut_state}): couldn't find source state")]
    TracebackNoSource {
        state: String,
        pos: usize,
        mut_state: String,
    },
}
