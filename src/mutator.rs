//!
//! Mutation model parameters
//!
//! The emitted DNA is corrupted by substitutions (transition/transversion
//! biased), deletions (affine: open/extend/end) and tandem duplications
//! that re-emit the last `k` bases, `k` drawn from `len_prob`.
//!
use crate::prob::Prob;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutatorParams {
    /// no gap opens at this emission
    pub p_no_gap: Prob,
    pub p_del_open: Prob,
    pub p_del_ext: Prob,
    pub p_del_end: Prob,
    /// a tandem duplication starts at this emission
    pub p_tan_dup: Prob,
    /// substitution matrix, indexed `[emitted][observed]`
    pub p_sub: [[Prob; 4]; 4],
    /// pmf over duplication lengths; index `k` is length `k+1`
    #[serde(default)]
    pub len_prob: Vec<Prob>,
    /// start and end the path at any machine state
    #[serde(default)]
    pub local: bool,
}

impl MutatorParams {
    pub fn new(
        p_del_open: f64,
        p_del_ext: f64,
        p_tan_dup: f64,
        p_transition: f64,
        p_transversion: f64,
        len_prob: Vec<f64>,
        local: bool,
    ) -> MutatorParams {
        let p_match = 1.0 - p_transition - 2.0 * p_transversion;
        let mut p_sub = [[Prob::zero(); 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                // transitions exchange A<->G and C<->T
                p_sub[i][j] = Prob::from_prob(if i == j {
                    p_match
                } else if j == (i ^ 2) {
                    p_transition
                } else {
                    p_transversion
                });
            }
        }
        MutatorParams {
            p_no_gap: Prob::from_prob(1.0 - p_del_open - p_tan_dup),
            p_del_open: Prob::from_prob(p_del_open),
            p_del_ext: Prob::from_prob(p_del_ext),
            p_del_end: Prob::from_prob(1.0 - p_del_ext),
            p_tan_dup: Prob::from_prob(p_tan_dup),
            p_sub,
            len_prob: len_prob.into_iter().map(Prob::from_prob).collect(),
            local,
        }
    }

    /// uniform error rate profile with a flat duplication length pmf
    pub fn uniform(p: f64, max_dup_len: usize) -> MutatorParams {
        let len_prob = if max_dup_len > 0 {
            vec![1.0 / max_dup_len as f64; max_dup_len]
        } else {
            Vec::new()
        };
        MutatorParams::new(p, p, p, p / 3.0, p / 3.0, len_prob, false)
    }

    /// error-free model: every emission survives unchanged
    pub fn zero_error() -> MutatorParams {
        MutatorParams::new(0.0, 0.0, 0.0, 0.0, 0.0, Vec::new(), false)
    }

    /// upper bound on duplication-run length
    pub fn max_dup_len(&self) -> usize {
        self.len_prob.len()
    }

    pub fn from_json(text: &str) -> serde_json::Result<MutatorParams> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for MutatorParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "p_no_gap: {}", self.p_no_gap)?;
        writeln!(f, "p_del_open: {}", self.p_del_open)?;
        writeln!(f, "p_del_ext: {}", self.p_del_ext)?;
        writeln!(f, "p_del_end: {}", self.p_del_end)?;
        writeln!(f, "p_tan_dup: {}", self.p_tan_dup)?;
        for (k, p) in self.len_prob.iter().enumerate() {
            writeln!(f, "len_prob[{}]: {}", k + 1, p)?;
        }
        writeln!(f, "local: {}", self.local)
    }
}
