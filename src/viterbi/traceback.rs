//!
//! Traceback over the filled Viterbi matrix
//!
//! Each cell's best predecessor is re-derived by replaying the candidate
//! transitions used in the fill and picking the one whose stored score plus
//! transition weight reproduces the cell's stored value. A mismatch beyond
//! a relative tolerance of 1e-6 means fill and traceback have diverged and
//! is fatal.
//!
use super::matrix::ViterbiMatrix;
use super::DecodeError;
use crate::common::{base_to_char, Base, State};
use log::{debug, trace, warn};

/// Mutator layer of a matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutState {
    /// match or substitute
    Match,
    /// deletion in progress
    Del,
    /// `k+1` bases into a tandem-duplicate run
    TanDup(usize),
}

impl MutState {
    pub(crate) fn layer(self) -> usize {
        match self {
            MutState::Match => 0,
            MutState::Del => 1,
            MutState::TanDup(k) => 2 + k,
        }
    }
}

impl std::fmt::Display for MutState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MutState::Match => write!(f, "S"),
            MutState::Del => write!(f, "D"),
            MutState::TanDup(k) => write!(f, "T{}", k + 1),
        }
    }
}

/// Running argmax over predecessor candidates of one cell.
struct Best {
    score: f64,
    state: State,
    pos: usize,
    mut_state: MutState,
    input: Option<char>,
    emit_base: Option<Base>,
    found: bool,
}

impl Best {
    fn new() -> Best {
        Best {
            score: f64::NEG_INFINITY,
            state: 0,
            pos: 0,
            mut_state: MutState::Match,
            input: None,
            emit_base: None,
            found: false,
        }
    }
    fn update(
        &mut self,
        matrix: &ViterbiMatrix,
        state: State,
        pos: usize,
        mut_state: MutState,
        trans_score: f64,
        input: Option<char>,
        emit_base: Option<Base>,
    ) {
        let score = matrix.get_cell(state, pos, mut_state) + trans_score;
        if score > self.score {
            *self = Best {
                score,
                state,
                pos,
                mut_state,
                input,
                emit_base,
                found: true,
            };
        }
    }
}

/// `computed` must reproduce `expected` within a relative 1e-6 (scores span
/// many orders of magnitude, so absolute tolerance would be wrong).
fn consistent(computed: f64, expected: f64) -> bool {
    let denom = if expected.abs() < 1e-6 { 1.0 } else { expected };
    ((computed - expected) / denom).abs() < 1e-6
}

impl<'a> ViterbiMatrix<'a> {
    ///
    /// Recover the best input symbol string. Returns an empty string (with
    /// a warning) when the machine admits no decoding of the observation.
    ///
    pub fn traceback(&self) -> Result<String, DecodeError> {
        if !(self.loglike() > f64::NEG_INFINITY) {
            warn!("no valid Viterbi decoding found");
            return Ok(String::new());
        }

        let mut trace: Vec<char> = Vec::new();

        // starting cell: the designated end state, or the best state in
        // local mode
        let mut start = Best::new();
        if self.local {
            for state in 0..self.n_states {
                start.update(self, state, self.seq_len, MutState::Match, 0.0, None, None);
            }
        } else {
            start.update(
                self,
                self.n_states - 1,
                self.seq_len,
                MutState::Match,
                0.0,
                None,
                None,
            );
        }
        if !start.found || !consistent(start.score, self.loglike) {
            return Err(DecodeError::TracebackInvariant {
                state: self.machine.states[self.n_states - 1].name.clone(),
                pos: self.seq_len,
                mut_state: MutState::Match.to_string(),
                computed: start.score,
                stored: self.loglike,
            });
        }
        let mut state = start.state;
        let mut pos = start.pos;
        let mut mut_state = start.mut_state;

        while state > 0 {
            trace!(
                "traceback at ({},{},{})",
                self.machine.states[state].name,
                pos,
                mut_state
            );
            let ss = &self.machine_scores.state_scores[state];
            let mdl = self.max_dup_len_at(state);
            let mut best = Best::new();

            match mut_state {
                MutState::Match => {
                    if pos > 0 {
                        let obs = self.seq[pos - 1];
                        for its in &ss.incoming_emit {
                            best.update(
                                self,
                                its.src,
                                pos - 1,
                                MutState::Match,
                                its.score + self.mutator_scores.no_gap
                                    + self.mutator_scores.sub[its.base][obs],
                                its.input,
                                Some(its.base),
                            );
                        }
                    }
                    for its in &ss.incoming_null {
                        best.update(self, its.src, pos, MutState::Match, its.score, its.input, None);
                    }
                    best.update(
                        self,
                        state,
                        pos,
                        MutState::Del,
                        self.mutator_scores.del_end,
                        None,
                        None,
                    );
                    if mdl > 0 && pos > 0 {
                        best.update(
                            self,
                            state,
                            pos - 1,
                            MutState::TanDup(0),
                            self.mutator_scores.sub[self.tan_dup_base(state, 0)][self.seq[pos - 1]],
                            None,
                            None,
                        );
                    }
                    if pos == 0 && self.local {
                        best.update(self, 0, 0, MutState::Match, 0.0, None, None);
                    }

                    if let Some(base) = best.emit_base {
                        if best.pos < pos && self.seq[pos - 1] != base {
                            debug!(
                                "substitution at {}: {} -> {}",
                                pos - 1,
                                base_to_char(base),
                                base_to_char(self.seq[pos - 1])
                            );
                        }
                    }
                }
                MutState::Del => {
                    for its in &ss.incoming_emit {
                        best.update(
                            self,
                            its.src,
                            pos,
                            MutState::Del,
                            its.score + self.mutator_scores.del_extend,
                            its.input,
                            Some(its.base),
                        );
                        best.update(
                            self,
                            its.src,
                            pos,
                            MutState::Match,
                            its.score + self.mutator_scores.del_open,
                            its.input,
                            Some(its.base),
                        );
                    }
                    for its in &ss.incoming_null {
                        best.update(self, its.src, pos, MutState::Del, its.score, its.input, None);
                    }

                    if let Some(base) = best.emit_base {
                        debug!(
                            "deletion between {} and {}: {}",
                            pos as i64 - 1,
                            pos,
                            base_to_char(base)
                        );
                    }
                }
                MutState::TanDup(dup_idx) => {
                    if dup_idx + 1 < mdl && pos > 0 {
                        best.update(
                            self,
                            state,
                            pos - 1,
                            MutState::TanDup(dup_idx + 1),
                            self.mutator_scores.sub[self.tan_dup_base(state, dup_idx + 1)]
                                [self.seq[pos - 1]],
                            None,
                            None,
                        );
                    }
                    best.update(
                        self,
                        state,
                        pos,
                        MutState::Match,
                        self.mutator_scores.tan_dup + self.mutator_scores.len[dup_idx],
                        None,
                        None,
                    );

                    if best.found && best.mut_state == MutState::Match {
                        let dupstr: String = (0..=dup_idx)
                            .rev()
                            .map(|i| base_to_char(self.tan_dup_base(state, i)))
                            .collect();
                        debug!("duplication at {}: {}", pos, dupstr);
                    }
                }
            }

            self.check_best(&best, state, pos, mut_state)?;
            state = best.state;
            pos = best.pos;
            mut_state = best.mut_state;
            if let Some(c) = best.input {
                trace.push(c);
            }
        }

        Ok(trace.iter().rev().collect())
    }

    fn check_best(
        &self,
        best: &Best,
        state: State,
        pos: usize,
        mut_state: MutState,
    ) -> Result<(), DecodeError> {
        let expected = self.get_cell(state, pos, mut_state);
        if !consistent(best.score, expected) {
            return Err(DecodeError::TracebackInvariant {
                state: self.machine.states[state].name.clone(),
                pos,
                mut_state: mut_state.to_string(),
                computed: best.score,
                stored: expected,
            });
        }
        if !best.found {
            return Err(DecodeError::TracebackNoSource {
                state: self.machine.states[state].name.clone(),
                pos,
                mut_state: mut_state.to_string(),
            });
        }
        Ok(())
    }
}
