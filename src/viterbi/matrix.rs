//!
//! The Viterbi score tensor and its fill
//!
//! `cell[pos][state][layer]` holds the best log-probability of any path
//! consuming the first `pos` observed bases and sitting in `state` with the
//! given mutator layer (S = match/substitute, D = deletion in progress,
//! T(k) = k+1 bases into a tandem-duplicate run). The tensor is a flat
//! row-major vector with strides `[L+1, N, 2+maxDupLen]` so a row is
//! contiguous in memory.
//!
//! Each row is filled in three steps:
//!
//! 1. emit / null / dup-shift updates into the row from already-final
//!    cells, visiting states in null-edge topological order;
//! 2. saturation of the null subgraph coupled with the deletion layer, by
//!    worklist relaxation: emit edges feed D (delOpen/delExtend), D feeds S
//!    back through delEnd, and null edges propagate both, so improvements
//!    must be chased to a fixpoint rather than resolved by one toposort
//!    pass;
//! 3. duplication entry from the saturated S cells.
//!
use super::input_model::InputModel;
use super::scores::{MachineScores, MutatorScores};
use super::traceback::MutState;
use super::DecodeError;
use crate::common::{char_to_base, Base, State};
use crate::machine::Machine;
use crate::mutator::MutatorParams;
use log::{debug, trace};

#[derive(Debug)]
pub struct ViterbiMatrix<'a> {
    pub(crate) machine: &'a Machine,
    pub(crate) machine_scores: MachineScores,
    pub(crate) mutator_scores: MutatorScores,
    pub(crate) local: bool,
    pub(crate) state_order: Vec<State>,
    pub(crate) seq: Vec<Base>,
    pub(crate) seq_len: usize,
    pub(crate) n_states: usize,
    pub(crate) max_dup_len: usize,
    pub(crate) n_layers: usize,
    pub(crate) cell: Vec<f64>,
    pub(crate) loglike: f64,
}

impl<'a> ViterbiMatrix<'a> {
    ///
    /// Build the score tables for `machine` under `input_model` and
    /// `params`, then fill the matrix for the observed sequence.
    ///
    pub fn new(
        machine: &'a Machine,
        input_model: &InputModel,
        params: &MutatorParams,
        seq: &[u8],
    ) -> Result<ViterbiMatrix<'a>, DecodeError> {
        if machine.n_states() == 0 {
            return Err(crate::machine::MachineError::Empty.into());
        }
        let machine_scores = MachineScores::new(machine, input_model)?;
        let mutator_scores = MutatorScores::from_params(params);
        let state_order = machine.decoder_toposort(&input_model.input_alphabet)?;
        let seq: Vec<Base> = seq
            .iter()
            .enumerate()
            .map(|(pos, &c)| {
                char_to_base(c as char).ok_or(DecodeError::InvalidBase {
                    pos,
                    base: c as char,
                })
            })
            .collect::<Result<_, _>>()?;

        let n_states = machine.n_states();
        let seq_len = seq.len();
        let max_dup_len = machine.max_left_context().min(params.max_dup_len());
        let n_layers = 2 + max_dup_len;
        let mut matrix = ViterbiMatrix {
            machine,
            machine_scores,
            mutator_scores,
            local: params.local,
            state_order,
            seq,
            seq_len,
            n_states,
            max_dup_len,
            n_layers,
            cell: vec![f64::NEG_INFINITY; (seq_len + 1) * n_states * n_layers],
            loglike: f64::NEG_INFINITY,
        };
        matrix.fill();
        Ok(matrix)
    }

    /// Log-probability of the best decoding, `-inf` if none exists.
    pub fn loglike(&self) -> f64 {
        self.loglike
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    #[inline]
    fn idx(&self, pos: usize, state: State, layer: usize) -> usize {
        (pos * self.n_states + state) * self.n_layers + layer
    }

    pub fn s_cell(&self, state: State, pos: usize) -> f64 {
        self.cell[self.idx(pos, state, 0)]
    }

    pub fn d_cell(&self, state: State, pos: usize) -> f64 {
        self.cell[self.idx(pos, state, 1)]
    }

    pub fn t_cell(&self, state: State, pos: usize, dup_idx: usize) -> f64 {
        self.cell[self.idx(pos, state, 2 + dup_idx)]
    }

    pub(crate) fn get_cell(&self, state: State, pos: usize, mut_state: MutState) -> f64 {
        self.cell[self.idx(pos, state, mut_state.layer())]
    }

    /// Duplication depth available at a state: bounded by the mutation
    /// model and by the state's wildcard-free left context.
    pub(crate) fn max_dup_len_at(&self, state: State) -> usize {
        self.max_dup_len
            .min(self.machine_scores.state_scores[state].left_context.len())
    }

    /// The base re-emitted `dup_idx` steps before a duplication run closes:
    /// the run walks the left context from `dup_idx = len-1` down to 0.
    pub(crate) fn tan_dup_base(&self, state: State, dup_idx: usize) -> Base {
        let ctx = &self.machine_scores.state_scores[state].left_context;
        ctx[ctx.len() - 1 - dup_idx]
    }

    fn fill(&mut self) {
        debug!(
            "filling Viterbi matrix ({}*{} cells, {} layers)",
            self.seq_len + 1,
            self.n_states,
            self.n_layers
        );
        if self.local {
            for state in 0..self.n_states {
                let i = self.idx(0, state, 0);
                self.cell[i] = 0.0;
            }
        } else {
            let i = self.idx(0, 0, 0);
            self.cell[i] = 0.0;
        }

        for pos in 0..=self.seq_len {
            self.fill_row(pos);
            self.saturate_row(pos);
            if pos > 0 {
                self.enter_dups(pos);
            }
        }

        self.loglike = if self.local {
            (0..self.n_states)
                .map(|state| self.s_cell(state, self.seq_len))
                .fold(f64::NEG_INFINITY, f64::max)
        } else {
            self.s_cell(self.n_states - 1, self.seq_len)
        };
        trace!("Viterbi matrix:\n{}", self);
    }

    ///
    /// Step 1: updates into row `pos` from cells that are already final:
    /// emitting transitions from row `pos-1`, null transitions within the
    /// row (sources precede destinations in `state_order`, so their S cells
    /// are complete up to deletion coupling), and tandem-duplicate
    /// shift/exit from row `pos-1`.
    ///
    fn fill_row(&mut self, pos: usize) {
        let Self {
            cell,
            machine_scores,
            mutator_scores,
            state_order,
            seq,
            n_states,
            n_layers,
            max_dup_len,
            ..
        } = self;
        let (n, nl) = (*n_states, *n_layers);
        let idx = |pos: usize, state: State, layer: usize| (pos * n + state) * nl + layer;

        for &state in state_order.iter() {
            let ss = &machine_scores.state_scores[state];
            let mdl = (*max_dup_len).min(ss.left_context.len());

            if pos > 0 {
                let obs = seq[pos - 1];
                for its in &ss.incoming_emit {
                    let sc = cell[idx(pos - 1, its.src, 0)]
                        + its.score
                        + mutator_scores.no_gap
                        + mutator_scores.sub[its.base][obs];
                    if sc > cell[idx(pos, state, 0)] {
                        cell[idx(pos, state, 0)] = sc;
                    }
                }
            }

            for its in &ss.incoming_null {
                let sc = cell[idx(pos, its.src, 0)] + its.score;
                if sc > cell[idx(pos, state, 0)] {
                    cell[idx(pos, state, 0)] = sc;
                }
            }

            if mdl > 0 && pos > 0 {
                let obs = seq[pos - 1];
                let ctx = &ss.left_context;
                let last = ctx.len() - 1;

                let sc = cell[idx(pos - 1, state, 2)] + mutator_scores.sub[ctx[last]][obs];
                if sc > cell[idx(pos, state, 0)] {
                    cell[idx(pos, state, 0)] = sc;
                }

                for dup_idx in 0..mdl - 1 {
                    cell[idx(pos, state, 2 + dup_idx)] = cell[idx(pos - 1, state, 2 + dup_idx + 1)]
                        + mutator_scores.sub[ctx[last - (dup_idx + 1)]][obs];
                }
            }
        }
    }

    ///
    /// Step 2: relax the null subgraph together with the deletion layer to
    /// a fixpoint. Popping a state folds its D cell into S through delEnd,
    /// then pushes improvements outward: emit edges open or extend a
    /// deletion in the destination's D cell, null edges carry both D and S
    /// forward. The worklist is seeded in topological order, so on an
    /// acyclic null subgraph every state pops exactly once per row.
    ///
    pub(crate) fn saturate_row(&mut self, pos: usize) {
        let Self {
            cell,
            machine_scores,
            mutator_scores,
            state_order,
            n_states,
            n_layers,
            ..
        } = self;
        let (n, nl) = (*n_states, *n_layers);
        let idx = |pos: usize, state: State, layer: usize| (pos * n + state) * nl + layer;

        let mut push_states: Vec<State> = state_order.iter().rev().copied().collect();
        let mut on_stack = vec![true; n];
        while let Some(state) = push_states.pop() {
            on_stack[state] = false;
            let ss = &machine_scores.state_scores[state];

            let dsrc = cell[idx(pos, state, 1)];
            let ssrc = cell[idx(pos, state, 0)].max(dsrc + mutator_scores.del_end);
            cell[idx(pos, state, 0)] = ssrc;

            for ots in &ss.outgoing_emit {
                let dsc = (dsrc + mutator_scores.del_extend).max(ssrc + mutator_scores.del_open)
                    + ots.score;
                if dsc > cell[idx(pos, ots.dest, 1)] {
                    cell[idx(pos, ots.dest, 1)] = dsc;
                    if !on_stack[ots.dest] {
                        push_states.push(ots.dest);
                        on_stack[ots.dest] = true;
                    }
                }
            }

            for ots in &ss.outgoing_null {
                let mut push = false;

                let dsc = dsrc + ots.score;
                if dsc > cell[idx(pos, ots.dest, 1)] {
                    cell[idx(pos, ots.dest, 1)] = dsc;
                    push = true;
                }

                let ssc = ssrc + ots.score;
                if ssc > cell[idx(pos, ots.dest, 0)] {
                    cell[idx(pos, ots.dest, 0)] = ssc;
                    push = true;
                }

                if push && !on_stack[ots.dest] {
                    push_states.push(ots.dest);
                    on_stack[ots.dest] = true;
                }
            }
        }
    }

    /// Step 3: open duplication runs from the saturated S cells.
    fn enter_dups(&mut self, pos: usize) {
        let Self {
            cell,
            machine_scores,
            mutator_scores,
            n_states,
            n_layers,
            max_dup_len,
            ..
        } = self;
        let (n, nl) = (*n_states, *n_layers);
        let idx = |pos: usize, state: State, layer: usize| (pos * n + state) * nl + layer;

        for state in 0..n {
            let ss = &machine_scores.state_scores[state];
            let mdl = (*max_dup_len).min(ss.left_context.len());
            for dup_idx in 0..mdl {
                let sc = cell[idx(pos, state, 0)]
                    + mutator_scores.tan_dup
                    + mutator_scores.len[dup_idx];
                if sc > cell[idx(pos, state, 2 + dup_idx)] {
                    cell[idx(pos, state, 2 + dup_idx)] = sc;
                }
            }
        }
    }
}

impl<'a> std::fmt::Display for ViterbiMatrix<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let sw = self.machine.state_name_width();
        for pos in 0..=self.seq_len {
            for state in 0..self.n_states {
                write!(
                    f,
                    "{:4} {:sw$} {:10.6}(S) {:10.6}(D)",
                    pos,
                    self.machine.states[state].name,
                    self.s_cell(state, pos),
                    self.d_cell(state, pos),
                )?;
                for dup_idx in 0..self.max_dup_len {
                    write!(f, " {:10.6}(T{})", self.t_cell(state, pos, dup_idx), dup_idx + 1)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::mocks::*;
    use crate::mutator::MutatorParams;
    use crate::prob::Prob;
    use approx::assert_abs_diff_eq;

    fn sub_identity() -> [[Prob; 4]; 4] {
        let mut sub = [[Prob::zero(); 4]; 4];
        for i in 0..4 {
            sub[i][i] = Prob::one();
        }
        sub
    }

    fn no_mutation_params() -> MutatorParams {
        MutatorParams {
            p_no_gap: Prob::one(),
            p_del_open: Prob::zero(),
            p_del_ext: Prob::zero(),
            p_del_end: Prob::one(),
            p_tan_dup: Prob::zero(),
            p_sub: sub_identity(),
            len_prob: Vec::new(),
            local: false,
        }
    }

    #[test]
    fn identity_fill() {
        let machine = mock_identity();
        let model = InputModel::new(&machine, "A", 1.0, 1.0);
        let params = no_mutation_params();
        let matrix = ViterbiMatrix::new(&machine, &model, &params, b"AAAA").unwrap();
        // every prefix of the observation is explained exactly
        for pos in 1..=4 {
            assert_abs_diff_eq!(matrix.s_cell(1, pos), 0.0);
        }
        assert_abs_diff_eq!(matrix.loglike(), 0.0);
        // deletions are disabled, so the D layer stays empty
        for pos in 0..=4 {
            assert_eq!(matrix.d_cell(1, pos), f64::NEG_INFINITY);
        }
    }

    #[test]
    fn substitution_fill() {
        let machine = mock_identity();
        let model = InputModel::new(&machine, "A", 1.0, 1.0);
        let mut params = no_mutation_params();
        params.p_sub[0][1] = Prob::from_prob(0.1);
        let matrix = ViterbiMatrix::new(&machine, &model, &params, b"AACA").unwrap();
        assert_abs_diff_eq!(matrix.loglike(), (0.1f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn deletion_fill() {
        let machine = mock_chain();
        let model = InputModel::new(&machine, "AB", 1.0, 1.0);
        let mut params = no_mutation_params();
        params.p_del_open = Prob::from_prob(0.01);
        params.p_del_ext = Prob::from_prob(0.5);
        params.p_del_end = Prob::one();
        let matrix = ViterbiMatrix::new(&machine, &model, &params, b"A").unwrap();
        let expected = 2.0 * (0.5f64).ln() + (0.01f64).ln();
        assert_abs_diff_eq!(matrix.loglike(), expected, epsilon = 1e-12);
        // the end state's S cell was reached by closing the deletion
        assert_abs_diff_eq!(matrix.d_cell(2, 1), expected, epsilon = 1e-12);
    }

    #[test]
    fn resaturation_is_a_noop() {
        let machine = mock_codeword();
        let model = InputModel::new(&machine, "01", 1.0, 1.0);
        let params = MutatorParams::uniform(0.05, 2);
        let mut matrix = ViterbiMatrix::new(&machine, &model, &params, b"ACGTGT").unwrap();
        let before = matrix.cell.clone();
        for pos in 0..=matrix.seq_len {
            matrix.saturate_row(pos);
        }
        assert_eq!(matrix.cell, before);
    }

    #[test]
    fn invalid_base_is_rejected() {
        let machine = mock_identity();
        let model = InputModel::new(&machine, "A", 1.0, 1.0);
        let params = no_mutation_params();
        let err = ViterbiMatrix::new(&machine, &model, &params, b"AANA").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidBase { pos: 2, base: 'N' }
        ));
    }
}
