//!
//! Precomputed scoring tables
//!
//! `MachineScores` bakes the input model into per-state transition lists:
//! every kept transition is registered twice, as an incoming entry on its
//! destination (the row fill walks incoming lists) and as an outgoing entry
//! on its source (the null-chain saturation walks outgoing lists), each
//! partitioned into null and emitting transitions. `MutatorScores` is the
//! mutation model unwrapped into raw log scores.
//!
use super::input_model::InputModel;
use crate::common::{char_to_base, Base, State};
use crate::machine::{Machine, MachineError, WILD_CONTEXT};
use crate::mutator::MutatorParams;

/// Emitting transition viewed from its destination state.
#[derive(Debug, Clone)]
pub struct IncomingEmitScore {
    pub src: State,
    pub score: f64,
    pub input: Option<char>,
    pub base: Base,
}

/// Null transition viewed from its destination state.
#[derive(Debug, Clone)]
pub struct IncomingNullScore {
    pub src: State,
    pub score: f64,
    pub input: Option<char>,
}

/// Transition viewed from its source state.
#[derive(Debug, Clone)]
pub struct OutgoingTransScore {
    pub dest: State,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StateScores {
    /// left context as base indices, wildcards dropped
    pub left_context: Vec<Base>,
    pub incoming_emit: Vec<IncomingEmitScore>,
    pub incoming_null: Vec<IncomingNullScore>,
    pub outgoing_emit: Vec<OutgoingTransScore>,
    pub outgoing_null: Vec<OutgoingTransScore>,
}

#[derive(Debug, Clone)]
pub struct MachineScores {
    pub state_scores: Vec<StateScores>,
}

impl MachineScores {
    ///
    /// Keep a transition if its input is empty, it is an EOF transition, or
    /// its input has a probability in the model; drop all others. The score
    /// of a kept transition is the log-probability of its input symbol, or
    /// 0 for inputs outside the model.
    ///
    pub fn new(machine: &Machine, input_model: &InputModel) -> Result<MachineScores, MachineError> {
        machine.verify_contexts()?;
        for c in machine.output_alphabet().chars() {
            if char_to_base(c).is_none() {
                return Err(MachineError::InvalidOutput(c));
            }
        }

        let mut state_scores = vec![StateScores::default(); machine.n_states()];
        for (s, ms) in machine.states.iter().enumerate() {
            for lc in ms.left_context.chars() {
                if lc != WILD_CONTEXT {
                    let base = char_to_base(lc).ok_or(MachineError::InvalidContext(lc))?;
                    state_scores[s].left_context.push(base);
                }
            }
            for t in &ms.trans {
                let sym_prob = t.input.and_then(|c| input_model.sym_prob.get(&c));
                if !(t.input_empty() || t.is_eof() || sym_prob.is_some()) {
                    continue;
                }
                let score = sym_prob.map_or(0.0, |p| p.ln());
                match t.output {
                    None => {
                        state_scores[t.dest].incoming_null.push(IncomingNullScore {
                            src: s,
                            score,
                            input: t.input,
                        });
                        state_scores[s].outgoing_null.push(OutgoingTransScore {
                            dest: t.dest,
                            score,
                        });
                    }
                    Some(out) => {
                        let base = char_to_base(out).ok_or(MachineError::InvalidOutput(out))?;
                        state_scores[t.dest].incoming_emit.push(IncomingEmitScore {
                            src: s,
                            score,
                            input: t.input,
                            base,
                        });
                        state_scores[s].outgoing_emit.push(OutgoingTransScore {
                            dest: t.dest,
                            score,
                        });
                    }
                }
            }
        }
        Ok(MachineScores { state_scores })
    }
}

/// Mutation model as raw log scores.
#[derive(Debug, Clone)]
pub struct MutatorScores {
    pub no_gap: f64,
    pub del_open: f64,
    pub del_extend: f64,
    pub del_end: f64,
    pub tan_dup: f64,
    /// log pmf over duplication lengths
    pub len: Vec<f64>,
    /// substitution log matrix, `[emitted][observed]`
    pub sub: [[f64; 4]; 4],
}

impl MutatorScores {
    pub fn from_params(params: &MutatorParams) -> MutatorScores {
        let mut sub = [[f64::NEG_INFINITY; 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                sub[i][j] = params.p_sub[i][j].to_log_value();
            }
        }
        MutatorScores {
            no_gap: params.p_no_gap.to_log_value(),
            del_open: params.p_del_open.to_log_value(),
            del_extend: params.p_del_ext.to_log_value(),
            del_end: params.p_del_end.to_log_value(),
            tan_dup: params.p_tan_dup.to_log_value(),
            len: params.len_prob.iter().map(|p| p.to_log_value()).collect(),
            sub,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::mocks::*;
    use crate::machine::MachineTransition;
    use approx::assert_relative_eq;

    #[test]
    fn mirrored_registration() {
        let machine = mock_codeword();
        let model = InputModel::new(&machine, "01", 1.0, 1.0);
        let scores = MachineScores::new(&machine, &model).unwrap();
        // 0 -'0'/A-> 1 appears as outgoing on 0 and incoming on 1
        assert_eq!(scores.state_scores[0].outgoing_emit.len(), 1);
        assert_eq!(scores.state_scores[0].outgoing_emit[0].dest, 1);
        assert_eq!(scores.state_scores[1].incoming_emit.len(), 1);
        let its = &scores.state_scores[1].incoming_emit[0];
        assert_eq!(its.src, 0);
        assert_eq!(its.base, 0);
        assert_eq!(its.input, Some('0'));
        assert_relative_eq!(its.score, (0.5f64).ln());
        // wildcards are dropped from contexts
        assert_eq!(scores.state_scores[0].left_context, Vec::<usize>::new());
        assert_eq!(scores.state_scores[1].left_context, vec![0]);
        assert_eq!(scores.state_scores[4].left_context, vec![2, 3]);
    }

    #[test]
    fn unmodeled_inputs_are_dropped() {
        let machine = mock_codeword();
        // model only knows '0'; the '1' transitions disappear
        let model = InputModel::new(&machine, "0", 1.0, 1.0);
        let scores = MachineScores::new(&machine, &model).unwrap();
        assert_eq!(scores.state_scores[1].outgoing_emit.len(), 0);
        assert_eq!(scores.state_scores[2].incoming_emit.len(), 0);
        assert_relative_eq!(scores.state_scores[0].outgoing_emit[0].score, 0.0);
    }

    #[test]
    fn eof_transitions_survive_without_model_entry() {
        let machine = mock_framed();
        // '$' is absent from the model, but the EOF transition is kept
        // with score 0
        let model = InputModel::new(&machine, "x", 1.0, 1.0);
        let scores = MachineScores::new(&machine, &model).unwrap();
        assert_eq!(scores.state_scores[2].incoming_emit.len(), 1);
        let its = &scores.state_scores[2].incoming_emit[0];
        assert_eq!(its.input, Some('$'));
        assert_eq!(its.base, 3);
        assert_relative_eq!(its.score, 0.0);
        // an input symbol that is neither EOF nor modeled is dropped
        let empty = InputModel::new(&machine, "", 1.0, 1.0);
        let scores = MachineScores::new(&machine, &empty).unwrap();
        assert_eq!(scores.state_scores[1].incoming_emit.len(), 0);
        assert_eq!(scores.state_scores[2].incoming_emit.len(), 1);
    }

    #[test]
    fn non_dna_output_is_rejected() {
        let mut machine = mock_codeword();
        machine.states[4]
            .trans
            .push(MachineTransition::new(Some('0'), Some('Q'), 0));
        let model = InputModel::new(&machine, "01", 1.0, 1.0);
        assert!(matches!(
            MachineScores::new(&machine, &model),
            Err(MachineError::InvalidOutput('Q'))
        ));
    }

    #[test]
    fn mutator_scores_wrap() {
        let params = MutatorParams::uniform(0.01, 2);
        let scores = MutatorScores::from_params(&params);
        assert_relative_eq!(scores.del_open, (0.01f64).ln());
        assert_relative_eq!(scores.del_end, (0.99f64).ln());
        assert_relative_eq!(scores.no_gap, (0.98f64).ln());
        assert_relative_eq!(scores.len[0], (0.5f64).ln());
        assert_relative_eq!(scores.sub[0][0], (1.0f64 - 0.01).ln());
    }
}
