//!
//! Transducer model: states, transitions, left contexts
//!
//! A `Machine` maps input symbols to DNA bases. Each transition carries an
//! optional input symbol and an optional output base; a transition with no
//! output is *null* (the observed position does not advance during
//! decoding), one with no input consumes nothing from the decoded string.
//! Each state carries a fixed-length *left context*, the suffix of bases
//! emitted on every path into it, which defines the content of tandem
//! duplications.
//!
pub mod mocks;

use crate::common::{is_dna_base, State};
use itertools::Itertools;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wildcard marker allowed in left contexts
pub const WILD_CONTEXT: char = '*';

/// Reserved input symbol marking end-of-frame transitions
pub const EOF_SYMBOL: char = '$';

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("machine has no states")]
    Empty,
    #[error("not a DNA-outputting machine: output symbol '{0}'")]
    InvalidOutput(char),
    #[error("invalid left-context symbol '{0}'")]
    InvalidContext(char),
    #[error("inconsistent left context on {src} -> {dest}: expected '{expected}', found '{found}'")]
    InconsistentContext {
        src: String,
        dest: String,
        expected: char,
        found: char,
    },
    #[error("transition from {src} points at missing state {dest}")]
    DanglingTransition { src: String, dest: State },
    #[error("null-transition subgraph contains a cycle")]
    NullCycle,
    #[error("machine is not deterministic at state {0}")]
    Nondeterministic(String),
    #[error("no transition for input symbol '{symbol}' at state {state}")]
    UnknownSymbol { symbol: char, state: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineTransition {
    /// input symbol; `None` consumes no symbol
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub input: Option<char>,
    /// output base; `None` emits nothing
    #[serde(rename = "out", default, skip_serializing_if = "Option::is_none")]
    pub output: Option<char>,
    /// destination state
    #[serde(rename = "to")]
    pub dest: State,
}

impl MachineTransition {
    pub fn new(input: Option<char>, output: Option<char>, dest: State) -> Self {
        MachineTransition {
            input,
            output,
            dest,
        }
    }
    pub fn input_empty(&self) -> bool {
        self.input.is_none()
    }
    pub fn output_empty(&self) -> bool {
        self.output.is_none()
    }
    pub fn is_eof(&self) -> bool {
        self.input == Some(EOF_SYMBOL)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    #[serde(rename = "n")]
    pub name: String,
    /// bases emitted on every path into this state (wildcards allowed)
    #[serde(rename = "context", default)]
    pub left_context: String,
    #[serde(default)]
    pub trans: Vec<MachineTransition>,
}

///
/// Finite-state transducer from input symbols to DNA bases.
///
/// State 0 is the designated start; state `n_states() - 1` is the
/// designated end in global decoding mode.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    #[serde(rename = "state")]
    pub states: Vec<MachineState>,
    /// input symbols acting as control markers (start/end-of-frame etc.)
    #[serde(default)]
    pub controls: String,
}

impl Machine {
    pub fn n_states(&self) -> usize {
        self.states.len()
    }

    pub fn from_json(text: &str) -> serde_json::Result<Machine> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Control symbols are the declared markers plus the reserved EOF symbol.
    pub fn is_control(&self, c: char) -> bool {
        c == EOF_SYMBOL || self.controls.contains(c)
    }

    ///
    /// Ordered string of distinct input symbols, filtered by class:
    /// ordinary payload symbols (`relaxed`), control markers (`control`)
    /// and the EOF symbol (`eof`).
    ///
    pub fn input_alphabet(&self, relaxed: bool, control: bool, eof: bool) -> String {
        self.states
            .iter()
            .flat_map(|s| s.trans.iter())
            .filter_map(|t| t.input)
            .unique()
            .filter(|&c| {
                if c == EOF_SYMBOL {
                    eof
                } else if self.controls.contains(c) {
                    control
                } else {
                    relaxed
                }
            })
            .collect()
    }

    /// Ordered string of distinct output symbols.
    pub fn output_alphabet(&self) -> String {
        self.states
            .iter()
            .flat_map(|s| s.trans.iter())
            .filter_map(|t| t.output)
            .unique()
            .collect()
    }

    /// Longest left context over all states, wildcards included.
    pub fn max_left_context(&self) -> usize {
        self.states
            .iter()
            .map(|s| s.left_context.chars().count())
            .max()
            .unwrap_or(0)
    }

    /// Widest state name, for matrix dumps.
    pub fn state_name_width(&self) -> usize {
        self.states.iter().map(|s| s.name.len()).max().unwrap_or(0)
    }

    ///
    /// Check that left contexts are internally consistent: for every
    /// transition, the source context extended by the emitted base must
    /// match the destination context suffix-for-suffix. Wildcards match
    /// anything; positions beyond the source context are unconstrained.
    ///
    pub fn verify_contexts(&self) -> Result<(), MachineError> {
        for ms in &self.states {
            for c in ms.left_context.chars() {
                if c != WILD_CONTEXT && !is_dna_base(c) {
                    return Err(MachineError::InvalidContext(c));
                }
            }
            for t in &ms.trans {
                if t.dest >= self.n_states() {
                    return Err(MachineError::DanglingTransition {
                        src: ms.name.clone(),
                        dest: t.dest,
                    });
                }
            }
        }
        for ms in &self.states {
            for t in &ms.trans {
                let dest = &self.states[t.dest];
                let mut src_ctx: Vec<char> = ms.left_context.chars().collect();
                if let Some(out) = t.output {
                    src_ctx.push(out);
                }
                let dest_ctx: Vec<char> = dest.left_context.chars().collect();
                for (i, &dc) in dest_ctx.iter().rev().enumerate() {
                    match src_ctx.iter().rev().nth(i) {
                        Some(&sc) if sc != WILD_CONTEXT && dc != WILD_CONTEXT && sc != dc => {
                            return Err(MachineError::InconsistentContext {
                                src: ms.name.clone(),
                                dest: dest.name.clone(),
                                expected: sc,
                                found: dc,
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    ///
    /// Topological order of states over null-output transitions whose input
    /// is empty or present in `input_alphabet`. The decoder relies on this
    /// order to finalize null predecessors before their successors within a
    /// matrix row. Fails if the null subgraph is cyclic.
    ///
    pub fn decoder_toposort(&self, input_alphabet: &str) -> Result<Vec<State>, MachineError> {
        let mut graph: DiGraph<(), ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.n_states()).map(|_| graph.add_node(())).collect();
        for (s, ms) in self.states.iter().enumerate() {
            for t in &ms.trans {
                if t.output_empty() && t.input.map_or(true, |c| input_alphabet.contains(c)) {
                    graph.add_edge(nodes[s], nodes[t.dest], ());
                }
            }
        }
        toposort(&graph, None)
            .map(|order| order.into_iter().map(|n| n.index()).collect())
            .map_err(|_| MachineError::NullCycle)
    }

    ///
    /// Run the transducer forward over a symbol string (the encoding
    /// direction). At each step the unique transition consuming the next
    /// input symbol is taken if present, otherwise the unique null-input
    /// transition; after the input is exhausted, an EOF transition and any
    /// remaining unique null-input transitions are flushed.
    ///
    /// Requires a deterministic machine; ambiguity is an error.
    ///
    pub fn transduce(&self, input: &str) -> Result<String, MachineError> {
        let mut state: State = 0;
        let mut out = String::new();
        let emit = |t: &MachineTransition, out: &mut String| {
            if let Some(b) = t.output {
                out.push(b);
            }
            t.dest
        };
        for sym in input.chars() {
            let mut silent = 0;
            loop {
                let ms = &self.states[state];
                let matches: Vec<&MachineTransition> =
                    ms.trans.iter().filter(|t| t.input == Some(sym)).collect();
                match matches.len() {
                    1 => {
                        state = emit(matches[0], &mut out);
                        break;
                    }
                    0 => {
                        let nulls: Vec<&MachineTransition> =
                            ms.trans.iter().filter(|t| t.input_empty()).collect();
                        match nulls.len() {
                            1 => state = emit(nulls[0], &mut out),
                            0 => {
                                return Err(MachineError::UnknownSymbol {
                                    symbol: sym,
                                    state: ms.name.clone(),
                                })
                            }
                            _ => return Err(MachineError::Nondeterministic(ms.name.clone())),
                        }
                        silent += 1;
                        if silent > self.n_states() {
                            return Err(MachineError::Nondeterministic(ms.name.clone()));
                        }
                    }
                    _ => return Err(MachineError::Nondeterministic(ms.name.clone())),
                }
            }
        }
        // flush: one EOF transition if present, then unique null-input moves
        let mut silent = 0;
        loop {
            let ms = &self.states[state];
            let flushable: Vec<&MachineTransition> = ms
                .trans
                .iter()
                .filter(|t| t.input_empty() || t.is_eof())
                .collect();
            match flushable.len() {
                0 => break,
                1 => state = emit(flushable[0], &mut out),
                _ => return Err(MachineError::Nondeterministic(ms.name.clone())),
            }
            silent += 1;
            if silent > self.n_states() {
                return Err(MachineError::Nondeterministic(ms.name.clone()));
            }
        }
        Ok(out)
    }
}

impl std::fmt::Display for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (i, ms) in self.states.iter().enumerate() {
            write!(f, "#{} {} [{}]", i, ms.name, ms.left_context)?;
            for t in &ms.trans {
                write!(
                    f,
                    " {}/{}->{}",
                    t.input.unwrap_or('-'),
                    t.output.unwrap_or('-'),
                    t.dest
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;

    #[test]
    fn alphabets_and_controls() {
        let m = mock_codeword();
        assert_eq!(m.input_alphabet(true, true, true), "01");
        assert_eq!(m.output_alphabet(), "ACGT");
        assert_eq!(m.max_left_context(), 2);
        assert!(!m.is_control('0'));
        assert!(m.is_control(EOF_SYMBOL));

        let m = mock_flanked_codeword();
        assert_eq!(m.input_alphabet(true, true, true), "nXYZ");
        assert_eq!(m.input_alphabet(true, false, false), "XYZ");
        assert!(m.is_control('n'));

        let m = mock_framed();
        assert_eq!(m.input_alphabet(true, true, true), "x$");
        assert_eq!(m.input_alphabet(true, true, false), "x");
        assert!(m.states[1].trans[1].is_eof());
        assert!(m.is_control(EOF_SYMBOL));
    }

    #[test]
    fn context_verification() {
        assert!(mock_codeword().verify_contexts().is_ok());

        let mut bad = mock_codeword();
        bad.states[2].left_context = "AG".to_string();
        assert!(matches!(
            bad.verify_contexts(),
            Err(MachineError::InconsistentContext { .. })
        ));

        let mut bad = mock_codeword();
        bad.states[1].left_context = "*N".to_string();
        assert!(matches!(
            bad.verify_contexts(),
            Err(MachineError::InvalidContext('N'))
        ));

        let mut bad = mock_codeword();
        bad.states[0].trans[0].dest = 9;
        assert!(matches!(
            bad.verify_contexts(),
            Err(MachineError::DanglingTransition { dest: 9, .. })
        ));
    }

    #[test]
    fn toposort_respects_null_edges() {
        let m = mock_flanked_codeword();
        let order = m.decoder_toposort(&m.input_alphabet(true, true, true)).unwrap();
        assert_eq!(order.len(), m.n_states());
        // null edges 3->4 and 3->5
        let rank: Vec<usize> = {
            let mut r = vec![0; m.n_states()];
            for (i, &s) in order.iter().enumerate() {
                r[s] = i;
            }
            r
        };
        assert!(rank[3] < rank[4]);
        assert!(rank[3] < rank[5]);
    }

    #[test]
    fn toposort_rejects_null_cycle() {
        let mut m = mock_flanked_codeword();
        // close a null cycle 4 -> 3
        m.states[4]
            .trans
            .push(MachineTransition::new(None, None, 3));
        assert!(matches!(
            m.decoder_toposort(&m.input_alphabet(true, true, true)),
            Err(MachineError::NullCycle)
        ));
    }

    #[test]
    fn transduce_codeword() {
        let m = mock_codeword();
        assert_eq!(m.transduce("0101").unwrap(), "ACGT");
        assert!(matches!(
            m.transduce("012"),
            Err(MachineError::UnknownSymbol { symbol: '2', .. })
        ));
    }

    #[test]
    fn transduce_flushes_eof() {
        let m = mock_framed();
        // the EOF transition fires after the input is exhausted
        assert_eq!(m.transduce("x").unwrap(), "AT");
        assert_eq!(m.transduce("xxx").unwrap(), "AAAT");
        // nothing to flush at the start state
        assert_eq!(m.transduce("").unwrap(), "");
    }

    #[test]
    fn json_roundtrip() {
        let m = mock_codeword();
        let text = m.to_json().unwrap();
        let m2 = Machine::from_json(&text).unwrap();
        assert_eq!(m, m2);
    }
}
