//!
//! Mock machines for testing
//!
use super::{Machine, MachineState, MachineTransition, EOF_SYMBOL};
use crate::common::State;

fn st(name: &str, left_context: &str, trans: Vec<MachineTransition>) -> MachineState {
    MachineState {
        name: name.to_string(),
        left_context: left_context.to_string(),
        trans,
    }
}

fn tr(input: Option<char>, output: Option<char>, dest: State) -> MachineTransition {
    MachineTransition::new(input, output, dest)
}

///
/// Identity machine: emits base `A` on input symbol `A`, looping on the end
/// state. (State 0 must be a dedicated start: traceback terminates there.)
///
pub fn mock_identity() -> Machine {
    Machine {
        states: vec![
            st("start", "", vec![tr(Some('A'), Some('A'), 1)]),
            st("loop", "", vec![tr(Some('A'), Some('A'), 1)]),
        ],
        controls: String::new(),
    }
}

///
/// Single-transition machine: input `a` emits base `A`, then halts.
///
pub fn mock_single() -> Machine {
    Machine {
        states: vec![
            st("start", "", vec![tr(Some('a'), Some('A'), 1)]),
            st("end", "", vec![]),
        ],
        controls: String::new(),
    }
}

///
/// Two-transition chain: input `A` emits base `A`, input `B` emits base `C`.
///
pub fn mock_chain() -> Machine {
    Machine {
        states: vec![
            st("start", "", vec![tr(Some('A'), Some('A'), 1)]),
            st("mid", "", vec![tr(Some('B'), Some('C'), 2)]),
            st("end", "", vec![]),
        ],
        controls: String::new(),
    }
}

///
/// Frame machine: input `x` emits base `A` in a loop, and the reserved EOF
/// symbol emits the terminator base `T` into the end state.
///
pub fn mock_framed() -> Machine {
    Machine {
        states: vec![
            st("start", "", vec![tr(Some('x'), Some('A'), 1)]),
            st(
                "loop",
                "",
                vec![
                    tr(Some('x'), Some('A'), 1),
                    tr(Some(EOF_SYMBOL), Some('T'), 2),
                ],
            ),
            st("end", "", vec![]),
        ],
        controls: String::new(),
    }
}

///
/// Four-transition codeword chain emitting "ACGT" on inputs "0101", with
/// two-base left contexts so tandem duplications up to length 2 are
/// decodable at the end state.
///
pub fn mock_codeword() -> Machine {
    Machine {
        states: vec![
            st("W0", "**", vec![tr(Some('0'), Some('A'), 1)]),
            st("W1", "*A", vec![tr(Some('1'), Some('C'), 2)]),
            st("W2", "AC", vec![tr(Some('0'), Some('G'), 3)]),
            st("W3", "CG", vec![tr(Some('1'), Some('T'), 4)]),
            st("W4", "GT", vec![]),
        ],
        controls: String::new(),
    }
}

///
/// Codeword chain "XYZ" -> "ACG" surrounded by flank-absorbing pad states.
/// The pad states consume the control symbol `n` for every flank base. The
/// end state is reachable only straight after the codeword, so a global
/// decode of a flanked observation has no valid path, while a local decode
/// ends in the trailing pad.
///
pub fn mock_flanked_codeword() -> Machine {
    let pad = |dest: State| -> Vec<MachineTransition> {
        vec![
            tr(Some('n'), Some('A'), dest),
            tr(Some('n'), Some('C'), dest),
            tr(Some('n'), Some('G'), dest),
            tr(Some('n'), Some('T'), dest),
        ]
    };
    let mut start_trans = pad(0);
    start_trans.push(tr(Some('X'), Some('A'), 1));
    Machine {
        states: vec![
            st("pad5", "", start_trans),
            st("C1", "", vec![tr(Some('Y'), Some('C'), 2)]),
            st("C2", "", vec![tr(Some('Z'), Some('G'), 3)]),
            st("C3", "", vec![tr(None, None, 4), tr(None, None, 5)]),
            st("pad3", "", pad(4)),
            st("end", "", vec![]),
        ],
        controls: "n".to_string(),
    }
}
