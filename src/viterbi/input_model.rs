//!
//! Prior over input symbols
//!
use crate::machine::Machine;
use std::collections::BTreeMap;

///
/// Normalized symbol probabilities used to score input-consuming
/// transitions. Two weight classes: ordinary payload symbols and control
/// symbols (the caller picks the weights; the decode driver penalizes
/// controls heavily).
///
#[derive(Debug, Clone)]
pub struct InputModel {
    pub input_alphabet: String,
    pub sym_prob: BTreeMap<char, f64>,
}

impl InputModel {
    pub fn new(
        machine: &Machine,
        input_alphabet: &str,
        sym_weight: f64,
        control_weight: f64,
    ) -> InputModel {
        let mut sym_prob = BTreeMap::new();
        let mut norm = 0.0;
        for c in input_alphabet.chars() {
            let w = if machine.is_control(c) {
                control_weight
            } else {
                sym_weight
            };
            sym_prob.insert(c, w);
            norm += w;
        }
        if norm > 0.0 {
            for w in sym_prob.values_mut() {
                *w /= norm;
            }
        }
        InputModel {
            input_alphabet: input_alphabet.to_string(),
            sym_prob,
        }
    }
}

impl std::fmt::Display for InputModel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (c, p) in &self.sym_prob {
            writeln!(f, "{} {}", c, p)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::mocks::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_over_payload() {
        let machine = mock_codeword();
        let model = InputModel::new(&machine, "01", 1.0, 1.0);
        assert_relative_eq!(model.sym_prob[&'0'], 0.5);
        assert_relative_eq!(model.sym_prob[&'1'], 0.5);
    }

    #[test]
    fn controls_are_downweighted() {
        let machine = mock_flanked_codeword();
        let model = InputModel::new(&machine, "nXYZ", 1.0, 0.001);
        let norm = 3.0 + 0.001;
        assert_relative_eq!(model.sym_prob[&'n'], 0.001 / norm);
        assert_relative_eq!(model.sym_prob[&'X'], 1.0 / norm);
        let total: f64 = model.sym_prob.values().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }
}
