//!
//! probability stored in log space
//!
//! The decoder is strictly max-plus: probabilities multiply (add in log
//! space) and alternatives compete by `max`, so `Prob` has `Mul` and
//! ordering but no log-sum-exp addition.
//!
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Prob {
    log_value: f64,
}

impl Prob {
    pub fn from_prob(value: f64) -> Prob {
        Prob {
            log_value: value.ln(),
        }
    }
    pub fn from_log_prob(log_value: f64) -> Prob {
        Prob { log_value }
    }
    pub fn to_value(self) -> f64 {
        self.log_value.exp()
    }
    pub fn to_log_value(self) -> f64 {
        self.log_value
    }
    /// probability zero (log score -inf), the identity of `max`
    pub fn zero() -> Prob {
        Prob::from_prob(0.0)
    }
    /// probability one (log score 0), the identity of `*`
    pub fn one() -> Prob {
        Prob::from_prob(1.0)
    }
    pub fn is_zero(self) -> bool {
        self.log_value == f64::NEG_INFINITY
    }
    pub fn max(self, other: Prob) -> Prob {
        if self.log_value > other.log_value {
            self
        } else {
            other
        }
    }
}

/// short-hand of `Prob::from_prob`
pub fn p(value: f64) -> Prob {
    Prob::from_prob(value)
}

impl std::fmt::Display for Prob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.log_value)
    }
}

impl std::ops::Mul for Prob {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        Prob {
            log_value: self.log_value + other.log_value,
        }
    }
}

impl std::iter::Product for Prob {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Prob::one(), |a, b| a * b)
    }
}

// serialized as the linear probability, so parameter files stay readable
impl Serialize for Prob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_value())
    }
}

impl<'de> Deserialize<'de> for Prob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Prob, D::Error> {
        f64::deserialize(deserializer).map(Prob::from_prob)
    }
}
