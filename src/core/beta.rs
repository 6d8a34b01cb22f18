//! The power-β heuristic's exponent, applied throughout the MIS partial-sum
//! recurrences in `vertex` and the estimators. Grounded in
//! `original_source/Beta.{hpp,cpp}`: the common exponents 0 (every
//! strategy weighted equally — effectively disables MIS), 1 (the balance
//! heuristic) and 2 (the usual "power heuristic") get their own variant so
//! the hot recurrence loop avoids a `powf` call; anything else falls back
//! to `powf`.

use crate::core::pbrt::Float;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Beta {
    Zero,
    One,
    Two,
    Variable(Float),
}

impl Beta {
    pub fn from_exponent(exponent: Float) -> Self {
        if exponent == 0.0 {
            Beta::Zero
        } else if exponent == 1.0 {
            Beta::One
        } else if exponent == 2.0 {
            Beta::Two
        } else {
            Beta::Variable(exponent)
        }
    }

    #[inline]
    pub fn apply(&self, x: Float) -> Float {
        match self {
            Beta::Zero => 1.0,
            Beta::One => x,
            Beta::Two => x * x,
            Beta::Variable(e) => x.powf(*e),
        }
    }

    pub fn exponent(&self) -> Float {
        match self {
            Beta::Zero => 0.0,
            Beta::One => 1.0,
            Beta::Two => 2.0,
            Beta::Variable(e) => *e,
        }
    }
}

impl Default for Beta {
    fn default() -> Self {
        Beta::Two
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_variants_match_powf() {
        for (beta, e) in [(Beta::Zero, 0.0), (Beta::One, 1.0), (Beta::Two, 2.0)] {
            for x in [0.1, 1.0, 3.7] {
                assert!((beta.apply(x) - x.powf(e)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn variable_matches_powf() {
        let beta = Beta::from_exponent(1.5);
        assert!((beta.apply(4.0) - 4.0_f64.powf(1.5)).abs() < 1e-9);
    }
}
