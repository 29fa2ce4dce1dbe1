use serde::{Deserialize, Serialize};

/// The optimization direction. Every fitness comparison in the library goes
/// through [is_better](Self::is_better) so that algorithms never hard-code a
/// minimize-only view of the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Optimize {
    Minimize,
    Maximize,
}

impl Optimize {
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self {
            Optimize::Minimize => a < b,
            Optimize::Maximize => a > b,
        }
    }

    /// The direction multiplier for gradient steps: descend when minimizing,
    /// ascend when maximizing.
    pub fn gradient_sign(&self) -> f64 {
        match self {
            Optimize::Minimize => -1.0,
            Optimize::Maximize => 1.0,
        }
    }

    /// True when `score` meets or beats `threshold` in this direction.
    pub fn reached(&self, score: f64, threshold: f64) -> bool {
        match self {
            Optimize::Minimize => score <= threshold,
            Optimize::Maximize => score >= threshold,
        }
    }
}

impl Default for Optimize {
    fn default() -> Self {
        Optimize::Minimize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_better() {
        assert!(Optimize::Minimize.is_better(1.0, 2.0));
        assert!(!Optimize::Minimize.is_better(2.0, 1.0));
        assert!(Optimize::Maximize.is_better(2.0, 1.0));
        assert!(!Optimize::Maximize.is_better(1.0, 2.0));
    }

    #[test]
    fn test_reached() {
        assert!(Optimize::Minimize.reached(1e-7, 1e-6));
        assert!(!Optimize::Minimize.reached(1e-5, 1e-6));
        assert!(Optimize::Maximize.reached(0.99, 0.9));
    }
}
