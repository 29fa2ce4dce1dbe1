//! Reflective transfer function for constrained floating point genes.
//!
//! Maps an unconstrained internal value onto a closed interval by folding the
//! real line at the interval boundaries (a triangle wave). Unlike clamping,
//! the mapping is continuous and preserves the shape of Gaussian steps taken
//! in internal coordinates, so a random walk on the internal value never
//! piles up on a boundary.

/// Folds `value` into `[lo, hi]`.
///
/// The mapping is the identity on `[lo, hi]`, periodic with period
/// `2 * (hi - lo)` and symmetric around each boundary:
///
/// ```text
/// fold(hi + d) == hi - d
/// fold(lo - d) == lo + d
/// ```
pub fn fold(value: f64, lo: f64, hi: f64) -> f64 {
    debug_assert!(lo < hi, "fold requires lo < hi");

    let span = hi - lo;
    let t = (value - lo).rem_euclid(2.0 * span);

    if t <= span { lo + t } else { lo + 2.0 * span - t }
}
