//! A Rust library for parallel metaheuristic optimization.
//!
//! Minimize (or maximize) user objective functions over mixed-type
//! parameter trees with self-adaptive evolutionary search, particle swarms
//! or finite-difference gradient descent, on a serial, thread-pool or
//! broker-mediated execution substrate.

pub use converge_engines::*;
pub use converge_error::{ConvergeError, ConvergeResult, ErrorCode};
