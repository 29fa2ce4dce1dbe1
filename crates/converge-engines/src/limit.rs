use converge_core::Population;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// One halt criterion. A driver carries any number of limits and stops at
/// the first iteration boundary where one of them triggers; mid-batch work
/// is never interrupted.
#[derive(Clone, Debug)]
pub enum Limit {
    /// Stop once the iteration counter reaches this value.
    Iterations(u32),
    /// Wall-clock bound, in minutes.
    Minutes(f64),
    /// Stop once `best_known` meets this threshold under the population's
    /// optimize direction.
    Quality(f64),
    /// Cooperative external stop flag.
    External(Arc<AtomicBool>),
}

/// Which limit ended the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaltReason {
    Iterations,
    WallClock,
    Quality,
    External,
}

impl Limit {
    pub fn triggered(&self, population: &Population, started: Instant) -> Option<HaltReason> {
        match self {
            Limit::Iterations(max) => {
                (population.iteration() >= *max).then_some(HaltReason::Iterations)
            }
            Limit::Minutes(minutes) => {
                (started.elapsed().as_secs_f64() / 60.0 >= *minutes).then_some(HaltReason::WallClock)
            }
            Limit::Quality(threshold) => population
                .best_known()
                .is_some_and(|best| population.optimize().reached(best, *threshold))
                .then_some(HaltReason::Quality),
            Limit::External(flag) => flag.load(Ordering::SeqCst).then_some(HaltReason::External),
        }
    }

    /// A fresh stop flag plus the limit watching it.
    pub fn external() -> (Arc<AtomicBool>, Limit) {
        let flag = Arc::new(AtomicBool::new(false));
        (Arc::clone(&flag), Limit::External(flag))
    }
}
