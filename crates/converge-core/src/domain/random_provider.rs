//! Process-wide randomness with per-thread streams.
//!
//! The driver thread and every worker thread each own a thread-local
//! [SmallRng], seeded once from a shared global generator. Seeding the global
//! generator with [set_seed] before any thread touches its local stream makes
//! runs reproducible, and because evaluation workers never consume driver-side
//! draws, results do not depend on worker count.

use rand::distr::{Distribution, StandardUniform, uniform::SampleUniform};
use rand::rngs::SmallRng;
use rand::{Rng, RngExt, SeedableRng};
use std::cell::RefCell;
use std::ops::Range;
use std::sync::{Arc, LazyLock, Mutex};

static GLOBAL_RNG: LazyLock<Arc<Mutex<SmallRng>>> =
    LazyLock::new(|| Arc::new(Mutex::new(SmallRng::from_rng(&mut rand::rng()))));

thread_local! {
    static TLS_RNG: RefCell<SmallRng> = RefCell::new({
        let mut global = GLOBAL_RNG.lock().unwrap();
        SmallRng::seed_from_u64(global.next_u64())
    });
}

fn with_rng<R>(f: impl FnOnce(&mut SmallRng) -> R) -> R {
    TLS_RNG.with(|cell| f(&mut cell.borrow_mut()))
}

/// Seeds the global generator. Thread-local streams created afterwards derive
/// from this seed; the calling thread's own stream is reseeded as well.
pub fn set_seed(seed: u64) {
    {
        let mut global = GLOBAL_RNG.lock().unwrap();
        *global = SmallRng::seed_from_u64(seed);
    }

    TLS_RNG.with(|cell| {
        let mut global = GLOBAL_RNG.lock().unwrap();
        *cell.borrow_mut() = SmallRng::seed_from_u64(global.next_u64());
    });
}

/// For floating point types, the number will be in the range [0, 1).
#[inline(always)]
pub fn random<T>() -> T
where
    T: SampleUniform,
    StandardUniform: Distribution<T>,
{
    with_rng(|rng| rng.random())
}

/// Generates a random boolean with the given probability of being true.
#[inline(always)]
pub fn bool(prob: f64) -> bool {
    with_rng(|rng| rng.random_bool(prob))
}

/// Generates a random number of type T in the given range.
pub fn range<T>(range: Range<T>) -> T
where
    T: SampleUniform + PartialOrd,
{
    with_rng(|rng| rng.random_range(range))
}

/// Chooses a random index weighted by the given non-negative weights.
/// Falls back to a uniform pick when the weights sum to zero.
pub fn weighted_index(weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return with_rng(|rng| rng.random_range(0..weights.len()));
    }

    let mut mark = with_rng(|rng| rng.random::<f64>()) * total;
    for (idx, w) in weights.iter().enumerate() {
        mark -= w;
        if mark <= 0.0 {
            return idx;
        }
    }

    weights.len() - 1
}

/// Generates a random number from a Gaussian distribution with the given mean
/// and standard deviation. The Box-Muller transform is used.
pub fn gaussian(mean: f64, std_dev: f64) -> f64 {
    with_rng(|rng| {
        let u1: f64 = rng.random();
        let u2: f64 = rng.random();
        let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z0
    })
}
