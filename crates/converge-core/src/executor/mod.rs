pub mod pool;
pub mod serial;

pub use pool::PoolExecutor;
pub use serial::SerialExecutor;

use crate::individual::Individual;
use converge_error::ConvergeResult;

/// Per-position outcome of a batch submission. The driver marks the items it
/// wants worked on as `Unprocessed`; on return, `Processed` positions hold
/// the evaluated individual and `Unprocessed` positions were not returned in
/// time (or failed evaluation and are still dirty).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Unprocessed,
    Processed,
}

/// Whether every requested position of a batch came back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completeness {
    All,
    Partial,
}

/// A work item that returned after its iteration had already closed.
/// Algorithms that can use stale results (PSO) drain these; the others
/// discard them.
#[derive(Clone, Debug)]
pub struct OldItem {
    pub iteration: u32,
    pub position: usize,
    pub individual: Individual,
}

/// Turns a batch of dirty individuals into a batch of evaluated individuals,
/// hiding whether evaluation ran in the calling thread, on a worker pool or
/// on remote consumers behind a broker.
///
/// The order of `batch` is preserved; `positions` must be the same length.
/// Implementations never return an error for a single failing objective call
/// (the position simply stays `Unprocessed`) — errors are reserved for the
/// substrate itself.
pub trait Executor: Send {
    fn work_on(
        &mut self,
        iteration: u32,
        batch: &mut [Individual],
        positions: &mut [Status],
    ) -> ConvergeResult<Completeness>;

    /// Late returns from earlier iterations collected since the last call.
    fn drain_old(&mut self) -> Vec<OldItem> {
        Vec::new()
    }
}

pub(crate) fn completeness_of(positions: &[Status]) -> Completeness {
    if positions.iter().all(|status| *status == Status::Processed) {
        Completeness::All
    } else {
        Completeness::Partial
    }
}
