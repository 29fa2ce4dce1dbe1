use super::{Completeness, Executor, Status, completeness_of};
use crate::domain::thread_pool::{ThreadPool, WorkResult};
use crate::individual::{Command, Individual};
use crate::problem::Problem;
use converge_error::{ConvergeResult, converge_err};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::warn;

/// Fans a batch out over a fixed worker-thread pool and joins before
/// returning. Each item travels as a clone, so the population never shares
/// state with a worker thread; results are written back in batch order,
/// which keeps runs bit-identical to the serial executor for the same seed.
pub struct PoolExecutor {
    problem: Arc<dyn Problem>,
    pool: ThreadPool,
}

impl PoolExecutor {
    /// `n_threads == 0` sizes the pool to the machine's available
    /// parallelism.
    pub fn new(problem: Arc<dyn Problem>, n_threads: usize) -> Self {
        PoolExecutor {
            problem,
            pool: ThreadPool::new(n_threads),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }
}

impl Executor for PoolExecutor {
    fn work_on(
        &mut self,
        iteration: u32,
        batch: &mut [Individual],
        positions: &mut [Status],
    ) -> ConvergeResult<Completeness> {
        let mut handles: Vec<(usize, WorkResult<ConvergeResult<Individual>>)> = Vec::new();

        for (idx, (individual, status)) in batch.iter().zip(positions.iter()).enumerate() {
            if *status == Status::Processed {
                continue;
            }
            if !individual.is_dirty() {
                continue;
            }

            let mut item = individual.clone();
            let problem = Arc::clone(&self.problem);
            let handle = self.pool.submit_with_result(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    item.process(Command::Evaluate, problem.as_ref())
                }));

                match outcome {
                    Ok(Ok(())) => Ok(item),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(converge_err!(Evaluation: "objective panicked")),
                }
            });

            handles.push((idx, handle));
        }

        // clean items that were requested anyway count as processed
        for (individual, status) in batch.iter().zip(positions.iter_mut()) {
            if *status == Status::Unprocessed && !individual.is_dirty() {
                *status = Status::Processed;
            }
        }

        for (idx, handle) in handles {
            match handle.result() {
                Ok(item) if !item.is_dirty() => {
                    batch[idx] = item;
                    positions[idx] = Status::Processed;
                }
                Err(err) => {
                    // the item stays unprocessed and dirty
                    warn!("{}", err.at(iteration, idx));
                }
                _ => {}
            }
        }

        Ok(completeness_of(positions))
    }
}
