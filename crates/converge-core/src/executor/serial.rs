use super::{Completeness, Executor, Status, completeness_of};
use crate::individual::{Command, Individual};
use crate::problem::Problem;
use converge_error::ConvergeResult;
use std::sync::Arc;
use tracing::warn;

/// Evaluates every requested item in the calling thread. The baseline
/// executor: no suspension points, no clones, complete by construction
/// whenever the objective cooperates.
pub struct SerialExecutor {
    problem: Arc<dyn Problem>,
}

impl SerialExecutor {
    pub fn new(problem: Arc<dyn Problem>) -> Self {
        SerialExecutor { problem }
    }
}

impl Executor for SerialExecutor {
    fn work_on(
        &mut self,
        iteration: u32,
        batch: &mut [Individual],
        positions: &mut [Status],
    ) -> ConvergeResult<Completeness> {
        for (position, (individual, status)) in
            batch.iter_mut().zip(positions.iter_mut()).enumerate()
        {
            if *status == Status::Processed {
                continue;
            }

            match individual.process(Command::Evaluate, self.problem.as_ref()) {
                Ok(()) if !individual.is_dirty() => *status = Status::Processed,
                Err(err) => {
                    // the item stays unprocessed and dirty
                    warn!("{}", err.at(iteration, position));
                }
                _ => {}
            }
        }

        Ok(completeness_of(positions))
    }
}
