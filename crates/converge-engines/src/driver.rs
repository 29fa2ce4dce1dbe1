use crate::limit::{HaltReason, Limit};
use crate::stats::{MetricSet, metric_names};
use converge_core::checkpoint::{Checkpointer, SnapshotLabel};
use converge_core::{ConvergeError, ConvergeResult, Population};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

/// The three optimization algorithms plug into the driver through this
/// trait. `init` builds (or, after a checkpoint restore, accepts) the
/// population; `cycle` runs one adapt/evaluate/select round and reports the
/// iteration's best fitness.
pub trait OptimizationAlgorithm {
    fn name(&self) -> &'static str;

    fn init(&mut self) -> ConvergeResult<()>;

    fn cycle(&mut self) -> ConvergeResult<f64>;

    fn population(&self) -> &Population;

    fn population_mut(&mut self) -> &mut Population;

    fn finalize(&mut self) -> ConvergeResult<()> {
        Ok(())
    }
}

/// What a finished run looked like.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub iterations: u32,
    pub best_known: Option<f64>,
    pub halted_by: HaltReason,
    pub metrics: MetricSet,
}

/// Owns the shared optimization loop: halt checks at iteration boundaries,
/// stall accounting, periodic progress lines and periodic checkpoints, one
/// final checkpoint at halt, and a last-ditch checkpoint attempt when an
/// iteration fails fatally.
pub struct Optimizer<A: OptimizationAlgorithm> {
    algorithm: A,
    limits: Vec<Limit>,
    report_interval: u32,
    checkpoint_interval: u32,
    checkpointer: Option<Checkpointer>,
}

impl<A: OptimizationAlgorithm> Optimizer<A> {
    pub fn new(algorithm: A) -> Self {
        Optimizer {
            algorithm,
            limits: Vec::new(),
            report_interval: 1,
            checkpoint_interval: 0,
            checkpointer: None,
        }
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limits.push(limit);
        self
    }

    pub fn with_report_interval(mut self, interval: u32) -> Self {
        self.report_interval = interval.max(1);
        self
    }

    /// An interval of zero disables periodic snapshots.
    pub fn with_checkpoints(mut self, checkpointer: Checkpointer, interval: u32) -> Self {
        self.checkpointer = Some(checkpointer);
        self.checkpoint_interval = interval;
        self
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    pub fn algorithm_mut(&mut self) -> &mut A {
        &mut self.algorithm
    }

    /// Merges a saved snapshot into the algorithm's population before the
    /// run starts. `init` sees a non-empty population and leaves it alone.
    pub fn restore(&mut self, path: impl AsRef<Path>) -> ConvergeResult<()> {
        let checkpointer = self.checkpointer.as_ref().ok_or_else(
            || converge_error::converge_err!(Config: "restore requires a configured checkpointer"),
        )?;

        checkpointer.restore_into(path, self.algorithm.population_mut())
    }

    fn halted(&self, started: Instant) -> Option<HaltReason> {
        self.limits
            .iter()
            .find_map(|limit| limit.triggered(self.algorithm.population(), started))
    }

    fn save_checkpoint(&self, label: SnapshotLabel, metrics: &mut MetricSet) {
        if let Some(checkpointer) = &self.checkpointer {
            let timer = Instant::now();
            if let Err(err) = checkpointer.save(self.algorithm.population(), label) {
                warn!("checkpoint save failed: {}", err);
            }
            metrics.upsert(metric_names::CHECKPOINT, timer.elapsed());
        }
    }

    /// Runs the algorithm until a halt criterion fires. A fatal error inside
    /// an iteration aborts the run after one final checkpoint attempt.
    pub fn run(&mut self) -> ConvergeResult<RunSummary> {
        self.algorithm.init()?;

        let started = Instant::now();
        let mut metrics = MetricSet::new();
        info!(
            "{} starting at iteration {} with {} individuals",
            self.algorithm.name(),
            self.algorithm.population().iteration(),
            self.algorithm.population().len()
        );

        let halted_by = loop {
            if let Some(reason) = self.halted(started) {
                break reason;
            }

            let iteration = self.algorithm.population_mut().advance_iteration();

            let timer = Instant::now();
            let best = match self.algorithm.cycle() {
                Ok(best) => best,
                Err(err) => {
                    error!("{} failed at iteration {}: {}", self.algorithm.name(), iteration, err);
                    self.save_checkpoint(SnapshotLabel::Final, &mut metrics);
                    return Err(err.with_context(format!("iteration {}", iteration)));
                }
            };
            metrics.upsert(metric_names::CYCLE, timer.elapsed());

            self.algorithm.population_mut().update_stalls(best);

            if iteration % self.report_interval == 0 {
                let population = self.algorithm.population();
                info!(
                    "iter {:<6} best {:<14e} stalls {:<4} cycle {:.2?}",
                    iteration,
                    population.best_known().unwrap_or(f64::NAN),
                    population.n_stalls(),
                    metrics
                        .get(metric_names::CYCLE)
                        .map(|m| m.mean())
                        .unwrap_or_default()
                );
            }

            if self.checkpoint_interval != 0 && iteration % self.checkpoint_interval == 0 {
                self.save_checkpoint(SnapshotLabel::Iteration(iteration), &mut metrics);
            }
        };

        self.algorithm.finalize()?;
        self.save_checkpoint(SnapshotLabel::Final, &mut metrics);

        let population = self.algorithm.population();
        info!(
            "{} halted by {:?} at iteration {} with best {:?}",
            self.algorithm.name(),
            halted_by,
            population.iteration(),
            population.best_known()
        );

        Ok(RunSummary {
            iterations: population.iteration(),
            best_known: population.best_known(),
            halted_by,
            metrics,
        })
    }
}

/// Process exit code for a finished (or failed) run: 0 on clean halt, 1 on
/// configuration errors, 2 on unrecoverable runtime errors.
pub fn exit_code(result: &ConvergeResult<RunSummary>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => match root_code(err) {
            converge_error::ErrorCode::Config | converge_error::ErrorCode::Adaptor => 1,
            _ => 2,
        },
    }
}

fn root_code(err: &ConvergeError) -> converge_error::ErrorCode {
    match err {
        ConvergeError::Context { source, .. } => root_code(source),
        other => other.code(),
    }
}
