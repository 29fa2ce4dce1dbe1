use crate::ea::{Recombination, Sorting};
use crate::pso::{SwarmCoefficients, UpdateRule};
use converge_broker::{Broker, BrokerExecutor, SubmissionReturnMode};
use converge_core::checkpoint::{CheckpointFormat, Checkpointer};
use converge_core::executor::Executor;
use converge_core::{PoolExecutor, Problem, SerialExecutor};
use converge_error::{ConvergeResult, ensure};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Run-level knobs shared by every algorithm. The configuration file format
/// and its parsing live outside this library; these structs are what an
/// external parser deserializes into.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Halt after this many iterations.
    pub max_iterations: u32,
    /// Wall-clock halt, in minutes. Zero disables the bound.
    pub max_minutes: f64,
    /// Progress emission period, in iterations.
    pub report_interval: u32,
    /// Snapshot period, in iterations. Zero disables checkpointing.
    pub checkpoint_interval: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            max_iterations: 1000,
            max_minutes: 0.0,
            report_interval: 1,
            checkpoint_interval: 0,
        }
    }
}

impl GlobalConfig {
    pub fn validate(&self) -> ConvergeResult<()> {
        ensure!(self.max_iterations > 0, Config: "max_iterations must be positive");
        ensure!(self.report_interval > 0, Config: "report_interval must be positive");
        ensure!(
            self.max_minutes >= 0.0 && self.max_minutes.is_finite(),
            Config: "max_minutes must be non-negative, got {}",
            self.max_minutes
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    Serial,
    Threaded,
    Broker,
}

/// Which execution substrate evaluates the batches, and how the broker
/// variant waits for returns.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub mode: ExecutorMode,
    /// Pool size for `threaded` mode; zero picks the hardware concurrency.
    pub n_threads: usize,
    /// Timeout multiplier for the broker modes.
    pub wait_factor: f64,
    /// Submission-return mode for the broker executor.
    pub srm: SubmissionReturnMode,
    /// Resubmission cap for `resubmit` mode.
    pub max_resubmissions: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            mode: ExecutorMode::Serial,
            n_threads: 0,
            wait_factor: 2.0,
            srm: SubmissionReturnMode::IncompleteReturn,
            max_resubmissions: 3,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> ConvergeResult<()> {
        ensure!(
            self.wait_factor >= 1.0 && self.wait_factor.is_finite(),
            Config: "wait_factor must be at least 1, got {}",
            self.wait_factor
        );
        Ok(())
    }

    /// Builds the configured executor. Broker mode needs the broker the
    /// worker consumers were attached to.
    pub fn build(
        &self,
        problem: Arc<dyn Problem>,
        broker: Option<Arc<Broker>>,
    ) -> ConvergeResult<Box<dyn Executor>> {
        self.validate()?;

        match self.mode {
            ExecutorMode::Serial => Ok(Box::new(SerialExecutor::new(problem))),
            ExecutorMode::Threaded => Ok(Box::new(PoolExecutor::new(problem, self.n_threads))),
            ExecutorMode::Broker => {
                let broker = broker.ok_or_else(
                    || converge_error::converge_err!(Config: "broker mode requires a broker"),
                )?;
                Ok(Box::new(BrokerExecutor::new(
                    broker,
                    self.srm,
                    self.wait_factor,
                    self.max_resubmissions,
                )))
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EaConfig {
    /// Total population size, parents plus children.
    pub pop_size: usize,
    pub n_parents: usize,
    pub recombination: Recombination,
    pub sorting: Sorting,
}

impl Default for EaConfig {
    fn default() -> Self {
        EaConfig {
            pop_size: 42,
            n_parents: 2,
            recombination: Recombination::Default,
            sorting: Sorting::MuPlusNu,
        }
    }
}

impl EaConfig {
    pub fn validate(&self) -> ConvergeResult<()> {
        ensure!(self.n_parents >= 1, Config: "n_parents must be at least 1");
        ensure!(
            self.pop_size > self.n_parents,
            Config: "pop_size {} must exceed n_parents {}",
            self.pop_size,
            self.n_parents
        );
        if matches!(self.sorting, Sorting::MuCommaNu | Sorting::MuNuPretain) {
            ensure!(
                self.pop_size - self.n_parents >= self.n_parents,
                Config: "comma sorting needs at least as many children as parents"
            );
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PsoConfig {
    pub n_neighborhoods: usize,
    pub n_members: usize,
    pub c_personal: f64,
    pub c_local: f64,
    pub c_global: f64,
    pub c_velocity: f64,
    pub update_rule: UpdateRule,
}

impl Default for PsoConfig {
    fn default() -> Self {
        let coefficients = SwarmCoefficients::default();
        PsoConfig {
            n_neighborhoods: 5,
            n_members: 10,
            c_personal: coefficients.personal,
            c_local: coefficients.local,
            c_global: coefficients.global,
            c_velocity: coefficients.velocity,
            update_rule: UpdateRule::Default,
        }
    }
}

impl PsoConfig {
    pub fn validate(&self) -> ConvergeResult<()> {
        ensure!(self.n_neighborhoods >= 1, Config: "n_neighborhoods must be at least 1");
        ensure!(self.n_members >= 1, Config: "n_members must be at least 1");
        for (name, value) in [
            ("c_personal", self.c_personal),
            ("c_local", self.c_local),
            ("c_global", self.c_global),
            ("c_velocity", self.c_velocity),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                Config: "{} must be a non-negative number, got {}",
                name,
                value
            );
        }
        Ok(())
    }

    pub fn coefficients(&self) -> SwarmCoefficients {
        SwarmCoefficients {
            personal: self.c_personal,
            local: self.c_local,
            global: self.c_global,
            velocity: self.c_velocity,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GdConfig {
    pub n_starting_points: usize,
    /// Finite perturbation used for the gradient estimate.
    pub finite_step: f64,
    /// Step length along the estimated gradient.
    pub step_size: f64,
}

impl Default for GdConfig {
    fn default() -> Self {
        GdConfig {
            n_starting_points: 1,
            finite_step: 1e-4,
            step_size: 0.1,
        }
    }
}

impl GdConfig {
    pub fn validate(&self) -> ConvergeResult<()> {
        ensure!(self.n_starting_points >= 1, Config: "n_starting_points must be at least 1");
        ensure!(
            self.finite_step > 0.0 && self.finite_step.is_finite(),
            Config: "finite_step must be positive, got {}",
            self.finite_step
        );
        ensure!(
            self.step_size > 0.0 && self.step_size.is_finite(),
            Config: "step_size must be positive, got {}",
            self.step_size
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub directory: PathBuf,
    pub base_name: String,
    pub format: CheckpointFormat,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            directory: PathBuf::from("checkpoints"),
            base_name: String::from("population.cp"),
            format: CheckpointFormat::Text,
        }
    }
}

impl CheckpointConfig {
    pub fn validate(&self) -> ConvergeResult<()> {
        ensure!(!self.base_name.is_empty(), Config: "base_name must not be empty");
        Ok(())
    }

    pub fn build(&self) -> Checkpointer {
        Checkpointer::new(&self.directory, &self.base_name, self.format)
    }
}
