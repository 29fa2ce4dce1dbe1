pub mod config;
pub mod driver;
pub mod ea;
pub mod gd;
pub mod limit;
pub mod pso;
pub mod stats;

pub use config::{
    CheckpointConfig, EaConfig, ExecutorConfig, ExecutorMode, GdConfig, GlobalConfig, PsoConfig,
};
pub use driver::{OptimizationAlgorithm, Optimizer, RunSummary, exit_code};
pub use ea::{EvolutionaryAlgorithm, Recombination, Sorting};
pub use gd::GradientDescent;
pub use limit::{HaltReason, Limit};
pub use pso::{ParticleSwarm, SwarmCoefficients, UpdateRule};
pub use stats::{Metric, MetricSet, metric_names};

pub use converge_broker::{
    Broker, BrokerExecutor, BufferPort, ItemTag, PortId, Request, Response, SubmissionReturnMode,
    ThreadedConsumer, WireFormat, WorkItem, run_worker, serve,
};
pub use converge_core::*;
pub use converge_error::{ConvergeError, ensure};

pub fn init_logging() {
    pub use std::sync::Once;
    static INIT_LOGGING: Once = Once::new();

    INIT_LOGGING.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .compact(),
            )
            .init();
    });
}
