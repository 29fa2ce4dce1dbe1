//! Runs an EA whose evaluations travel through the broker to a group of
//! in-process worker consumers, with timeout-bound resubmission.

use converge::*;
use std::sync::Arc;
use std::time::Duration;

const N_GENES: usize = 10;
const N_WORKERS: usize = 4;
const MAX_ITERATIONS: u32 = 200;

fn main() -> ConvergeResult<()> {
    init_logging();

    let adaptor = GaussianAdaptor::new(1.0, 0.5, 1e-12..10.0, 1, 1.0)?;
    let template = ParameterTree::float_vector(N_GENES, -5.0..5.0, adaptor);
    let sphere = FnProblem::shared(template, |x| {
        // pretend the objective is expensive
        std::thread::sleep(Duration::from_millis(2));
        x.iter().map(|v| v * v).sum()
    });

    let broker = Broker::new();
    let consumer = ThreadedConsumer::start(
        Arc::clone(&broker),
        Arc::clone(&sphere) as Arc<dyn Problem>,
        N_WORKERS,
    );

    let executor = ExecutorConfig {
        mode: ExecutorMode::Broker,
        wait_factor: 2.0,
        srm: SubmissionReturnMode::ResubmitAfterTimeout,
        max_resubmissions: 3,
        ..ExecutorConfig::default()
    };

    let algorithm = EvolutionaryAlgorithm::new(
        sphere.template(),
        Optimize::Minimize,
        executor.build(Arc::clone(&sphere) as Arc<dyn Problem>, Some(Arc::clone(&broker)))?,
        30,
        5,
        Recombination::Default,
        Sorting::MuCommaNu,
    )?;

    let summary = Optimizer::new(algorithm)
        .with_limit(Limit::Iterations(MAX_ITERATIONS))
        .with_report_interval(20)
        .run()?;

    println!(
        "halted by {:?} after {} iterations, best {:?}",
        summary.halted_by, summary.iterations, summary.best_known
    );

    broker.shutdown();
    consumer.join();
    Ok(())
}
