use converge::*;

const A: f64 = 1.0;
const B: f64 = 100.0;
const RANGE: f64 = 2.0;
const MAX_ITERATIONS: u32 = 500;

fn main() -> ConvergeResult<()> {
    init_logging();

    let adaptor = GaussianAdaptor::with_sigma(0.3)?;
    let template = ParameterTree::float_vector(2, -RANGE..RANGE, adaptor);
    let rosenbrock = FnProblem::shared(template, |v| {
        let (x, y) = (v[0], v[1]);
        (A - x).powi(2) + B * (y - x * x).powi(2)
    });

    let config = PsoConfig::default();
    let executor = ExecutorConfig {
        mode: ExecutorMode::Threaded,
        n_threads: 0,
        ..ExecutorConfig::default()
    };

    let algorithm = ParticleSwarm::new(
        rosenbrock.template(),
        Optimize::Minimize,
        executor.build(rosenbrock, None)?,
        config.n_neighborhoods,
        config.n_members,
        config.coefficients(),
        config.update_rule,
    )?;

    let summary = Optimizer::new(algorithm)
        .with_limit(Limit::Iterations(MAX_ITERATIONS))
        .with_limit(Limit::Quality(1e-6))
        .with_report_interval(25)
        .run()?;

    println!(
        "halted by {:?} after {} iterations, best {:?}",
        summary.halted_by, summary.iterations, summary.best_known
    );
    Ok(())
}
