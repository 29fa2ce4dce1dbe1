use converge::*;

const N_GENES: usize = 10;
const RANGE: f64 = 5.0;
const MAX_ITERATIONS: u32 = 500;
const TARGET: f64 = 1e-8;

fn main() -> ConvergeResult<()> {
    init_logging();

    let adaptor = GaussianAdaptor::new(1.0, 0.5, 1e-12..10.0, 1, 1.0)?;
    let template = ParameterTree::float_vector(N_GENES, -RANGE..RANGE, adaptor);
    let sphere = FnProblem::shared(template, |x| x.iter().map(|v| v * v).sum());

    let algorithm = EvolutionaryAlgorithm::new(
        sphere.template(),
        Optimize::Minimize,
        ExecutorConfig::default().build(sphere, None)?,
        30,
        5,
        Recombination::Default,
        Sorting::MuCommaNu,
    )?;

    let summary = Optimizer::new(algorithm)
        .with_limit(Limit::Iterations(MAX_ITERATIONS))
        .with_limit(Limit::Quality(TARGET))
        .with_report_interval(20)
        .run()?;

    println!(
        "halted by {:?} after {} iterations, best {:?}",
        summary.halted_by, summary.iterations, summary.best_known
    );
    Ok(())
}
