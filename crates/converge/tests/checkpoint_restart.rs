use converge::{
    CheckpointFormat, Checkpointer, EvolutionaryAlgorithm, ExecutorConfig, FnProblem,
    GaussianAdaptor, Individual, Limit, Optimize, OptimizationAlgorithm, Optimizer, ParameterTree,
    ParticleSwarm, Population, Problem, Recombination, Sorting, SwarmCoefficients, UpdateRule,
    random_provider,
};
use std::path::PathBuf;
use std::sync::Arc;

fn sphere_problem() -> Arc<dyn Problem> {
    let adaptor = GaussianAdaptor::new(1.0, 0.5, 1e-12..10.0, 1, 1.0).unwrap();
    let mut template = ParameterTree::float_vector(10, -5.0..5.0, adaptor);
    template.assign_flat(&[4.0; 10]).unwrap();

    FnProblem::shared(template, |x| x.iter().map(|v| v * v).sum())
}

fn sphere_ea(problem: &Arc<dyn Problem>) -> EvolutionaryAlgorithm {
    EvolutionaryAlgorithm::new(
        problem.template(),
        Optimize::Minimize,
        ExecutorConfig::default()
            .build(Arc::clone(problem), None)
            .unwrap(),
        30,
        5,
        Recombination::Default,
        Sorting::MuCommaNu,
    )
    .unwrap()
}

fn checkpoint_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "converge-restart-{}-{}",
        tag,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn find_snapshot(dir: &PathBuf, iteration: u32) -> PathBuf {
    let prefix = format!("{}_", iteration);
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .expect("snapshot file present")
}

fn run_to(limit: u32, checkpointer: Option<(Checkpointer, u32)>) -> Population {
    let problem = sphere_problem();
    let mut optimizer = Optimizer::new(sphere_ea(&problem))
        .with_limit(Limit::Iterations(limit))
        .with_report_interval(50);
    if let Some((checkpointer, interval)) = checkpointer {
        optimizer = optimizer.with_checkpoints(checkpointer, interval);
    }

    optimizer.run().unwrap();
    optimizer.algorithm().population().clone()
}

#[test]
fn restart_from_checkpoint_reproduces_the_trajectory() {
    let dir = checkpoint_dir("ea");
    let checkpointer = Checkpointer::new(&dir, "sphere.cp", CheckpointFormat::Structured);

    // uninterrupted run: 100 iterations, snapshots every 10
    random_provider::set_seed(1);
    let uninterrupted = run_to(100, Some((checkpointer.clone(), 10)));

    let snapshot_90 = find_snapshot(&dir, 90);

    // "killed" run: replay the same 90 iterations so the RNG stream sits
    // exactly where the snapshot was taken, discard the in-memory state,
    // restore the snapshot and continue to 100
    random_provider::set_seed(1);
    let _discarded = run_to(90, None);

    let problem = sphere_problem();
    let mut optimizer = Optimizer::new(sphere_ea(&problem))
        .with_limit(Limit::Iterations(100))
        .with_report_interval(50)
        .with_checkpoints(checkpointer, 0);
    optimizer.restore(&snapshot_90).unwrap();

    assert_eq!(optimizer.algorithm().population().iteration(), 90);

    optimizer.run().unwrap();
    let restarted = optimizer.algorithm().population().clone();

    assert_eq!(restarted.iteration(), 100);
    assert_eq!(
        restarted.best_known().unwrap().to_bits(),
        uninterrupted.best_known().unwrap().to_bits()
    );
    assert_eq!(restarted, uninterrupted);
}

fn sphere_pso(problem: &Arc<dyn Problem>) -> ParticleSwarm {
    ParticleSwarm::new(
        problem.template(),
        Optimize::Minimize,
        ExecutorConfig::default()
            .build(Arc::clone(problem), None)
            .unwrap(),
        3,
        5,
        SwarmCoefficients::default(),
        UpdateRule::Default,
    )
    .unwrap()
}

fn run_pso_to(
    limit: u32,
    checkpointer: Option<(Checkpointer, u32)>,
) -> (Population, Option<Individual>) {
    let problem = sphere_problem();
    let mut optimizer = Optimizer::new(sphere_pso(&problem))
        .with_limit(Limit::Iterations(limit))
        .with_report_interval(50);
    if let Some((checkpointer, interval)) = checkpointer {
        optimizer = optimizer.with_checkpoints(checkpointer, interval);
    }

    optimizer.run().unwrap();
    (
        optimizer.algorithm().population().clone(),
        optimizer.algorithm().global_best().cloned(),
    )
}

#[test]
fn restart_from_checkpoint_reproduces_the_pso_trajectory() {
    let dir = checkpoint_dir("pso");
    let checkpointer = Checkpointer::new(&dir, "swarm.cp", CheckpointFormat::Structured);

    // uninterrupted run: 40 iterations, snapshots every 10
    random_provider::set_seed(21);
    let (uninterrupted, uninterrupted_best) = run_pso_to(40, Some((checkpointer.clone(), 10)));

    let snapshot_30 = find_snapshot(&dir, 30);

    // replay 30 iterations to line the RNG stream up, then continue from
    // the snapshot instead of the in-memory swarm
    random_provider::set_seed(21);
    let _discarded = run_pso_to(30, None);

    let problem = sphere_problem();
    let mut optimizer = Optimizer::new(sphere_pso(&problem))
        .with_limit(Limit::Iterations(40))
        .with_report_interval(50)
        .with_checkpoints(checkpointer, 0);
    optimizer.restore(&snapshot_30).unwrap();

    assert_eq!(optimizer.algorithm().population().iteration(), 30);

    optimizer.run().unwrap();

    // the swarm-level bests travelled through the snapshot, so the whole
    // trajectory matches, global best included
    assert_eq!(optimizer.algorithm().population(), &uninterrupted);
    assert_eq!(
        optimizer.algorithm().global_best(),
        uninterrupted_best.as_ref()
    );
}

#[test]
fn snapshot_files_encode_iteration_and_fitness() {
    let dir = checkpoint_dir("names");
    let checkpointer = Checkpointer::new(&dir, "run.cp", CheckpointFormat::Text);

    random_provider::set_seed(2);
    run_to(20, Some((checkpointer, 10)));

    let names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();

    assert!(names.iter().any(|name| name.starts_with("10_")));
    assert!(names.iter().any(|name| name.starts_with("20_")));
    // the final snapshot written at halt
    assert!(names.iter().any(|name| name.starts_with("final_")));
    assert!(names.iter().all(|name| name.ends_with("_run.cp")));
}
