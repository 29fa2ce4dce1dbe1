use converge::executor::{Completeness, Executor, Status};
use converge::{
    Broker, BrokerExecutor, FnProblem, GaussianAdaptor, Individual, ParameterTree, Problem,
    SubmissionReturnMode, ThreadedConsumer,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const EVAL_DELAY: Duration = Duration::from_millis(100);

fn slow_problem() -> Arc<dyn Problem> {
    let adaptor = GaussianAdaptor::with_sigma(0.5).unwrap();
    FnProblem::shared(
        ParameterTree::float_vector(2, -1.0..1.0, adaptor),
        move |x| {
            thread::sleep(EVAL_DELAY);
            x.iter().map(|v| v * v).sum()
        },
    )
}

fn dirty_batch(problem: &dyn Problem, size: usize) -> (Vec<Individual>, Vec<Status>) {
    let batch = (0..size)
        .map(|_| Individual::new(problem.template()))
        .collect();
    (batch, vec![Status::Unprocessed; size])
}

#[test]
fn broker_incomplete_return_reports_partial_after_worker_death() {
    let broker = Broker::new();
    let problem = slow_problem();
    let consumer = ThreadedConsumer::start(Arc::clone(&broker), Arc::clone(&problem), 4);

    let mut executor = BrokerExecutor::new(
        Arc::clone(&broker),
        SubmissionReturnMode::IncompleteReturn,
        2.0,
        0,
    );

    // iteration 0: blocking wait, everything returns even though each
    // evaluation is slow
    let (mut batch, mut positions) = dirty_batch(problem.as_ref(), 20);
    let completeness = executor.work_on(0, &mut batch, &mut positions).unwrap();

    assert_eq!(completeness, Completeness::All);
    assert!(batch.iter().all(|individual| !individual.is_dirty()));

    // a worker "dies": it takes an item off the wire and never returns it
    let thief_broker = Arc::clone(&broker);
    let thief = thread::spawn(move || thief_broker.fetch(Duration::from_secs(10)).unwrap());

    let (mut batch, mut positions) = dirty_batch(problem.as_ref(), 20);
    let completeness = executor.work_on(1, &mut batch, &mut positions).unwrap();

    assert_eq!(completeness, Completeness::Partial);
    let unprocessed = positions
        .iter()
        .filter(|status| **status == Status::Unprocessed)
        .count();
    assert!(unprocessed >= 1, "expected at least one timed-out position");

    // conservation: every position is either processed or accounted as
    // unprocessed, nothing vanished
    let processed = positions
        .iter()
        .filter(|status| **status == Status::Processed)
        .count();
    assert_eq!(processed + unprocessed, 20);

    broker.shutdown();
    consumer.join();
    let _ = thief.join();
}

#[test]
fn broker_expect_full_return_waits_out_slow_workers() {
    let broker = Broker::new();
    let problem = slow_problem();
    let consumer = ThreadedConsumer::start(Arc::clone(&broker), Arc::clone(&problem), 4);

    let mut executor = BrokerExecutor::new(
        Arc::clone(&broker),
        SubmissionReturnMode::ExpectFullReturn,
        2.0,
        0,
    );

    for iteration in 0..3 {
        let (mut batch, mut positions) = dirty_batch(problem.as_ref(), 12);
        let completeness = executor
            .work_on(iteration, &mut batch, &mut positions)
            .unwrap();

        assert_eq!(completeness, Completeness::All);
    }

    broker.shutdown();
    consumer.join();
}
