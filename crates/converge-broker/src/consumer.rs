use crate::broker::Broker;
use converge_core::Problem;
use converge_error::ConvergeError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// A group of in-process worker threads consuming work from a [Broker].
///
/// Each worker owns its RNG stream (thread-local, see the core random
/// provider) and loops: fetch, process, put back. A shutdown signal on the
/// broker is observed at the next fetch; the item currently being processed
/// is finished and its result pushed back as long as its port still exists.
pub struct ThreadedConsumer {
    handles: Vec<thread::JoinHandle<()>>,
}

impl ThreadedConsumer {
    pub fn start(broker: Arc<Broker>, problem: Arc<dyn Problem>, n_workers: usize) -> Self {
        let n_workers = if n_workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            n_workers
        };

        let handles = (0..n_workers)
            .map(|worker_id| {
                let broker = Arc::clone(&broker);
                let problem = Arc::clone(&problem);
                thread::spawn(move || worker_loop(worker_id, broker, problem))
            })
            .collect();

        ThreadedConsumer { handles }
    }

    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Blocks until every worker has observed the broker's shutdown signal
    /// and exited.
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(worker_id: usize, broker: Arc<Broker>, problem: Arc<dyn Problem>) {
    loop {
        match broker.fetch(POLL_TIMEOUT) {
            Err(ConvergeError::BrokerShutdown) => {
                debug!("worker {} exiting on shutdown", worker_id);
                break;
            }
            Err(err) => {
                warn!("worker {} fetch failed: {}", worker_id, err);
                break;
            }
            Ok(None) => continue,
            Ok(Some((port_id, mut item))) => {
                // a failing objective leaves the individual dirty; the item
                // is returned anyway and the submitter treats it as
                // unprocessed
                if let Err(err) = item.individual.process(item.command, problem.as_ref()) {
                    debug!(
                        "worker {} evaluation failed at iteration {} position {}: {}",
                        worker_id, item.tag.iteration, item.tag.position, err
                    );
                }

                let _ = broker.put(port_id, item);
            }
        }
    }
}
