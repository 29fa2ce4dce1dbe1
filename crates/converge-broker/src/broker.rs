use crate::port::{BufferPort, PortId, WorkItem};
use crate::queue::PushError;
use converge_error::{ConvergeError, ConvergeResult};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

/// Why a submission did not reach a worker queue.
#[derive(Debug)]
pub enum SubmitError {
    /// The port's outbound queue stayed full for the whole timeout.
    Full(WorkItem),
    /// The broker is shutting down.
    Shutdown(WorkItem),
}

/// Matches submission sites to worker consumers.
///
/// The broker owns a set of [BufferPort]s, one per submission site. Work
/// pushed into a port's `to_worker` queue is handed to whichever consumer
/// asks next — consumers poll across all registered ports round-robin — and
/// the completed item is pushed back to the originating port's `from_worker`
/// queue. An item is held by exactly one worker at a time; resubmission is
/// the submitter's choice, never the broker's.
pub struct Broker {
    ports: Mutex<Vec<Arc<BufferPort>>>,
    cursor: AtomicUsize,
    next_port_id: AtomicU64,
    shutdown: AtomicBool,
    activity_lock: Mutex<()>,
    activity: Condvar,
}

impl Broker {
    pub fn new() -> Arc<Self> {
        Arc::new(Broker {
            ports: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            next_port_id: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            activity_lock: Mutex::new(()),
            activity: Condvar::new(),
        })
    }

    /// Registers a new buffer port with the given queue capacity.
    pub fn open_port(&self, capacity: usize) -> Arc<BufferPort> {
        let id = PortId(self.next_port_id.fetch_add(1, Ordering::Relaxed));
        let port = Arc::new(BufferPort::new(id, capacity));
        self.ports.lock().unwrap().push(Arc::clone(&port));
        port
    }

    /// Deregisters a port. In-flight items addressed to it are lost; workers
    /// trying to return to it fall through to [put]'s missing-port path.
    pub fn close_port(&self, id: PortId) {
        let mut ports = self.ports.lock().unwrap();
        if let Some(idx) = ports.iter().position(|p| p.id() == id) {
            let port = ports.remove(idx);
            port.close();
        }
    }

    /// Submits one work item to a port, blocking up to `timeout` when the
    /// queue is full.
    pub fn submit(
        &self,
        port: &BufferPort,
        item: WorkItem,
        timeout: Duration,
    ) -> Result<(), SubmitError> {
        if self.is_shutdown() {
            return Err(SubmitError::Shutdown(item));
        }

        match port.to_worker.push(item, timeout) {
            Ok(()) => {
                self.notify();
                Ok(())
            }
            Err(PushError::Full(item)) => Err(SubmitError::Full(item)),
            Err(PushError::Closed(item)) => Err(SubmitError::Shutdown(item)),
        }
    }

    /// Consumer side: takes the next available item, scanning ports
    /// round-robin. Returns `Ok(None)` when nothing arrived within the
    /// timeout and `BrokerShutdown` once the broker has been shut down.
    pub fn fetch(&self, timeout: Duration) -> ConvergeResult<Option<(PortId, WorkItem)>> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_shutdown() {
                return Err(ConvergeError::BrokerShutdown);
            }

            if let Some(found) = self.poll_ports() {
                return Ok(Some(found));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let guard = self.activity_lock.lock().unwrap();
            let _ = self.activity.wait_timeout(guard, deadline - now).unwrap();
        }
    }

    fn poll_ports(&self) -> Option<(PortId, WorkItem)> {
        let ports = self.ports.lock().unwrap();
        if ports.is_empty() {
            return None;
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..ports.len() {
            let port = &ports[(start + offset) % ports.len()];
            if let Some(item) = port.to_worker.try_pop() {
                return Some((port.id(), item));
            }
        }

        None
    }

    /// Consumer side: routes a completed item back to its port's return
    /// queue. A vanished port marks the item lost; that is the submitter's
    /// timeout to deal with.
    pub fn put(&self, port_id: PortId, item: WorkItem) -> ConvergeResult<()> {
        let port = {
            let ports = self.ports.lock().unwrap();
            ports.iter().find(|p| p.id() == port_id).cloned()
        };

        match port {
            Some(port) => match port.from_worker.push(item, Duration::from_secs(10)) {
                Ok(()) => Ok(()),
                Err(PushError::Full(item)) | Err(PushError::Closed(item)) => {
                    warn!(
                        "dropping result for {} at iteration {}: return queue unavailable",
                        port_id, item.tag.iteration
                    );
                    Ok(())
                }
            },
            None => {
                warn!(
                    "dropping result for missing {} at iteration {}",
                    port_id, item.tag.iteration
                );
                Ok(())
            }
        }
    }

    /// Signals shutdown and wakes every consumer blocked in [fetch].
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn notify(&self) {
        let _guard = self.activity_lock.lock().unwrap();
        self.activity.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::ItemTag;
    use converge_core::params::{GaussianAdaptor, ParameterTree};
    use converge_core::{Command, Individual};

    fn item(iteration: u32, position: usize) -> WorkItem {
        let adaptor = GaussianAdaptor::with_sigma(0.5).unwrap();
        let tree = ParameterTree::float_vector(2, -1.0..1.0, adaptor);
        WorkItem::new(
            ItemTag {
                iteration,
                position,
            },
            Command::Evaluate,
            Individual::new(tree),
        )
    }

    #[test]
    fn test_fetch_round_robin_across_ports() {
        let broker = Broker::new();
        let port_a = broker.open_port(8);
        let port_b = broker.open_port(8);

        broker
            .submit(&port_a, item(0, 0), Duration::from_millis(50))
            .unwrap();
        broker
            .submit(&port_b, item(0, 1), Duration::from_millis(50))
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let (port_id, _) = broker.fetch(Duration::from_millis(100)).unwrap().unwrap();
            seen.push(port_id);
        }

        seen.sort();
        assert_eq!(seen, vec![port_a.id(), port_b.id()]);
    }

    #[test]
    fn test_put_routes_to_originating_port() {
        let broker = Broker::new();
        let port_a = broker.open_port(8);
        let _port_b = broker.open_port(8);

        broker
            .submit(&port_a, item(3, 7), Duration::from_millis(50))
            .unwrap();
        let (port_id, fetched) = broker.fetch(Duration::from_millis(100)).unwrap().unwrap();
        broker.put(port_id, fetched).unwrap();

        let returned = port_a.returns().pop_timeout(Duration::from_millis(100));
        let returned = returned.expect("result routed back");
        assert_eq!(returned.tag, ItemTag { iteration: 3, position: 7 });
    }

    #[test]
    fn test_fetch_times_out_empty() {
        let broker = Broker::new();
        let _port = broker.open_port(4);

        let result = broker.fetch(Duration::from_millis(30)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_fetch_after_shutdown() {
        let broker = Broker::new();
        broker.shutdown();

        match broker.fetch(Duration::from_millis(10)) {
            Err(ConvergeError::BrokerShutdown) => {}
            other => panic!("expected BrokerShutdown, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_put_to_missing_port_is_lost_not_fatal() {
        let broker = Broker::new();
        let port = broker.open_port(4);
        let id = port.id();

        broker
            .submit(&port, item(0, 0), Duration::from_millis(50))
            .unwrap();
        let (_, fetched) = broker.fetch(Duration::from_millis(100)).unwrap().unwrap();

        broker.close_port(id);
        assert!(broker.put(id, fetched).is_ok());
    }
}
