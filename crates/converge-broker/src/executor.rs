use crate::broker::{Broker, SubmitError};
use crate::port::{BufferPort, ItemTag, WorkItem};
use converge_core::executor::{Completeness, Executor, OldItem, Status};
use converge_core::{Command, Individual};
use converge_error::{ConvergeError, ConvergeResult, converge_err};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);
const BLOCKING_SLICE: Duration = Duration::from_secs(3600);
const DEFAULT_PORT_CAPACITY: usize = 1024;

/// How long a broker executor waits for the current iteration's items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionReturnMode {
    /// Block until every item of the current iteration has returned.
    /// Unsafe when a worker can die holding an item.
    #[serde(rename = "expect_full")]
    ExpectFullReturn,
    /// Wait until `wait_factor x T` where `T` is the reference turnaround,
    /// then report whatever came back.
    #[serde(rename = "incomplete")]
    IncompleteReturn,
    /// As incomplete, plus up to `max_resubmissions` extra rounds for the
    /// items that timed out.
    #[serde(rename = "resubmit")]
    ResubmitAfterTimeout,
}

/// An [Executor] that hands its batch to broker-mediated workers.
///
/// Items are tagged `(iteration, position)` at submit time. Returns with the
/// current iteration tag land in their batch slot; returns with an older tag
/// go to the old-items sink for algorithms that can still use them. A return
/// for a position that is already processed is the race of a resubmitted
/// item with its original and is silently ignored.
///
/// The very first batch is waited on without a deadline; its mean turnaround
/// seeds the reference time `T`, which every later iteration refreshes from
/// its own returns.
pub struct BrokerExecutor {
    broker: Arc<Broker>,
    port: Arc<BufferPort>,
    srm: SubmissionReturnMode,
    wait_factor: f64,
    max_resubmissions: usize,
    reference: Option<Duration>,
    old_items: Vec<OldItem>,
}

impl BrokerExecutor {
    pub fn new(
        broker: Arc<Broker>,
        srm: SubmissionReturnMode,
        wait_factor: f64,
        max_resubmissions: usize,
    ) -> Self {
        let port = broker.open_port(DEFAULT_PORT_CAPACITY);

        BrokerExecutor {
            broker,
            port,
            srm,
            // a factor below one would time out before the reference
            // turnaround itself
            wait_factor: wait_factor.max(1.0),
            max_resubmissions,
            reference: None,
            old_items: Vec::new(),
        }
    }

    pub fn port(&self) -> &BufferPort {
        &self.port
    }

    fn submit_one(
        &self,
        iteration: u32,
        position: usize,
        individual: &Individual,
    ) -> ConvergeResult<()> {
        let item = WorkItem::new(
            ItemTag {
                iteration,
                position,
            },
            Command::Evaluate,
            individual.clone(),
        );

        self.broker
            .submit(&self.port, item, SUBMIT_TIMEOUT)
            .map_err(|err| match err {
                SubmitError::Shutdown(_) => ConvergeError::BrokerShutdown,
                SubmitError::Full(_) => {
                    converge_err!(Timeout(iteration): "submission queue stayed full")
                }
            })
    }

    /// Accepts one returning item. Decrements `outstanding` when the item
    /// answers a position this round is still waiting on.
    fn accept(
        &mut self,
        item: WorkItem,
        iteration: u32,
        batch: &mut [Individual],
        positions: &mut [Status],
        waiting: &mut [bool],
        outstanding: &mut usize,
        started: Instant,
        turnarounds: &mut Vec<Duration>,
    ) {
        if item.tag.iteration != iteration {
            self.old_items.push(OldItem {
                iteration: item.tag.iteration,
                position: item.tag.position,
                individual: item.individual,
            });
            return;
        }

        let position = item.tag.position;
        if position >= positions.len() {
            debug!("discarding return with out-of-range position {}", position);
            return;
        }

        if waiting[position] {
            waiting[position] = false;
            *outstanding -= 1;
            turnarounds.push(started.elapsed());
        }

        if positions[position] == Status::Processed {
            // resubmission race: the original and the resubmitted copy both
            // came home
            return;
        }

        if !item.individual.is_dirty() {
            batch[position] = item.individual;
            positions[position] = Status::Processed;
        }
    }

    fn wait_round(
        &mut self,
        iteration: u32,
        batch: &mut [Individual],
        positions: &mut [Status],
        waiting: &mut [bool],
        outstanding: &mut usize,
        deadline: Option<Instant>,
        started: Instant,
        turnarounds: &mut Vec<Duration>,
    ) {
        while *outstanding > 0 {
            let item = match deadline {
                None => self.port.from_worker.pop_timeout(BLOCKING_SLICE),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return;
                    }
                    self.port.from_worker.pop_deadline(deadline)
                }
            };

            match item {
                Some(item) => self.accept(
                    item,
                    iteration,
                    batch,
                    positions,
                    waiting,
                    outstanding,
                    started,
                    turnarounds,
                ),
                None if deadline.is_some() => return,
                None => {}
            }
        }
    }
}

impl Executor for BrokerExecutor {
    fn work_on(
        &mut self,
        iteration: u32,
        batch: &mut [Individual],
        positions: &mut [Status],
    ) -> ConvergeResult<Completeness> {
        let mut waiting = vec![false; batch.len()];
        let mut outstanding = 0usize;

        for idx in 0..batch.len() {
            if positions[idx] != Status::Unprocessed {
                continue;
            }
            if !batch[idx].is_dirty() {
                positions[idx] = Status::Processed;
                continue;
            }

            self.submit_one(iteration, idx, &batch[idx])?;
            waiting[idx] = true;
            outstanding += 1;
        }

        if outstanding == 0 {
            return Ok(Completeness::All);
        }

        let started = Instant::now();
        let mut turnarounds: Vec<Duration> = Vec::new();

        // first-ever batch: no reference turnaround yet, wait it out fully
        let blocking =
            self.reference.is_none() || self.srm == SubmissionReturnMode::ExpectFullReturn;

        let deadline = if blocking {
            None
        } else {
            Some(started + self.reference.unwrap().mul_f64(self.wait_factor))
        };

        self.wait_round(
            iteration,
            batch,
            positions,
            &mut waiting,
            &mut outstanding,
            deadline,
            started,
            &mut turnarounds,
        );

        if outstanding > 0 && self.srm == SubmissionReturnMode::ResubmitAfterTimeout {
            for _round in 0..self.max_resubmissions {
                if outstanding == 0 {
                    break;
                }

                let round_started = Instant::now();
                let mut resubmitted = 0usize;
                for idx in 0..batch.len() {
                    if positions[idx] == Status::Unprocessed && batch[idx].is_dirty() {
                        self.submit_one(iteration, idx, &batch[idx])?;
                        waiting[idx] = true;
                        resubmitted += 1;
                    }
                }

                outstanding = resubmitted;
                let reference = self.reference.unwrap_or_else(|| started.elapsed());
                let deadline = Some(round_started + reference.mul_f64(self.wait_factor));

                self.wait_round(
                    iteration,
                    batch,
                    positions,
                    &mut waiting,
                    &mut outstanding,
                    deadline,
                    started,
                    &mut turnarounds,
                );
            }
        }

        if !turnarounds.is_empty() {
            let total: Duration = turnarounds.iter().sum();
            self.reference = Some(total / turnarounds.len() as u32);
        }

        let completeness = if positions.iter().all(|s| *s == Status::Processed) {
            Completeness::All
        } else {
            debug!(
                "iteration {} returned partial: {} of {} positions unprocessed",
                iteration,
                positions.iter().filter(|s| **s == Status::Unprocessed).count(),
                positions.len()
            );
            Completeness::Partial
        };

        Ok(completeness)
    }

    fn drain_old(&mut self) -> Vec<OldItem> {
        std::mem::take(&mut self.old_items)
    }
}
