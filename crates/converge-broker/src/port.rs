use crate::queue::BoundedQueue;
use converge_core::{Command, Individual};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Identifies a buffer port so completed items route back to the submitter
/// that owns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PortId(pub u64);

impl Display for PortId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "port-{}", self.0)
    }
}

/// The `(iteration, position)` tag assigned at submit time. On retrieval it
/// decides whether a returning item still belongs to the current iteration
/// or goes to the old-items sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTag {
    pub iteration: u32,
    pub position: usize,
}

/// One unit of work travelling between a submitter and a worker: the
/// individual to process, what to do with it, and the tag that routes the
/// result back into the right batch slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkItem {
    pub tag: ItemTag,
    pub command: Command,
    pub individual: Individual,
}

impl WorkItem {
    pub fn new(tag: ItemTag, command: Command, individual: Individual) -> Self {
        WorkItem {
            tag,
            command,
            individual,
        }
    }
}

/// A pair of bounded queues owned by the broker, one per submission site.
/// Submitters push to `to_worker` and read results from `from_worker`;
/// consumers do the reverse.
pub struct BufferPort {
    id: PortId,
    pub(crate) to_worker: BoundedQueue<WorkItem>,
    pub(crate) from_worker: BoundedQueue<WorkItem>,
}

impl BufferPort {
    pub(crate) fn new(id: PortId, capacity: usize) -> Self {
        BufferPort {
            id,
            to_worker: BoundedQueue::new(capacity),
            from_worker: BoundedQueue::new(capacity),
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    /// Results ready for the submitter.
    pub fn returns(&self) -> &BoundedQueue<WorkItem> {
        &self.from_worker
    }

    pub(crate) fn close(&self) {
        self.to_worker.close();
        self.from_worker.close();
    }
}
