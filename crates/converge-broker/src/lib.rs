pub mod broker;
pub mod consumer;
pub mod executor;
pub mod port;
pub mod protocol;
pub mod queue;

pub use broker::{Broker, SubmitError};
pub use consumer::ThreadedConsumer;
pub use executor::{BrokerExecutor, SubmissionReturnMode};
pub use port::{BufferPort, ItemTag, PortId, WorkItem};
pub use protocol::{Request, Response, WireFormat, run_worker, serve};
pub use queue::{BoundedQueue, PushError};
