use crate::broker::Broker;
use crate::port::{PortId, WorkItem};
use converge_core::Problem;
use converge_error::{ConvergeError, ConvergeResult, converge_err};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Client/server message pair for remote workers. The transport carrying
/// these messages is out of scope; any byte pipe that can move an encoded
/// [Request] one way and a [Response] the other will do.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Request {
    /// Ask for the next available work item.
    Fetch,
    /// Return a completed work item to its originating port.
    Put { port: PortId, item: WorkItem },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Response {
    /// No work available right now.
    Empty,
    /// A work item and the port it must be returned to.
    Work { port: PortId, item: WorkItem },
    /// A put was accepted.
    Ack,
    /// The broker is gone; the worker should terminate its loop.
    Shutdown,
}

/// Encoding negotiated at connection time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Text,
    Structured,
    Binary,
}

impl WireFormat {
    pub fn encode<T: Serialize>(&self, message: &T) -> ConvergeResult<Vec<u8>> {
        match self {
            WireFormat::Text => serde_json::to_vec_pretty(message)
                .map_err(|e| converge_err!(Evaluation: "encode failed: {}", e)),
            WireFormat::Structured => serde_json::to_vec(message)
                .map_err(|e| converge_err!(Evaluation: "encode failed: {}", e)),
            WireFormat::Binary => bincode::serialize(message)
                .map_err(|e| converge_err!(Evaluation: "encode failed: {}", e)),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> ConvergeResult<T> {
        match self {
            WireFormat::Text | WireFormat::Structured => serde_json::from_slice(bytes)
                .map_err(|e| converge_err!(Evaluation: "decode failed: {}", e)),
            WireFormat::Binary => bincode::deserialize(bytes)
                .map_err(|e| converge_err!(Evaluation: "decode failed: {}", e)),
        }
    }
}

/// Server side of the protocol: answers one request against the broker.
/// `fetch_timeout` bounds how long a `Fetch` may wait for work before
/// answering `Empty`.
pub fn serve(
    broker: &Broker,
    request: Request,
    fetch_timeout: Duration,
) -> ConvergeResult<Response> {
    match request {
        Request::Fetch => match broker.fetch(fetch_timeout) {
            Ok(Some((port, item))) => Ok(Response::Work { port, item }),
            Ok(None) => Ok(Response::Empty),
            Err(ConvergeError::BrokerShutdown) => Ok(Response::Shutdown),
            Err(err) => Err(err),
        },
        Request::Put { port, item } => {
            broker.put(port, item)?;
            Ok(Response::Ack)
        }
    }
}

/// Client loop of a remote worker: fetch, process, put, until the server
/// reports shutdown. A failing objective is not fatal — the still-dirty
/// individual travels back and the submitter treats it as unprocessed.
pub fn run_worker<T>(problem: &dyn Problem, mut transport: T) -> ConvergeResult<()>
where
    T: FnMut(Request) -> ConvergeResult<Response>,
{
    loop {
        match transport(Request::Fetch)? {
            Response::Shutdown => return Ok(()),
            Response::Empty | Response::Ack => continue,
            Response::Work { port, mut item } => {
                let _ = item.individual.process(item.command, problem);
                transport(Request::Put { port, item })?;
            }
        }
    }
}
