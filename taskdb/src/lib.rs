//! The job Broker (§4.D): durable-within-process FIFO queues keyed by
//! name, with priority lanes, delayed retry, per-queue concurrency, and
//! progress reporting.

mod broker;
mod error;
mod handle;
mod queue;
mod record;

pub use broker::{Broker, Handler, HandlerFuture, DEFAULT_VISIBILITY_TIMEOUT};
pub use error::{BrokerError, BrokerResult};
pub use handle::JobHandle;
pub use record::EnqueueOptions;
