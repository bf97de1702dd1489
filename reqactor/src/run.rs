//! Wires a `GenerationWorker` into the broker's `consume` pool.
//!
//! Grounded on `reqactor/src/actor.rs`'s `serve_in_background`: a single
//! bounded-concurrency pool per queue, registered once at boot.

use std::sync::Arc;

use imagegen_broker::Broker;
use imagegen_orchestrator::GENERATION_QUEUE;
use tokio::task::JoinHandle;

use crate::pipeline::GenerationWorker;

/// Default concurrency for the image-generation queue (§9's configuration
/// defaults, not an invariant — operators may size this to their
/// ModelClient's own throughput).
pub const DEFAULT_WORKER_CONCURRENCY: usize = 3;

/// Registers `worker` as the consumer of the generation queue at
/// `concurrency`. Returns the background task handle; the pool runs until
/// the broker (and this handle) is dropped.
pub fn spawn_generation_worker(
    broker: &Arc<Broker>,
    worker: Arc<GenerationWorker>,
    concurrency: usize,
) -> JoinHandle<()> {
    broker.consume(
        GENERATION_QUEUE,
        concurrency,
        Arc::new(move |handle| {
            let worker = worker.clone();
            Box::pin(async move { worker.process(handle).await })
        }),
    )
}
