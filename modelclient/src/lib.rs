//! `ModelClient` (§4.F): the one seam between the core and the generative
//! model. Accepts a prompt plus optional reference bytes and returns image
//! bytes and model metadata; timeouts and retries are this crate's
//! responsibility, not the Worker's.

mod client;
mod http;
mod mock;
mod types;

pub use client::ModelClient;
pub use http::{HttpModelClient, HttpModelClientConfig};
pub use mock::{MockModelClient, ScriptedOutcome};
pub use types::{ModelMetadata, ModelOptions, ModelOutput, ModelRequest, ReferenceImage};
