//! The `GenerationOrchestrator` (§4.G): validates a generation request,
//! reserves tokens, resolves reference inputs, creates a `GenerationRecord`,
//! enqueues a job, and exposes read APIs over the records it creates.

mod error;
mod operations;
mod orchestrator;
mod payload;
mod store;
mod uploads;
mod validate;

pub use error::{OrchestratorError, OrchestratorResult};
pub use operations::OperationCatalog;
pub use orchestrator::{
    GenerationOrchestrator, ImageMultiReferenceRequest, ImageReferenceRequest, SubmitOutcome,
    TextToImageRequest, UploadInput, GENERATION_QUEUE,
};
pub use payload::JobPayload;
pub use store::{GenerationPage, GenerationStore, ListFilter, MAX_LIST_LIMIT};
pub use uploads::UploadStore;
pub use validate::{sanitize_and_validate_prompt, validate_number_of_images, MAX_PROMPT_LEN, MIN_PROMPT_LEN};
