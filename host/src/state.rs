//! `AppState`: the application context held by every handler (§9's design
//! note — singleton services wired as explicit collaborators, not
//! globals). Grounded on `ProverState` (`host/src/lib.rs`): a small
//! `Clone` struct of `Arc`-wrapped collaborators handed to axum via
//! `Router::with_state`.

use std::path::PathBuf;
use std::sync::Arc;

use imagegen_broker::Broker;
use imagegen_ledger::Ledger;
use imagegen_orchestrator::GenerationOrchestrator;
use imagegen_pushhub::{PushHub, SocketAuthenticator};
use imagegen_tempstore::TempFileStore;

use crate::auth::PrincipalVerifier;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<GenerationOrchestrator>,
    /// Read directly by the `/tokens/*` handlers; the Orchestrator holds
    /// its own copy for the write paths behind `submit_*`/`credit`.
    pub ledger: Ledger,
    pub broker: Arc<Broker>,
    pub pushhub: Arc<PushHub>,
    pub tempstore: Arc<TempFileStore>,
    /// Verifies the HTTP `Authorization: Bearer` header.
    pub verifier: Arc<dyn PrincipalVerifier>,
    /// Verifies the WebSocket handshake token. Built from the same
    /// underlying verifier at boot; kept as a separate field because the
    /// two traits are shaped for their respective call sites.
    pub socket_authenticator: Arc<dyn SocketAuthenticator>,
    pub max_upload_bytes: u64,
    /// Scratch directory multipart handlers write uploaded reference
    /// images into before handing them to the Orchestrator.
    pub scratch_root: PathBuf,
}
