pub mod auth;
pub mod cli;
pub mod envelope;
pub mod error;
pub mod multipart;
pub mod server;
pub mod state;

pub use cli::Cli;
pub use error::{HostError, HostResult};
pub use state::AppState;
