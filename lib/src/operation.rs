//! `OperationType`: the priced catalog of generation operations.
//!
//! Rows are seeded by migration with the three operation names the system
//! ships with, but the Ledger/Orchestrator always read the live row rather
//! than a compiled-in constant, so an operator can reprice without a
//! redeploy. Admin CRUD over this table beyond the seed is out of scope.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationType {
    pub name: String,
    pub tokens_per_operation: u32,
    pub active: bool,
}

impl OperationType {
    pub const TEXT_TO_IMAGE: &'static str = "text_to_image";
    pub const IMAGE_REFERENCE: &'static str = "image_reference";
    pub const IMAGE_MULTIPLE_REFERENCE: &'static str = "image_multiple_reference";
}
