//! Transport seam between the batch engine and the network

use async_trait::async_trait;
use serde_json::Value;

use super::operations::{BatchResult, Command, Parameters};

/// Response of a single, unbatched method call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    /// The `result` payload
    pub result: Value,
    /// Total record count for listing methods
    pub total: Option<usize>,
    /// Start offset of the next page, if any
    pub next: Option<usize>,
}

/// Sends commands to the portal.
///
/// Implementations fail the whole call only on transport-level problems
/// (network, auth, malformed request). A command the portal rejects is an
/// error entry inside the returned [`BatchResult`], not an `Err`.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// One plain method call
    async fn call(&self, method: &str, parameters: &Parameters) -> anyhow::Result<ApiResponse>;

    /// One physical request carrying every command, results in submission order
    async fn execute_batch(&self, commands: &[Command]) -> anyhow::Result<BatchResult>;
}
