//! Downstream result handling.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::AggregateResult;

/// Downstream consumer of finished searches, e.g. a PDF download subsystem.
///
/// Supplied to the client at construction time (there is no lazily created
/// default), and invoked with the final aggregate after every successful
/// search. A failure here is logged by the client and never fails the
/// search itself.
#[async_trait]
pub trait ResultHandler: Send + Sync {
    async fn handle(&self, result: &AggregateResult) -> Result<()>;
}
