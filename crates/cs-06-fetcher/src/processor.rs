//! # External Block Processors
//!
//! Plain callbacks invoked after a block's receipt pass with read-only
//! views of the committed data. Processor failures are logged and never
//! abort the commit.

use shared_types::{Block, Receipt};

/// A downstream consumer of committed blocks.
pub trait BlockProcessor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Handle one committed block and its receipts.
    fn process(
        &self,
        block: &Block,
        receipts: &[Receipt],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
