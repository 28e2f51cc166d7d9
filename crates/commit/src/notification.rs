//! Block commit events and the per-transaction notifications derived from them.

use ledgergate_core::ValidationCode;
use std::collections::HashMap;

/// One committed block as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCommit {
    pub block_number: u64,
    /// Validation outcome of every transaction in the block.
    pub tx_validation_codes: HashMap<String, ValidationCode>,
}

impl BlockCommit {
    /// An empty commit for `block_number`.
    pub fn new(block_number: u64) -> Self {
        Self {
            block_number,
            tx_validation_codes: HashMap::new(),
        }
    }

    /// Add a transaction outcome.
    pub fn with_transaction(
        mut self,
        transaction_id: impl Into<String>,
        validation_code: ValidationCode,
    ) -> Self {
        self.tx_validation_codes
            .insert(transaction_id.into(), validation_code);
        self
    }
}

/// Final status of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub block_number: u64,
    pub transaction_id: String,
    pub validation_code: ValidationCode,
}
