//! Transaction identifiers and page access permissions.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a transaction.
///
/// IDs handed out by [`TransactionId::next`] are unique within the process
/// and increase monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Allocates a fresh transaction ID.
    pub fn next() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Access mode requested when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Shared access.
    ReadOnly,
    /// Exclusive access, required for mutation.
    ReadWrite,
}

impl Permission {
    /// Returns true for exclusive access.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Permission::ReadWrite)
    }
}
