use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of the transaction on whose behalf a page is accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocate a fresh, process-unique transaction id
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access mode requested when pinning a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

impl Permissions {
    /// Combine an already held permission with a new request
    pub fn upgrade(self, other: Permissions) -> Permissions {
        match (self, other) {
            (Permissions::ReadOnly, Permissions::ReadOnly) => Permissions::ReadOnly,
            _ => Permissions::ReadWrite,
        }
    }
}
