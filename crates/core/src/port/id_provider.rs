// Record identifiers for invoices, ledger entries and queued messages

pub trait IdProvider: Send + Sync {
    fn generate_id(&self) -> String;
}

/// Random v4 UUIDs
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// UUID-shaped IDs counting up from 1
    #[derive(Default)]
    pub struct SequentialIdProvider {
        next: AtomicU64,
    }

    impl IdProvider for SequentialIdProvider {
        fn generate_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{:08x}-0000-4000-8000-{:012x}", n, n)
        }
    }
}
