// Job Run Store Port
// Persists the last successful fire of each job across restarts

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::JobId;
use crate::error::Result;

#[async_trait]
pub trait JobRunStore: Send + Sync {
    async fn record_success(&self, job_id: &str, at: DateTime<Utc>) -> Result<()>;

    async fn last_success(&self, job_id: &str) -> Result<Option<DateTime<Utc>>>;

    /// Every stored marker
    async fn list(&self) -> Result<Vec<(JobId, DateTime<Utc>)>>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, PoisonError};

    #[derive(Default)]
    pub struct InMemoryRunStore {
        markers: Mutex<HashMap<JobId, DateTime<Utc>>>,
    }

    #[async_trait]
    impl JobRunStore for InMemoryRunStore {
        async fn record_success(&self, job_id: &str, at: DateTime<Utc>) -> Result<()> {
            self.markers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(job_id.to_string(), at);
            Ok(())
        }

        async fn last_success(&self, job_id: &str) -> Result<Option<DateTime<Utc>>> {
            Ok(self
                .markers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(job_id)
                .copied())
        }

        async fn list(&self) -> Result<Vec<(JobId, DateTime<Utc>)>> {
            Ok(self
                .markers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect())
        }
    }
}
