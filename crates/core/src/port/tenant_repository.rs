// Tenant Configuration Port

use async_trait::async_trait;

use crate::domain::TenantConfig;
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantConfigRepository: Send + Sync {
    async fn list_tenants(&self) -> Result<Vec<TenantConfig>>;

    async fn find(&self, tenant_id: &str) -> Result<Option<TenantConfig>>;
}

pub mod mocks {
    use super::*;

    /// Fixed tenant list
    pub struct StaticTenants(pub Vec<TenantConfig>);

    #[async_trait]
    impl TenantConfigRepository for StaticTenants {
        async fn list_tenants(&self) -> Result<Vec<TenantConfig>> {
            Ok(self.0.clone())
        }

        async fn find(&self, tenant_id: &str) -> Result<Option<TenantConfig>> {
            Ok(self.0.iter().find(|t| t.tenant_id == tenant_id).cloned())
        }
    }
}
