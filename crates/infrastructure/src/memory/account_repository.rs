use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use orchestrator_domain::AccountRepository;
use orchestrator_errors::OrchestratorResult;

/// 内存账户仓储，只记录账户ID
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountRepository {
    accounts: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accounts: Arc::new(RwLock::new(accounts.into_iter().map(Into::into).collect())),
        }
    }

    pub async fn insert<S: Into<String>>(&self, id: S) {
        self.accounts.write().await.insert(id.into());
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn contains(&self, id: &str) -> OrchestratorResult<bool> {
        Ok(self.accounts.read().await.contains(id))
    }
}
