use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::{
    dao::{
        catalog_store::CatalogStore,
        models::{CatalogEntity, QuestionEntity},
        storage::StorageResult,
    },
    state::game::Provenance,
};

/// Catalog kept entirely in memory, used by tests and demo setups.
#[derive(Clone, Default)]
pub struct MemoryCatalogStore {
    catalog: Arc<RwLock<CatalogEntity>>,
}

impl MemoryCatalogStore {
    /// Seed the store with an initial catalog.
    pub fn new(catalog: CatalogEntity) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
        }
    }
}

impl CatalogStore for MemoryCatalogStore {
    fn load_catalog(&self) -> BoxFuture<'static, StorageResult<CatalogEntity>> {
        let catalog = self.catalog.clone();
        Box::pin(async move { Ok(catalog.read().await.clone()) })
    }

    fn append_user_question(
        &self,
        mut question: QuestionEntity,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let catalog = self.catalog.clone();
        Box::pin(async move {
            question.source = Provenance::User;
            catalog.write().await.questions.push(question.clone());
            Ok(question)
        })
    }

    fn add_category(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
        let catalog = self.catalog.clone();
        Box::pin(async move {
            let mut guard = catalog.write().await;
            if guard.categories.contains(&name) {
                return Ok(false);
            }
            guard.categories.push(name);
            Ok(true)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
