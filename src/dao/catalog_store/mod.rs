/// Flat-file JSON backend.
pub mod file;
/// In-memory backend.
pub mod memory;

use futures::future::BoxFuture;

use crate::dao::{
    models::{CatalogEntity, QuestionEntity},
    storage::StorageResult,
};

/// Abstraction over the question bank persistence.
///
/// The session engine only reads the catalog when a game starts; writes come
/// from the question bank REST API.
pub trait CatalogStore: Send + Sync {
    /// Read every question and declared category.
    fn load_catalog(&self) -> BoxFuture<'static, StorageResult<CatalogEntity>>;
    /// Persist a user-submitted question and return it as stored.
    fn append_user_question(
        &self,
        question: QuestionEntity,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>>;
    /// Declare a category; resolves to `false` when it already existed.
    fn add_category(&self, name: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Check the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
