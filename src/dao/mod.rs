/// Question bank storage backends.
pub mod catalog_store;
/// Persisted model definitions.
pub mod models;
/// Storage abstraction layer errors.
pub mod storage;
