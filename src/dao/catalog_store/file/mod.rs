mod config;
mod error;
mod store;

pub use config::FileStoreConfig;
pub use error::{FileDaoError, FileResult};
pub use store::FileCatalogStore;
