use std::path::{Path, PathBuf};

const CURATED_FILE: &str = "curated-questions.json";
const USER_FILE: &str = "user-questions.json";
const CATEGORIES_FILE: &str = "categories.json";

/// Location of the flat-file question bank.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    data_dir: PathBuf,
}

impl FileStoreConfig {
    /// Store every bank file inside `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Directory holding the bank files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Read-only curated questions, produced by the offline bank tooling.
    pub fn curated_path(&self) -> PathBuf {
        self.data_dir.join(CURATED_FILE)
    }

    /// Questions submitted through the API.
    pub fn user_path(&self) -> PathBuf {
        self.data_dir.join(USER_FILE)
    }

    /// Declared category names.
    pub fn categories_path(&self) -> PathBuf {
        self.data_dir.join(CATEGORIES_FILE)
    }
}
