use std::{io::ErrorKind, path::Path, sync::Arc};

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::{fs, sync::Mutex};
use tracing::debug;

use crate::{
    dao::{
        catalog_store::CatalogStore,
        models::{CatalogEntity, QuestionEntity},
        storage::StorageResult,
    },
    state::game::Provenance,
};

use super::{
    config::FileStoreConfig,
    error::{FileDaoError, FileResult},
};

/// Question bank persisted as JSON arrays on disk.
///
/// The curated file is never written. User submissions and categories are
/// rewritten through a temporary file and a rename, one writer at a time.
#[derive(Clone)]
pub struct FileCatalogStore {
    config: Arc<FileStoreConfig>,
    write_gate: Arc<Mutex<()>>,
}

impl FileCatalogStore {
    /// Open the store, creating the data directory when missing.
    pub async fn open(config: FileStoreConfig) -> FileResult<Self> {
        fs::create_dir_all(config.data_dir())
            .await
            .map_err(|source| FileDaoError::DataDir {
                path: config.data_dir().to_path_buf(),
                source,
            })?;

        Ok(Self {
            config: Arc::new(config),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    async fn read_list<T>(path: &Path) -> FileResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(FileDaoError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| FileDaoError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn write_list<T>(path: &Path, items: &[T]) -> FileResult<()>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec_pretty(items).map_err(|source| FileDaoError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload)
            .await
            .map_err(|source| FileDaoError::Write {
                path: staging.clone(),
                source,
            })?;
        fs::rename(&staging, path)
            .await
            .map_err(|source| FileDaoError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn read_catalog(&self) -> FileResult<CatalogEntity> {
        let mut curated: Vec<QuestionEntity> =
            Self::read_list(&self.config.curated_path()).await?;
        let user: Vec<QuestionEntity> = Self::read_list(&self.config.user_path()).await?;
        let categories: Vec<String> = Self::read_list(&self.config.categories_path()).await?;

        curated
            .iter_mut()
            .for_each(|question| question.source = Provenance::Curated);
        curated.extend(user.into_iter().map(|mut question| {
            question.source = Provenance::User;
            question
        }));

        Ok(CatalogEntity {
            questions: curated,
            categories,
        })
    }
}

impl CatalogStore for FileCatalogStore {
    fn load_catalog(&self) -> BoxFuture<'static, StorageResult<CatalogEntity>> {
        let store = self.clone();
        Box::pin(async move { store.read_catalog().await.map_err(Into::into) })
    }

    fn append_user_question(
        &self,
        mut question: QuestionEntity,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let _gate = store.write_gate.lock().await;
            let path = store.config.user_path();
            let mut user: Vec<QuestionEntity> = Self::read_list(&path).await?;

            question.source = Provenance::User;
            question.created_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
            user.push(question.clone());

            Self::write_list(&path, &user).await?;
            debug!(path = %path.display(), total = user.len(), "stored user question");
            Ok(question)
        })
    }

    fn add_category(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let _gate = store.write_gate.lock().await;
            let path = store.config.categories_path();
            let mut categories: Vec<String> = Self::read_list(&path).await?;

            if categories.contains(&name) {
                return Ok(false);
            }

            categories.push(name);
            Self::write_list(&path, &categories).await?;
            Ok(true)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let dir = store.config.data_dir();
            fs::metadata(dir)
                .await
                .map(|_| ())
                .map_err(|source| {
                    FileDaoError::DataDir {
                        path: dir.to_path_buf(),
                        source,
                    }
                    .into()
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use uuid::Uuid;

    use super::*;
    use crate::state::game::Difficulty;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("trivia-live-store-{}", Uuid::new_v4().simple()))
    }

    fn entity(text: &str) -> QuestionEntity {
        QuestionEntity {
            text: text.into(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            answer: 2,
            category: "history".into(),
            difficulty: Difficulty::High,
            source: Provenance::Curated,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn missing_files_read_as_empty_catalog() {
        let dir = scratch_dir();
        let store = FileCatalogStore::open(FileStoreConfig::new(&dir)).await.unwrap();

        let catalog = store.load_catalog().await.unwrap();
        assert!(catalog.questions.is_empty());
        assert!(catalog.categories.is_empty());

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn appended_questions_are_tagged_as_user_submissions() {
        let dir = scratch_dir();
        let config = FileStoreConfig::new(&dir);
        let store = FileCatalogStore::open(config.clone()).await.unwrap();
        fs::write(
            config.curated_path(),
            r#"[{"q":"Who painted the Mona Lisa?","options":["Da Vinci","Monet","Goya","Dali"],"answer":0,"category":"cultura","difficulty":"baja","source":"static"}]"#,
        )
        .await
        .unwrap();

        let stored = store
            .append_user_question(entity("When did the Berlin wall fall?"))
            .await
            .unwrap();
        assert_eq!(stored.source, Provenance::User);
        assert!(stored.created_at.is_some());

        let catalog = store.load_catalog().await.unwrap();
        assert_eq!(catalog.questions.len(), 2);
        assert_eq!(catalog.questions[0].source, Provenance::Curated);
        assert_eq!(catalog.questions[0].difficulty, Difficulty::Low);
        assert_eq!(catalog.questions[1].source, Provenance::User);

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn categories_are_only_created_once() {
        let dir = scratch_dir();
        let store = FileCatalogStore::open(FileStoreConfig::new(&dir)).await.unwrap();

        assert!(store.add_category("sports".into()).await.unwrap());
        assert!(!store.add_category("sports".into()).await.unwrap());
        assert_eq!(store.load_catalog().await.unwrap().categories, ["sports"]);

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_bank_file_is_reported() {
        let dir = scratch_dir();
        let config = FileStoreConfig::new(&dir);
        let store = FileCatalogStore::open(config.clone()).await.unwrap();
        fs::write(config.user_path(), "{not json").await.unwrap();

        assert!(store.load_catalog().await.is_err());

        fs::remove_dir_all(&dir).await.unwrap();
    }
}
