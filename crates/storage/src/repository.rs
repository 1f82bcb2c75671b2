use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skill_core::model::{Curriculum, TopicId, UserId, UserProgress};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A curriculum as persisted, with the revision assigned on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCurriculum {
    pub curriculum: Curriculum,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

/// Repository contract for the (single) curriculum document.
#[async_trait]
pub trait CurriculumRepository: Send + Sync {
    /// Replace the stored curriculum. Returns the new revision, starting at 1.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be encoded or stored.
    async fn save_curriculum(
        &self,
        curriculum: &Curriculum,
        saved_at: DateTime<Utc>,
    ) -> Result<u64, StorageError>;

    /// Fetch the stored curriculum, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the stored document cannot be read or decoded.
    async fn load_curriculum(&self) -> Result<Option<StoredCurriculum>, StorageError>;
}

/// Repository contract for per-learner progress.
///
/// Completed topic ids are append-only: saving never removes an id that was
/// stored before.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch a learner's progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn load_progress(&self, user_id: UserId) -> Result<Option<UserProgress>, StorageError>;

    /// Persist a learner's progress. Newly completed ids are stamped with
    /// `saved_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a newer revision is already stored.
    async fn save_progress(
        &self,
        progress: &UserProgress,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// When each topic was first completed by the learner, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn completion_history(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(TopicId, DateTime<Utc>)>, StorageError>;
}

#[derive(Default)]
struct ProgressEntry {
    progress: Option<UserProgress>,
    history: Vec<(TopicId, DateTime<Utc>)>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    curriculum: Arc<Mutex<Option<StoredCurriculum>>>,
    progress: Arc<Mutex<HashMap<UserId, ProgressEntry>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CurriculumRepository for InMemoryRepository {
    async fn save_curriculum(
        &self,
        curriculum: &Curriculum,
        saved_at: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let mut guard = self
            .curriculum
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let revision = guard.as_ref().map_or(0, |stored| stored.revision) + 1;
        *guard = Some(StoredCurriculum {
            curriculum: curriculum.clone(),
            revision,
            updated_at: saved_at,
        });
        Ok(revision)
    }

    async fn load_curriculum(&self) -> Result<Option<StoredCurriculum>, StorageError> {
        let guard = self
            .curriculum
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(&self, user_id: UserId) -> Result<Option<UserProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&user_id).and_then(|entry| entry.progress.clone()))
    }

    async fn save_progress(
        &self,
        progress: &UserProgress,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let entry = guard.entry(progress.user_id()).or_default();

        if let Some(stored) = &entry.progress {
            if stored == progress {
                return Ok(());
            }
            if stored.revision() >= progress.revision() {
                return Err(StorageError::Conflict);
            }
        }

        for id in progress.completed() {
            if !entry.history.iter().any(|(seen, _)| seen == id) {
                entry.history.push((id.clone(), saved_at));
            }
        }

        // keep ids stored earlier even if the caller dropped them
        let mut merged = progress.completed().clone();
        merged.extend(entry.history.iter().map(|(id, _)| id.clone()));
        let merged = UserProgress::from_persisted(
            progress.user_id(),
            merged,
            progress.points(),
            progress.level(),
            progress.streak(),
            progress.last_active_on(),
            progress.revision(),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        entry.progress = Some(merged);
        Ok(())
    }

    async fn completion_history(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(TopicId, DateTime<Utc>)>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .get(&user_id)
            .map(|entry| entry.history.clone())
            .unwrap_or_default())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub curricula: Arc<dyn CurriculumRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let curricula: Arc<dyn CurriculumRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self {
            curricula,
            progress,
        }
    }
}
