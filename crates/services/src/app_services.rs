use std::sync::Arc;

use storage::repository::Storage;
use storage::sample::sample_curriculum;

use crate::error::AppServicesError;
use crate::skill_tree::SkillTreeService;
use crate::Clock;

/// Assembles app-facing services over a storage backend.
#[derive(Clone)]
pub struct AppServices {
    skill_tree: Arc<SkillTreeService>,
    seeded_on_launch: bool,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, installing the bundled
    /// curriculum when none is stored yet.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or seeding fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock).await
    }

    /// Build services over in-memory repositories, seeded with the bundled
    /// curriculum.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the bundled curriculum is invalid.
    pub async fn in_memory(clock: Clock) -> Result<Self, AppServicesError> {
        Self::from_storage(Storage::in_memory(), clock).await
    }

    async fn from_storage(storage: Storage, clock: Clock) -> Result<Self, AppServicesError> {
        let skill_tree = Arc::new(SkillTreeService::new(
            clock,
            Arc::clone(&storage.curricula),
            Arc::clone(&storage.progress),
        ));
        let seeded_on_launch = ensure_curriculum(&skill_tree).await?;

        Ok(Self {
            skill_tree,
            seeded_on_launch,
        })
    }

    #[must_use]
    pub fn skill_tree(&self) -> Arc<SkillTreeService> {
        Arc::clone(&self.skill_tree)
    }

    /// True when this launch installed the bundled curriculum.
    #[must_use]
    pub fn seeded_on_launch(&self) -> bool {
        self.seeded_on_launch
    }
}

async fn ensure_curriculum(skill_tree: &SkillTreeService) -> Result<bool, AppServicesError> {
    if skill_tree.has_curriculum().await? {
        return Ok(false);
    }

    let curriculum = sample_curriculum()?;
    let revision = skill_tree.install_curriculum(&curriculum).await?;
    tracing::info!(revision, "installed bundled curriculum");
    Ok(true)
}
