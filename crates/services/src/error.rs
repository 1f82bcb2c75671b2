//! Shared error types for the services crate.

use thiserror::Error;

use skill_core::GraphError;
use skill_core::model::TopicId;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `SkillTreeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SkillTreeError {
    #[error("no curriculum has been installed")]
    NoCurriculum,
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("topic {topic} is locked; missing prerequisites: {}", join_ids(.missing))]
    TopicLocked {
        topic: TopicId,
        missing: Vec<TopicId>,
    },
    #[error("topic {0} groups other topics; complete its children instead")]
    ParentTopic(TopicId),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn join_ids(ids: &[TopicId]) -> String {
    ids.iter()
        .map(TopicId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    SkillTree(#[from] SkillTreeError),
}
