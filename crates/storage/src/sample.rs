//! Bundled sample curriculum used by the seed binary and first launch.

use chrono::NaiveDate;
use skill_core::model::{Curriculum, TopicId, UserProgress};
use skill_core::{NodeState, TopicIndex};
use thiserror::Error;

use crate::repository::StorageError;

/// Why a pre-seeded completion was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SeedError {
    #[error("unknown topic: {0}")]
    UnknownTopic(TopicId),

    #[error("topic {0} is locked; complete its prerequisites first")]
    Locked(TopicId),

    #[error("topic {0} groups other topics; complete its children instead")]
    ParentTopic(TopicId),
}

const SAMPLE_CURRICULUM: &str = include_str!("../seed/sample_curriculum.json");

/// Parse and validate a curriculum JSON document.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the document does not decode,
/// a topic or category fails validation, or the prerequisite graph refers to
/// unknown topics or contains a cycle.
pub fn parse_curriculum(json: &str) -> Result<Curriculum, StorageError> {
    let curriculum: Curriculum =
        serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
    TopicIndex::from_nodes(&curriculum.nodes)
        .validate()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(curriculum)
}

/// The bundled web-development curriculum.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the bundled document is invalid.
pub fn sample_curriculum() -> Result<Curriculum, StorageError> {
    parse_curriculum(SAMPLE_CURRICULUM)
}

/// Apply completions in order, with the same rules a learner is held to:
/// each topic must exist, be a leaf and have its prerequisites completed
/// (earlier ids in `ids` count). Already-completed ids are skipped.
///
/// # Errors
///
/// Returns the first `SeedError` hit; `progress` is not partially applied.
pub fn apply_completions(
    curriculum: &Curriculum,
    mut progress: UserProgress,
    ids: &[TopicId],
    today: NaiveDate,
) -> Result<UserProgress, SeedError> {
    let index = TopicIndex::from_nodes(&curriculum.nodes);
    for id in ids {
        let topic = index
            .get(id.as_str())
            .ok_or_else(|| SeedError::UnknownTopic(id.clone()))?;
        if !topic.is_leaf() {
            return Err(SeedError::ParentTopic(id.clone()));
        }
        if index.classify(id.as_str(), progress.completed()) == NodeState::Locked {
            return Err(SeedError::Locked(id.clone()));
        }
        progress = progress.complete(topic, today).0;
    }
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_core::flatten_topics;
    use skill_core::model::UserId;
    use skill_core::time::fixed_now;

    fn ids(raw: &[&str]) -> Vec<TopicId> {
        raw.iter().map(|id| TopicId::new(*id).unwrap()).collect()
    }

    #[test]
    fn bundled_sample_is_valid() {
        let curriculum = sample_curriculum().unwrap();
        assert_eq!(curriculum.title, "Web Development");
        let leaves = flatten_topics(&curriculum.nodes);
        assert_eq!(leaves.len(), 12);
    }

    #[test]
    fn cyclic_document_is_rejected() {
        let json = r#"{
            "title": "Broken",
            "nodes": [
                { "kind": "topic", "id": "a", "name": "A", "prerequisites": ["b"] },
                { "kind": "topic", "id": "b", "name": "B", "prerequisites": ["a"] }
            ]
        }"#;
        let err = parse_curriculum(json).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn unknown_prerequisite_is_rejected() {
        let json = r#"{
            "title": "Broken",
            "nodes": [{ "kind": "topic", "id": "a", "name": "A", "prerequisites": ["zzz"] }]
        }"#;
        assert!(parse_curriculum(json).is_err());
    }

    #[test]
    fn completions_follow_prerequisite_order() {
        let curriculum = sample_curriculum().unwrap();
        let today = fixed_now().date_naive();
        let progress = apply_completions(
            &curriculum,
            UserProgress::new(UserId::new(1)),
            &ids(&["html", "css", "js-basics"]),
            today,
        )
        .unwrap();
        assert_eq!(progress.completed().len(), 3);
        assert_eq!(progress.points(), 120);
    }

    #[test]
    fn locked_completion_is_refused() {
        let curriculum = sample_curriculum().unwrap();
        let err = apply_completions(
            &curriculum,
            UserProgress::new(UserId::new(1)),
            &ids(&["cli", "deploy"]),
            fixed_now().date_naive(),
        )
        .unwrap_err();
        assert_eq!(err, SeedError::Locked(TopicId::new("deploy").unwrap()));
    }

    #[test]
    fn parent_and_unknown_topics_are_refused() {
        let curriculum = sample_curriculum().unwrap();
        let fresh = UserProgress::new(UserId::new(1));
        let today = fixed_now().date_naive();

        let err = apply_completions(&curriculum, fresh.clone(), &ids(&["javascript"]), today)
            .unwrap_err();
        assert_eq!(err, SeedError::ParentTopic(TopicId::new("javascript").unwrap()));

        let err = apply_completions(&curriculum, fresh, &ids(&["cobol"]), today).unwrap_err();
        assert_eq!(err, SeedError::UnknownTopic(TopicId::new("cobol").unwrap()));
    }
}
