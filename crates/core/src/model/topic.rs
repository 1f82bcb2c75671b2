use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{IdError, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error(transparent)]
    InvalidId(#[from] IdError),

    #[error("topic name cannot be empty")]
    EmptyName,

    #[error("difficulty must be between 1 and 5, got {0}")]
    InvalidDifficulty(u8),

    #[error("topic {0} cannot list itself as a prerequisite")]
    SelfPrerequisite(TopicId),

    #[error("child {child} names parent {found}, expected {expected}")]
    ParentMismatch {
        child: TopicId,
        expected: TopicId,
        found: TopicId,
    },

    #[error("invalid child of {parent}: {source}")]
    Child {
        parent: TopicId,
        source: Box<TopicError>,
    },
}

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

fn default_difficulty() -> u8 {
    MIN_DIFFICULTY
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated topic as it appears in seed documents and query rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDraft {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub is_parent: bool,
    #[serde(default, alias = "subnodes", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TopicDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl TopicDraft {
    /// Starts a draft with the given id and name and default attributes.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prerequisites: Vec::new(),
            difficulty: MIN_DIFFICULTY,
            points: 0,
            categories: Vec::new(),
            is_parent: false,
            children: Vec::new(),
            parent_id: None,
        }
    }

    #[must_use]
    pub fn with_prerequisites<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: u8) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn with_points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }

    #[must_use]
    pub fn with_categories<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the draft as a parent and attaches the given children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<TopicDraft>) -> Self {
        self.is_parent = true;
        self.children = children;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Validate the draft into a `Topic`.
    ///
    /// Prerequisites are deduplicated keeping the first occurrence. Children
    /// without a `parent_id` inherit this topic's id.
    ///
    /// # Errors
    ///
    /// Returns `TopicError` for blank ids or names, out-of-range difficulty,
    /// a self prerequisite, or a child that names a different parent.
    pub fn validate(self) -> Result<Topic, TopicError> {
        let id = TopicId::new(self.id)?;

        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(TopicError::EmptyName);
        }

        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(TopicError::InvalidDifficulty(self.difficulty));
        }

        let mut prerequisites: Vec<TopicId> = Vec::with_capacity(self.prerequisites.len());
        for raw in self.prerequisites {
            let prereq = TopicId::new(raw)?;
            if prereq == id {
                return Err(TopicError::SelfPrerequisite(id));
            }
            if !prerequisites.contains(&prereq) {
                prerequisites.push(prereq);
            }
        }

        let categories = self
            .categories
            .into_iter()
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty())
            .collect();

        let parent_id = self.parent_id.map(TopicId::new).transpose()?;

        let mut children = Vec::with_capacity(self.children.len());
        for mut child in self.children {
            if child.parent_id.is_none() {
                child.parent_id = Some(id.as_str().to_owned());
            }
            let child = child.validate().map_err(|e| TopicError::Child {
                parent: id.clone(),
                source: Box::new(e),
            })?;
            if let Some(found) = child.parent_id() {
                if *found != id {
                    return Err(TopicError::ParentMismatch {
                        child: child.id().clone(),
                        expected: id,
                        found: found.clone(),
                    });
                }
            }
            children.push(child);
        }

        Ok(Topic {
            id,
            name,
            prerequisites,
            difficulty: self.difficulty,
            points: self.points,
            categories,
            is_parent: self.is_parent || !children.is_empty(),
            children,
            parent_id,
        })
    }
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// A node of the knowledge graph that a learner can complete.
///
/// Topics are immutable once validated; only a learner's completed set
/// changes at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TopicDraft", into = "TopicDraft")]
pub struct Topic {
    id: TopicId,
    name: String,
    prerequisites: Vec<TopicId>,
    difficulty: u8,
    points: u32,
    categories: Vec<String>,
    is_parent: bool,
    children: Vec<Topic>,
    parent_id: Option<TopicId>,
}

impl Topic {
    #[must_use]
    pub fn id(&self) -> &TopicId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn prerequisites(&self) -> &[TopicId] {
        &self.prerequisites
    }

    #[must_use]
    pub fn difficulty(&self) -> u8 {
        self.difficulty
    }

    /// Reward points granted on first completion.
    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// True when the topic groups other topics, even if the group is empty.
    #[must_use]
    pub fn is_parent(&self) -> bool {
        self.is_parent
    }

    #[must_use]
    pub fn children(&self) -> &[Topic] {
        &self.children
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<&TopicId> {
        self.parent_id.as_ref()
    }

    /// A topic without children counts toward progress statistics.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Replace the children of this topic, marking it as a parent.
    ///
    /// Used when rebuilding nesting from flat rows.
    pub(crate) fn set_children(&mut self, children: Vec<Topic>) {
        if !children.is_empty() {
            self.is_parent = true;
        }
        self.children = children;
    }

    pub(crate) fn take_children(&mut self) -> Vec<Topic> {
        std::mem::take(&mut self.children)
    }
}

impl TryFrom<TopicDraft> for Topic {
    type Error = TopicError;

    fn try_from(draft: TopicDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Topic> for TopicDraft {
    fn from(topic: Topic) -> Self {
        Self {
            id: topic.id.into(),
            name: topic.name,
            prerequisites: topic.prerequisites.into_iter().map(Into::into).collect(),
            difficulty: topic.difficulty,
            points: topic.points,
            categories: topic.categories,
            is_parent: topic.is_parent,
            children: topic.children.into_iter().map(TopicDraft::from).collect(),
            parent_id: topic.parent_id.map(Into::into),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_happy_path() {
        let topic = TopicDraft::new("css", "  CSS Basics ")
            .with_prerequisites(["html"])
            .with_difficulty(2)
            .with_points(50)
            .with_categories(["web", " "])
            .validate()
            .unwrap();

        assert_eq!(topic.id().as_str(), "css");
        assert_eq!(topic.name(), "CSS Basics");
        assert_eq!(topic.prerequisites(), &[TopicId::new("html").unwrap()]);
        assert_eq!(topic.difficulty(), 2);
        assert_eq!(topic.points(), 50);
        assert_eq!(topic.categories(), &["web".to_string()]);
        assert!(topic.is_leaf());
        assert!(!topic.is_parent());
    }

    #[test]
    fn validate_rejects_self_prerequisite() {
        let err = TopicDraft::new("a", "A")
            .with_prerequisites(["a"])
            .validate()
            .unwrap_err();
        assert_eq!(err, TopicError::SelfPrerequisite(TopicId::new("a").unwrap()));
    }

    #[test]
    fn validate_rejects_bad_difficulty_and_name() {
        let err = TopicDraft::new("a", "A")
            .with_difficulty(0)
            .validate()
            .unwrap_err();
        assert_eq!(err, TopicError::InvalidDifficulty(0));

        let err = TopicDraft::new("a", "   ").validate().unwrap_err();
        assert_eq!(err, TopicError::EmptyName);
    }

    #[test]
    fn validate_dedupes_prerequisites() {
        let topic = TopicDraft::new("c", "C")
            .with_prerequisites(["a", "b", "a"])
            .validate()
            .unwrap();
        let ids: Vec<&str> = topic.prerequisites().iter().map(TopicId::as_str).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn children_inherit_parent_id() {
        let topic = TopicDraft::new("js", "JavaScript")
            .with_children(vec![TopicDraft::new("js-dom", "DOM")])
            .validate()
            .unwrap();

        assert!(topic.is_parent());
        assert_eq!(topic.children().len(), 1);
        assert_eq!(
            topic.children()[0].parent_id(),
            Some(&TopicId::new("js").unwrap())
        );
    }

    #[test]
    fn child_with_foreign_parent_is_rejected() {
        let err = TopicDraft::new("js", "JavaScript")
            .with_children(vec![TopicDraft::new("dom", "DOM").with_parent("css")])
            .validate()
            .unwrap_err();
        assert!(matches!(err, TopicError::ParentMismatch { .. }));
    }

    #[test]
    fn parent_flag_without_children_is_kept() {
        let mut draft = TopicDraft::new("empty", "Empty group");
        draft.is_parent = true;
        let topic = draft.validate().unwrap();
        assert!(topic.is_parent());
        assert!(topic.is_leaf());
    }

    #[test]
    fn deserializes_application_field_names() {
        let json = r#"{
            "id": "react",
            "name": "React",
            "prerequisites": ["js"],
            "difficulty": 3,
            "points": 120,
            "isParent": true,
            "subnodes": [{ "id": "hooks", "name": "Hooks" }]
        }"#;
        let topic: Topic = serde_json::from_str(json).unwrap();
        assert!(topic.is_parent());
        assert_eq!(topic.children()[0].id().as_str(), "hooks");
        assert_eq!(topic.children()[0].difficulty(), MIN_DIFFICULTY);
    }

    #[test]
    fn deserialize_runs_validation() {
        let json = r#"{ "id": "a", "name": "A", "prerequisites": ["a"] }"#;
        assert!(serde_json::from_str::<Topic>(json).is_err());
    }
}
