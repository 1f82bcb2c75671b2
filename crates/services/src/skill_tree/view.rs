use chrono::NaiveDate;
use serde::Serialize;
use skill_core::model::{CompletedSet, Topic, TopicId, UserId, UserProgress, POINTS_PER_LEVEL};
use skill_core::progress::subtree_summary;
use skill_core::{
    CategoryProgress, NodeRef, NodeState, ProgressSummary, TopicIndex, VisibleKind, VisibleNode,
};

/// One visible row of the knowledge graph, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphRow {
    pub id: String,
    pub name: String,
    pub depth: usize,
    pub kind: VisibleKind,
    pub expanded: bool,
    /// Classification for topic rows; `None` for categories.
    pub state: Option<NodeState>,
    /// Leaf progress beneath categories and parent topics. A topic listed
    /// under several categories counts toward the first one only.
    pub summary: Option<ProgressSummary>,
    pub points: Option<u32>,
    pub color: Option<String>,
}

impl GraphRow {
    pub(crate) fn from_visible(
        row: &VisibleNode<'_>,
        index: &TopicIndex<'_>,
        completed: &CompletedSet,
        categories: &[CategoryProgress],
    ) -> Self {
        let (state, summary, points, color) = match (row.node, row.kind) {
            (NodeRef::Category(category), _) => (
                None,
                Some(
                    categories
                        .iter()
                        .find(|c| c.id == *category.id())
                        .map_or_else(|| subtree_summary(row.node, completed), |c| c.summary),
                ),
                None,
                Some(category.color().to_owned()),
            ),
            (NodeRef::Topic(topic), VisibleKind::ParentTopic) => (
                Some(index.classify(topic.id().as_str(), completed)),
                Some(subtree_summary(row.node, completed)),
                Some(topic.points()),
                None,
            ),
            (NodeRef::Topic(topic), _) => (
                Some(index.classify(topic.id().as_str(), completed)),
                None,
                Some(topic.points()),
                None,
            ),
        };

        Self {
            id: row.key().to_owned(),
            name: row.name().to_owned(),
            depth: row.depth,
            kind: row.kind,
            expanded: row.expanded,
            state,
            summary,
            points,
            color,
        }
    }
}

/// A learner's scalar counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LearnerStats {
    pub user_id: UserId,
    pub points: u32,
    pub level: u32,
    pub streak: u32,
    pub last_active_on: Option<NaiveDate>,
    pub points_to_next_level: u32,
}

impl LearnerStats {
    #[must_use]
    pub fn from_progress(progress: &UserProgress) -> Self {
        let next_level_at = progress.level().saturating_mul(POINTS_PER_LEVEL);
        Self {
            user_id: progress.user_id(),
            points: progress.points(),
            level: progress.level(),
            streak: progress.streak(),
            last_active_on: progress.last_active_on(),
            points_to_next_level: next_level_at.saturating_sub(progress.points()),
        }
    }
}

/// Everything needed to render the graph for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphView {
    pub title: String,
    pub curriculum_revision: u64,
    pub rows: Vec<GraphRow>,
    pub overall: ProgressSummary,
    pub categories: Vec<CategoryProgress>,
    pub learner: LearnerStats,
}

/// A topic the learner can start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextTopic {
    pub id: TopicId,
    pub name: String,
    pub difficulty: u8,
    pub points: u32,
}

impl From<&Topic> for NextTopic {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id().clone(),
            name: topic.name().to_owned(),
            difficulty: topic.difficulty(),
            points: topic.points(),
        }
    }
}

/// Outcome of the "complete a topic" action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub topic_id: TopicId,
    pub already_completed: bool,
    pub points_awarded: u32,
    pub leveled_up: bool,
    pub learner: LearnerStats,
    pub newly_available: Vec<NextTopic>,
}
