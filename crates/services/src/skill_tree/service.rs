use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use skill_core::model::{Completion, Curriculum, TopicId, UserId, UserProgress};
use skill_core::progress::category_progress;
use skill_core::{
    flatten_topics, flatten_visible, summarize, CategoryProgress, MemoKey, NodeState,
    ProgressMemo, ProgressSummary, TopicIndex,
};
use storage::repository::{CurriculumRepository, ProgressRepository, StoredCurriculum};

use super::view::{CompletionReport, GraphRow, GraphView, LearnerStats, NextTopic};
use crate::error::SkillTreeError;
use crate::Clock;

/// Learners whose statistics are memoized at once.
pub const DEFAULT_MEMO_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct GraphStats {
    overall: ProgressSummary,
    categories: Vec<CategoryProgress>,
}

/// Orchestrates the knowledge graph for learners: views, stats and the
/// "complete a topic" action.
#[derive(Clone)]
pub struct SkillTreeService {
    clock: Clock,
    curricula: Arc<dyn CurriculumRepository>,
    progress: Arc<dyn ProgressRepository>,
    stats: Arc<Mutex<HashMap<UserId, ProgressMemo<GraphStats>>>>,
    memo_capacity: usize,
}

impl SkillTreeService {
    #[must_use]
    pub fn new(
        clock: Clock,
        curricula: Arc<dyn CurriculumRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            curricula,
            progress,
            stats: Arc::new(Mutex::new(HashMap::new())),
            memo_capacity: DEFAULT_MEMO_CAPACITY,
        }
    }

    /// Cap the number of learners with memoized statistics; when full, an
    /// arbitrary entry is evicted to make room. A capacity of 0 disables the
    /// memo.
    #[must_use]
    pub fn with_memo_capacity(mut self, capacity: usize) -> Self {
        self.memo_capacity = capacity;
        self
    }

    /// Validate and store a curriculum, replacing the current one.
    ///
    /// # Errors
    ///
    /// Returns `SkillTreeError::Graph` if a prerequisite is unknown or the
    /// prerequisites form a cycle, or `SkillTreeError::Storage` on failure to
    /// persist.
    pub async fn install_curriculum(&self, curriculum: &Curriculum) -> Result<u64, SkillTreeError> {
        let index = TopicIndex::from_nodes(&curriculum.nodes);
        index.validate()?;
        let revision = self
            .curricula
            .save_curriculum(curriculum, self.clock.now())
            .await?;
        tracing::info!(
            revision,
            title = %curriculum.title,
            topics = index.len(),
            "curriculum installed"
        );
        Ok(revision)
    }

    /// Whether a curriculum has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns `SkillTreeError::Storage` if the repository cannot be read.
    pub async fn has_curriculum(&self) -> Result<bool, SkillTreeError> {
        Ok(self.curricula.load_curriculum().await?.is_some())
    }

    async fn curriculum(&self) -> Result<StoredCurriculum, SkillTreeError> {
        self.curricula
            .load_curriculum()
            .await?
            .ok_or(SkillTreeError::NoCurriculum)
    }

    async fn progress_for(&self, user_id: UserId) -> Result<UserProgress, SkillTreeError> {
        let progress = self.progress.load_progress(user_id).await?;
        Ok(progress.unwrap_or_else(|| UserProgress::new(user_id)))
    }

    fn stats_for(&self, stored: &StoredCurriculum, progress: &UserProgress) -> GraphStats {
        let key = MemoKey {
            curriculum_revision: stored.revision,
            progress_revision: progress.revision(),
        };
        let compute = || {
            tracing::debug!(user_id = %progress.user_id(), ?key, "recomputing graph stats");
            let nodes = &stored.curriculum.nodes;
            GraphStats {
                overall: summarize(flatten_topics(nodes), progress.completed()),
                categories: category_progress(nodes, progress.completed()),
            }
        };
        if self.memo_capacity == 0 {
            return compute();
        }

        let user_id = progress.user_id();
        let mut memos = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if !memos.contains_key(&user_id) && memos.len() >= self.memo_capacity {
            if let Some(evicted) = memos.keys().next().copied() {
                memos.remove(&evicted);
            }
        }
        memos.entry(user_id).or_default().get_or_compute(key, compute)
    }

    #[cfg(test)]
    fn memoized_users(&self) -> usize {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Rows visible under the given expansion state, with per-topic state and
    /// progress statistics for the learner.
    ///
    /// # Errors
    ///
    /// Returns `SkillTreeError::NoCurriculum` if nothing is installed, or
    /// `SkillTreeError::Storage` on repository failure.
    pub async fn graph_view(
        &self,
        user_id: UserId,
        expanded: &HashSet<String>,
    ) -> Result<GraphView, SkillTreeError> {
        let stored = self.curriculum().await?;
        let progress = self.progress_for(user_id).await?;

        let nodes = &stored.curriculum.nodes;
        let index = TopicIndex::from_nodes(nodes);
        let stats = self.stats_for(&stored, &progress);
        let rows = flatten_visible(nodes, expanded)
            .iter()
            .map(|row| GraphRow::from_visible(row, &index, progress.completed(), &stats.categories))
            .collect();

        Ok(GraphView {
            title: stored.curriculum.title.clone(),
            curriculum_revision: stored.revision,
            rows,
            overall: stats.overall,
            categories: stats.categories,
            learner: LearnerStats::from_progress(&progress),
        })
    }

    /// Leaf topics the learner can start now, in curriculum order.
    ///
    /// # Errors
    ///
    /// Returns `SkillTreeError::NoCurriculum` or `SkillTreeError::Storage`.
    pub async fn next_topics(&self, user_id: UserId) -> Result<Vec<NextTopic>, SkillTreeError> {
        let stored = self.curriculum().await?;
        let progress = self.progress_for(user_id).await?;
        let index = TopicIndex::from_nodes(&stored.curriculum.nodes);

        Ok(index
            .available(progress.completed())
            .into_iter()
            .filter(|topic| topic.is_leaf())
            .map(NextTopic::from)
            .collect())
    }

    /// Classify a single topic for the learner. Unknown ids are `Locked`.
    ///
    /// # Errors
    ///
    /// Returns `SkillTreeError::NoCurriculum` or `SkillTreeError::Storage`.
    pub async fn topic_state(
        &self,
        user_id: UserId,
        topic_id: &str,
    ) -> Result<NodeState, SkillTreeError> {
        let stored = self.curriculum().await?;
        let progress = self.progress_for(user_id).await?;
        let index = TopicIndex::from_nodes(&stored.curriculum.nodes);
        Ok(index.classify(topic_id, progress.completed()))
    }

    /// Mark a leaf topic as completed for the learner.
    ///
    /// Completing an already-completed topic succeeds without touching
    /// storage and reports `already_completed`.
    ///
    /// # Errors
    ///
    /// Returns `SkillTreeError::UnknownTopic` for ids not in the curriculum,
    /// `SkillTreeError::ParentTopic` for topics that group other topics,
    /// `SkillTreeError::TopicLocked` while prerequisites are missing, and
    /// `SkillTreeError::Storage` if progress cannot be saved.
    #[tracing::instrument(skip(self))]
    pub async fn complete_topic(
        &self,
        user_id: UserId,
        topic_id: &str,
    ) -> Result<CompletionReport, SkillTreeError> {
        let stored = self.curriculum().await?;
        let index = TopicIndex::from_nodes(&stored.curriculum.nodes);
        let topic = index
            .get(topic_id)
            .ok_or_else(|| SkillTreeError::UnknownTopic(topic_id.to_owned()))?;
        if !topic.is_leaf() {
            return Err(SkillTreeError::ParentTopic(topic.id().clone()));
        }
        let progress = self.progress_for(user_id).await?;
        let completed = progress.completed();

        match index.classify(topic_id, completed) {
            NodeState::Completed => {
                tracing::debug!("topic already completed");
                return Ok(CompletionReport {
                    topic_id: topic.id().clone(),
                    already_completed: true,
                    points_awarded: 0,
                    leveled_up: false,
                    learner: LearnerStats::from_progress(&progress),
                    newly_available: Vec::new(),
                });
            }
            NodeState::Locked => {
                let missing: Vec<TopicId> = topic
                    .prerequisites()
                    .iter()
                    .filter(|p| !completed.contains(*p))
                    .cloned()
                    .collect();
                return Err(SkillTreeError::TopicLocked {
                    topic: topic.id().clone(),
                    missing,
                });
            }
            NodeState::Available => {}
        }

        let newly_available: Vec<NextTopic> = index
            .newly_available(topic_id, completed)
            .into_iter()
            .filter(|topic| topic.is_leaf())
            .map(NextTopic::from)
            .collect();
        let (next, outcome) = progress.complete(topic, self.clock.today());
        self.progress.save_progress(&next, self.clock.now()).await?;

        let (points_awarded, leveled_up) = match outcome {
            Completion::Recorded {
                points_awarded,
                leveled_up,
            } => (points_awarded, leveled_up),
            Completion::AlreadyCompleted => (0, false),
        };
        tracing::info!(
            points_awarded,
            level = next.level(),
            unlocked = newly_available.len(),
            "topic completed"
        );

        Ok(CompletionReport {
            topic_id: topic.id().clone(),
            already_completed: false,
            points_awarded,
            leveled_up,
            learner: LearnerStats::from_progress(&next),
            newly_available,
        })
    }

    /// The learner's counters; a learner without records starts at level 1.
    ///
    /// # Errors
    ///
    /// Returns `SkillTreeError::Storage` on repository failure.
    pub async fn learner_stats(&self, user_id: UserId) -> Result<LearnerStats, SkillTreeError> {
        let progress = self.progress_for(user_id).await?;
        Ok(LearnerStats::from_progress(&progress))
    }

    /// Completed topics with their completion time, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `SkillTreeError::Storage` on repository failure.
    pub async fn completion_history(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(TopicId, DateTime<Utc>)>, SkillTreeError> {
        Ok(self.progress.completion_history(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_core::VisibleKind;
    use skill_core::model::{CategoryDraft, GraphNode, TopicDraft};
    use skill_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn abc_curriculum() -> Curriculum {
        let topics: Vec<GraphNode> = vec![
            TopicDraft::new("a", "A").with_points(60).validate().unwrap().into(),
            TopicDraft::new("b", "B")
                .with_prerequisites(["a"])
                .with_points(60)
                .validate()
                .unwrap()
                .into(),
            TopicDraft::new("c", "C")
                .with_prerequisites(["a", "b"])
                .with_points(10)
                .validate()
                .unwrap()
                .into(),
        ];
        let basics = CategoryDraft::new("basics", "Basics")
            .with_children(topics)
            .validate()
            .unwrap();
        Curriculum::new("ABC", vec![basics.into()])
    }

    async fn service_with(curriculum: &Curriculum) -> (SkillTreeService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let service = SkillTreeService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        service.install_curriculum(curriculum).await.unwrap();
        (service, repo)
    }

    #[tokio::test]
    async fn graph_view_without_curriculum_fails() {
        let repo = InMemoryRepository::new();
        let service =
            SkillTreeService::new(Clock::fixed(fixed_now()), Arc::new(repo.clone()), Arc::new(repo));
        let err = service
            .graph_view(UserId::new(1), &HashSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::NoCurriculum));
    }

    #[tokio::test]
    async fn install_rejects_cycles() {
        let repo = InMemoryRepository::new();
        let service =
            SkillTreeService::new(Clock::fixed(fixed_now()), Arc::new(repo.clone()), Arc::new(repo));
        let cyclic = Curriculum::new(
            "Loop",
            vec![
                TopicDraft::new("a", "A").with_prerequisites(["b"]).validate().unwrap().into(),
                TopicDraft::new("b", "B").with_prerequisites(["a"]).validate().unwrap().into(),
            ],
        );
        let err = service.install_curriculum(&cyclic).await.unwrap_err();
        assert!(matches!(err, SkillTreeError::Graph(_)));
        assert!(!service.has_curriculum().await.unwrap());
    }

    #[tokio::test]
    async fn graph_view_classifies_rows() {
        let (service, _) = service_with(&abc_curriculum()).await;
        let user = UserId::new(1);
        service.complete_topic(user, "a").await.unwrap();

        let expanded: HashSet<String> = ["basics".to_string()].into_iter().collect();
        let view = service.graph_view(user, &expanded).await.unwrap();

        let states: Vec<(&str, Option<NodeState>)> = view
            .rows
            .iter()
            .map(|row| (row.id.as_str(), row.state))
            .collect();
        assert_eq!(
            states,
            vec![
                ("basics", None),
                ("a", Some(NodeState::Completed)),
                ("b", Some(NodeState::Available)),
                ("c", Some(NodeState::Locked)),
            ]
        );
        assert_eq!(view.rows[0].kind, VisibleKind::Category);
        assert_eq!(view.rows[0].summary, Some(ProgressSummary::from_counts(3, 1)));
        assert_eq!(view.overall.percentage, 33);
        assert_eq!(view.categories.len(), 1);
        assert_eq!(view.learner.points, 60);
    }

    #[tokio::test]
    async fn completing_locked_topic_is_rejected() {
        let (service, _) = service_with(&abc_curriculum()).await;
        let err = service.complete_topic(UserId::new(1), "c").await.unwrap_err();
        match err {
            SkillTreeError::TopicLocked { topic, missing } => {
                assert_eq!(topic.as_str(), "c");
                let missing: Vec<&str> = missing.iter().map(TopicId::as_str).collect();
                assert_eq!(missing, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_topic_is_rejected() {
        let (service, _) = service_with(&abc_curriculum()).await;
        let err = service
            .complete_topic(UserId::new(1), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::UnknownTopic(id) if id == "ghost"));
        assert_eq!(
            service.topic_state(UserId::new(1), "ghost").await.unwrap(),
            NodeState::Locked
        );
    }

    #[tokio::test]
    async fn completion_reports_unlocks_and_level() {
        let (service, repo) = service_with(&abc_curriculum()).await;
        let user = UserId::new(4);

        let first = service.complete_topic(user, "a").await.unwrap();
        assert!(!first.already_completed);
        assert_eq!(first.points_awarded, 60);
        assert!(!first.leveled_up);
        let unlocked: Vec<&str> = first.newly_available.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(unlocked, vec!["b"]);

        let second = service.complete_topic(user, "b").await.unwrap();
        assert!(second.leveled_up);
        assert_eq!(second.learner.level, 2);
        assert_eq!(second.newly_available[0].id.as_str(), "c");

        let stored = repo.load_progress(user).await.unwrap().unwrap();
        assert_eq!(stored.points(), 120);
        assert_eq!(stored.completed().len(), 2);
    }

    #[tokio::test]
    async fn completing_twice_is_idempotent() {
        let (service, repo) = service_with(&abc_curriculum()).await;
        let user = UserId::new(2);

        service.complete_topic(user, "a").await.unwrap();
        let before = repo.load_progress(user).await.unwrap().unwrap();

        let again = service.complete_topic(user, "a").await.unwrap();
        assert!(again.already_completed);
        assert_eq!(again.points_awarded, 0);

        let after = repo.load_progress(user).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn stats_follow_new_completions() {
        let (service, _) = service_with(&abc_curriculum()).await;
        let user = UserId::new(3);
        let expanded = HashSet::new();

        let view = service.graph_view(user, &expanded).await.unwrap();
        assert_eq!(view.overall, ProgressSummary::from_counts(3, 0));
        // second read hits the memo and must agree
        let view = service.graph_view(user, &expanded).await.unwrap();
        assert_eq!(view.overall, ProgressSummary::from_counts(3, 0));

        service.complete_topic(user, "a").await.unwrap();
        let view = service.graph_view(user, &expanded).await.unwrap();
        assert_eq!(view.overall, ProgressSummary::from_counts(3, 1));
    }

    #[tokio::test]
    async fn next_topics_lists_available_leaves() {
        let (service, _) = service_with(&abc_curriculum()).await;
        let user = UserId::new(8);
        let next = service.next_topics(user).await.unwrap();
        let ids: Vec<&str> = next.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);

        let history = service.completion_history(user).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn parent_topics_cannot_be_completed() {
        let js = TopicDraft::new("js", "JavaScript")
            .with_children(vec![TopicDraft::new("dom", "DOM").with_points(10)])
            .validate()
            .unwrap();
        let curriculum = Curriculum::new("JS", vec![js.into()]);
        let (service, repo) = service_with(&curriculum).await;
        let user = UserId::new(1);

        let err = service.complete_topic(user, "js").await.unwrap_err();
        assert!(matches!(err, SkillTreeError::ParentTopic(id) if id.as_str() == "js"));
        assert!(repo.load_progress(user).await.unwrap().is_none());

        let next = service.next_topics(user).await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].id.as_str(), "dom");
    }

    #[tokio::test]
    async fn memo_keeps_at_most_capacity_learners() {
        let (service, _) = service_with(&abc_curriculum()).await;
        let service = service.with_memo_capacity(2);
        let expanded = HashSet::new();

        for id in 1..=5 {
            service.graph_view(UserId::new(id), &expanded).await.unwrap();
        }
        assert_eq!(service.memoized_users(), 2);

        let (uncached, _) = service_with(&abc_curriculum()).await;
        let uncached = uncached.with_memo_capacity(0);
        uncached.graph_view(UserId::new(9), &expanded).await.unwrap();
        assert_eq!(uncached.memoized_users(), 0);
    }
}
