use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use services::{AppServices, SkillTreeError, SkillTreeService};
use skill_core::model::{TopicId, UserId, UserProgress};
use skill_core::time::fixed_clock;
use skill_core::{NodeState, ProgressSummary, VisibleKind};
use storage::repository::{
    CurriculumRepository, InMemoryRepository, ProgressRepository, StorageError,
};
use storage::sample::sample_curriculum;

fn ids<'a>(items: impl IntoIterator<Item = &'a TopicId>) -> Vec<&'a str> {
    items.into_iter().map(TopicId::as_str).collect()
}

#[tokio::test]
async fn first_launch_seeds_and_starts_with_entry_topics() {
    let services = AppServices::in_memory(fixed_clock()).await.unwrap();
    assert!(services.seeded_on_launch());

    let tree = services.skill_tree();
    let user = UserId::new(1);
    let next = tree.next_topics(user).await.unwrap();
    assert_eq!(ids(next.iter().map(|t| &t.id)), vec!["cli", "html", "sql"]);

    let view = tree.graph_view(user, &HashSet::new()).await.unwrap();
    assert_eq!(view.title, "Web Development");
    assert_eq!(view.overall, ProgressSummary::from_counts(12, 0));
    assert_eq!(view.learner.level, 1);
    let top: Vec<&str> = view.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(top, vec!["fundamentals", "frontend", "backend"]);
}

#[tokio::test]
async fn learning_path_unlocks_topics_and_levels_up() {
    let services = AppServices::in_memory(fixed_clock()).await.unwrap();
    let tree = services.skill_tree();
    let user = UserId::new(2);

    let err = tree.complete_topic(user, "react").await.unwrap_err();
    match err {
        SkillTreeError::TopicLocked { missing, .. } => {
            assert_eq!(ids(&missing), vec!["dom", "async-js"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let html = tree.complete_topic(user, "html").await.unwrap();
    assert_eq!(html.points_awarded, 30);
    assert_eq!(
        ids(html.newly_available.iter().map(|t| &t.id)),
        vec!["css", "js-basics"]
    );

    tree.complete_topic(user, "css").await.unwrap();
    let basics = tree.complete_topic(user, "js-basics").await.unwrap();
    assert!(basics.leveled_up);
    assert_eq!(basics.learner.points, 120);
    assert_eq!(basics.learner.level, 2);
    assert_eq!(basics.learner.points_to_next_level, 80);
    assert_eq!(
        ids(basics.newly_available.iter().map(|t| &t.id)),
        vec!["dom", "async-js"]
    );

    let expanded: HashSet<String> = ["frontend", "javascript"]
        .into_iter()
        .map(String::from)
        .collect();
    let view = tree.graph_view(user, &expanded).await.unwrap();
    let rows: Vec<(&str, usize)> = view.rows.iter().map(|r| (r.id.as_str(), r.depth)).collect();
    assert_eq!(
        rows,
        vec![
            ("fundamentals", 0),
            ("frontend", 0),
            ("html", 1),
            ("css", 1),
            ("javascript", 1),
            ("js-basics", 2),
            ("dom", 2),
            ("async-js", 2),
            ("frameworks", 1),
            ("backend", 0),
        ]
    );

    let js = &view.rows[4];
    assert_eq!(js.kind, VisibleKind::ParentTopic);
    assert!(js.expanded);
    assert_eq!(js.summary, Some(ProgressSummary::from_counts(3, 1)));
    assert_eq!(view.rows[6].state, Some(NodeState::Available));
    assert_eq!(view.overall.percentage, 25);

    let frontend = view
        .categories
        .iter()
        .find(|c| c.id.as_str() == "frontend")
        .unwrap();
    assert_eq!(frontend.summary, ProgressSummary::from_counts(6, 3));

    let history = tree.completion_history(user).await.unwrap();
    assert_eq!(
        ids(history.iter().map(|(id, _)| id)),
        vec!["html", "css", "js-basics"]
    );
}

#[tokio::test]
async fn streak_grows_across_consecutive_days() {
    let repo = InMemoryRepository::new();
    let mut clock = fixed_clock();
    let day_one = SkillTreeService::new(clock, Arc::new(repo.clone()), Arc::new(repo.clone()));
    day_one
        .install_curriculum(&sample_curriculum().unwrap())
        .await
        .unwrap();

    let user = UserId::new(5);
    day_one.complete_topic(user, "cli").await.unwrap();
    day_one.complete_topic(user, "html").await.unwrap();
    assert_eq!(day_one.learner_stats(user).await.unwrap().streak, 1);

    clock.advance(Duration::days(1));
    let day_two = SkillTreeService::new(clock, Arc::new(repo.clone()), Arc::new(repo.clone()));
    let report = day_two.complete_topic(user, "git").await.unwrap();
    assert_eq!(report.learner.streak, 2);

    clock.advance(Duration::days(3));
    let later = SkillTreeService::new(clock, Arc::new(repo.clone()), Arc::new(repo));
    let report = later.complete_topic(user, "sql").await.unwrap();
    assert_eq!(report.learner.streak, 1);
}

struct FailingProgress;

#[async_trait]
impl ProgressRepository for FailingProgress {
    async fn load_progress(&self, _user_id: UserId) -> Result<Option<UserProgress>, StorageError> {
        Ok(None)
    }

    async fn save_progress(
        &self,
        _progress: &UserProgress,
        _saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn completion_history(
        &self,
        _user_id: UserId,
    ) -> Result<Vec<(TopicId, DateTime<Utc>)>, StorageError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn storage_failures_surface_from_complete_topic() {
    let curricula = InMemoryRepository::new();
    curricula
        .save_curriculum(&sample_curriculum().unwrap(), fixed_clock().now())
        .await
        .unwrap();
    let tree = SkillTreeService::new(fixed_clock(), Arc::new(curricula), Arc::new(FailingProgress));

    let err = tree.complete_topic(UserId::new(1), "cli").await.unwrap_err();
    assert!(matches!(
        err,
        SkillTreeError::Storage(StorageError::Connection(_))
    ));
}

#[tokio::test]
async fn graph_view_serializes_for_json_output() {
    let services = AppServices::in_memory(fixed_clock()).await.unwrap();
    let tree = services.skill_tree();
    let expanded: HashSet<String> = ["fundamentals".to_string()].into_iter().collect();
    let view = tree.graph_view(UserId::new(1), &expanded).await.unwrap();

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["rows"][1]["id"], "cli");
    assert_eq!(json["rows"][1]["state"], "available");
    assert_eq!(json["rows"][2]["state"], "locked");
    assert_eq!(json["rows"][0]["kind"], "category");
    assert_eq!(json["overall"]["percentage"], 0);
}

#[tokio::test]
async fn write_from_a_stale_base_is_rejected_and_stats_stay_current() {
    let repo = InMemoryRepository::new();
    let tree = SkillTreeService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo.clone()));
    tree.install_curriculum(&sample_curriculum().unwrap())
        .await
        .unwrap();
    let user = UserId::new(3);
    let expanded = HashSet::new();

    tree.complete_topic(user, "html").await.unwrap();
    let view = tree.graph_view(user, &expanded).await.unwrap();
    assert_eq!(view.overall.completed, 1);

    // a second writer that started from the empty state
    let curriculum = sample_curriculum().unwrap();
    let cli = skill_core::TopicIndex::from_nodes(&curriculum.nodes)
        .get("cli")
        .unwrap()
        .clone();
    let (outside, _) = UserProgress::new(user).complete(&cli, fixed_clock().today());
    let err = repo.save_progress(&outside, fixed_clock().now()).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let stored = repo.load_progress(user).await.unwrap().unwrap();
    assert_eq!(stored.points(), 30);
    assert_eq!(ids(stored.completed()), vec!["html"]);

    tree.complete_topic(user, "cli").await.unwrap();
    let view = tree.graph_view(user, &expanded).await.unwrap();
    assert_eq!(view.overall.completed, 2);
    assert_eq!(view.learner.points, 50);
}

#[tokio::test]
async fn completing_a_parent_topic_is_rejected() {
    let services = AppServices::in_memory(fixed_clock()).await.unwrap();
    let tree = services.skill_tree();
    let err = tree
        .complete_topic(UserId::new(1), "javascript")
        .await
        .unwrap_err();
    assert!(matches!(err, SkillTreeError::ParentTopic(id) if id.as_str() == "javascript"));
}
