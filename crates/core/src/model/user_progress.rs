use std::collections::BTreeSet;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::ids::{TopicId, UserId};
use crate::model::topic::Topic;

/// Set of topic ids a learner has completed.
pub type CompletedSet = BTreeSet<TopicId>;

/// Points needed to advance one level.
pub const POINTS_PER_LEVEL: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserProgressError {
    #[error("level {level} does not match points {points}")]
    LevelMismatch { points: u32, level: u32 },

    #[error("streak must be zero when there is no recorded activity")]
    StreakWithoutActivity,
}

/// Level reached with the given number of points. Levels start at 1.
#[must_use]
pub fn level_for_points(points: u32) -> u32 {
    1 + points / POINTS_PER_LEVEL
}

/// Result of applying a completion to a learner's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The topic was newly added to the completed set.
    Recorded {
        points_awarded: u32,
        leveled_up: bool,
    },
    /// The topic was already completed; state is unchanged.
    AlreadyCompleted,
}

/// A single learner's progress: completed topics plus scalar counters.
///
/// Values are never mutated in place by callers; every update returns a
/// new `UserProgress`. `revision` increases on each effective change so
/// derived statistics can be memoized against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProgress {
    user_id: UserId,
    completed: CompletedSet,
    points: u32,
    level: u32,
    streak: u32,
    last_active_on: Option<NaiveDate>,
    revision: u64,
}

impl UserProgress {
    /// Fresh progress for a learner with nothing completed.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            completed: CompletedSet::new(),
            points: 0,
            level: level_for_points(0),
            streak: 0,
            last_active_on: None,
            revision: 0,
        }
    }

    /// Rehydrate progress from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `UserProgressError::LevelMismatch` if the stored level does not
    /// follow from the stored points, or `StreakWithoutActivity` if a streak is
    /// recorded without an activity date.
    pub fn from_persisted(
        user_id: UserId,
        completed: CompletedSet,
        points: u32,
        level: u32,
        streak: u32,
        last_active_on: Option<NaiveDate>,
        revision: u64,
    ) -> Result<Self, UserProgressError> {
        if level != level_for_points(points) {
            return Err(UserProgressError::LevelMismatch { points, level });
        }
        if last_active_on.is_none() && streak != 0 {
            return Err(UserProgressError::StreakWithoutActivity);
        }
        Ok(Self {
            user_id,
            completed,
            points,
            level,
            streak,
            last_active_on,
            revision,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn completed(&self) -> &CompletedSet {
        &self.completed
    }

    #[must_use]
    pub fn is_completed(&self, topic_id: &TopicId) -> bool {
        self.completed.contains(topic_id)
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn last_active_on(&self) -> Option<NaiveDate> {
        self.last_active_on
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply the "complete a topic" action.
    ///
    /// Completing an already-completed topic returns an identical state and
    /// `Completion::AlreadyCompleted`. Otherwise the topic is added, its reward
    /// points are credited, the level is recomputed and the streak advanced
    /// for `today`.
    #[must_use]
    pub fn complete(&self, topic: &Topic, today: NaiveDate) -> (Self, Completion) {
        if self.completed.contains(topic.id()) {
            return (self.clone(), Completion::AlreadyCompleted);
        }

        let mut completed = self.completed.clone();
        completed.insert(topic.id().clone());

        let points = self.points.saturating_add(topic.points());
        let level = level_for_points(points);
        let (streak, last_active_on) = self.advance_streak(today);

        let next = Self {
            user_id: self.user_id,
            completed,
            points,
            level,
            streak,
            last_active_on,
            revision: self.revision + 1,
        };
        let outcome = Completion::Recorded {
            points_awarded: topic.points(),
            leveled_up: level > self.level,
        };
        (next, outcome)
    }

    fn advance_streak(&self, today: NaiveDate) -> (u32, Option<NaiveDate>) {
        let Some(last) = self.last_active_on else {
            return (1, Some(today));
        };
        match (today - last).num_days() {
            0 => (self.streak.max(1), Some(last)),
            1 => (self.streak.saturating_add(1), Some(today)),
            d if d < 0 => (self.streak, Some(last)),
            _ => (1, Some(today)),
        }
    }
}
