mod category;
mod ids;
mod topic;
mod user_progress;

pub use category::{Category, CategoryDraft, CategoryError, Curriculum, GraphNode, DEFAULT_COLOR};
pub use ids::{CategoryId, IdError, TopicId, UserId};
pub use topic::{Topic, TopicDraft, TopicError, MAX_DIFFICULTY, MIN_DIFFICULTY};
pub use user_progress::{
    level_for_points, CompletedSet, Completion, UserProgress, UserProgressError, POINTS_PER_LEVEL,
};
