mod service;
mod view;

// Public API of the skill tree subsystem.
pub use crate::error::SkillTreeError;
pub use service::SkillTreeService;
pub use view::{CompletionReport, GraphRow, GraphView, LearnerStats, NextTopic};
