#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod skill_tree;

pub use skill_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, SkillTreeError};
pub use skill_tree::{
    CompletionReport, GraphRow, GraphView, LearnerStats, NextTopic, SkillTreeService,
};
