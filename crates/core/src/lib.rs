#![forbid(unsafe_code)]

//! Knowledge-graph domain: topics with prerequisites, category trees and
//! per-learner progress.
//!
//! The three pure building blocks compose in order: [`tree`] flattens the
//! category tree, [`graph`] classifies each topic, [`progress`] aggregates.

pub mod error;
pub mod graph;
pub mod model;
pub mod progress;
pub mod time;
pub mod tree;

pub use error::Error;
pub use graph::{classify, GraphError, NodeState, TopicIndex};
pub use progress::{summarize, CategoryProgress, MemoKey, ProgressMemo, ProgressSummary};
pub use time::Clock;
pub use tree::{flatten_topics, flatten_visible, nest_topics, NodeRef, VisibleKind, VisibleNode};
