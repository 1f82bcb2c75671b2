//! Prerequisite graph: node-state classification and structural checks.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::model::{CompletedSet, GraphNode, Topic, TopicId};

//
// ─── NODE STATE ────────────────────────────────────────────────────────────────
//

/// Where a topic stands for one learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Completed,
    Available,
    Locked,
}

impl NodeState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Completed => "completed",
            NodeState::Available => "available",
            NodeState::Locked => "locked",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn state_of(topic: &Topic, completed: &CompletedSet) -> NodeState {
    if completed.contains(topic.id()) {
        return NodeState::Completed;
    }
    if topic
        .prerequisites()
        .iter()
        .all(|prereq| completed.contains(prereq))
    {
        NodeState::Available
    } else {
        NodeState::Locked
    }
}

/// Classify `topic_id` against a flat topic list.
///
/// Membership in `completed` wins over everything else. An id that does not
/// appear in `all_topics` is reported as `Locked`. The lookup is a linear
/// scan; use [`TopicIndex`] when classifying many topics.
#[must_use]
pub fn classify(topic_id: &str, completed: &CompletedSet, all_topics: &[Topic]) -> NodeState {
    if completed.contains(topic_id) {
        return NodeState::Completed;
    }
    match all_topics.iter().find(|t| t.id().as_str() == topic_id) {
        Some(topic) => state_of(topic, completed),
        None => NodeState::Locked,
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    #[error("topic {topic} requires unknown topic {prerequisite}")]
    UnknownPrerequisite {
        topic: TopicId,
        prerequisite: TopicId,
    },

    #[error("prerequisite cycle among topics: {}", format_ids(.topics))]
    Cycle { topics: Vec<TopicId> },
}

fn format_ids(ids: &[TopicId]) -> String {
    ids.iter()
        .map(TopicId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

//
// ─── INDEX ─────────────────────────────────────────────────────────────────────
//

/// Id → topic lookup over every topic of a graph, nested children included.
///
/// The first occurrence of an id wins; later duplicates are ignored.
#[derive(Debug, Clone, Default)]
pub struct TopicIndex<'a> {
    by_id: HashMap<&'a str, &'a Topic>,
    order: Vec<&'a Topic>,
}

impl<'a> TopicIndex<'a> {
    /// Index a topic list, descending into each topic's children.
    #[must_use]
    pub fn from_topics(topics: &'a [Topic]) -> Self {
        let mut index = Self::default();
        for topic in topics {
            index.insert_recursive(topic);
        }
        index
    }

    /// Index every topic reachable from the given graph nodes.
    #[must_use]
    pub fn from_nodes(nodes: &'a [GraphNode]) -> Self {
        let mut index = Self::default();
        index.insert_nodes(nodes);
        index
    }

    fn insert_nodes(&mut self, nodes: &'a [GraphNode]) {
        for node in nodes {
            match node {
                GraphNode::Category(category) => self.insert_nodes(category.children()),
                GraphNode::Topic(topic) => self.insert_recursive(topic),
            }
        }
    }

    fn insert_recursive(&mut self, topic: &'a Topic) {
        if self.by_id.contains_key(topic.id().as_str()) {
            return;
        }
        self.by_id.insert(topic.id().as_str(), topic);
        self.order.push(topic);
        for child in topic.children() {
            self.insert_recursive(child);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn get(&self, topic_id: &str) -> Option<&'a Topic> {
        self.by_id.get(topic_id).copied()
    }

    /// Topics in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Topic> + '_ {
        self.order.iter().copied()
    }

    /// Same rules as [`classify`], with constant-time topic lookup.
    #[must_use]
    pub fn classify(&self, topic_id: &str, completed: &CompletedSet) -> NodeState {
        if completed.contains(topic_id) {
            return NodeState::Completed;
        }
        match self.get(topic_id) {
            Some(topic) => state_of(topic, completed),
            None => NodeState::Locked,
        }
    }

    /// Topics that can be started right now.
    #[must_use]
    pub fn available(&self, completed: &CompletedSet) -> Vec<&'a Topic> {
        self.iter()
            .filter(|t| state_of(t, completed) == NodeState::Available)
            .collect()
    }

    /// Topics that would turn from locked to available once `topic_id` is
    /// completed. Empty if `topic_id` is already completed.
    #[must_use]
    pub fn newly_available(&self, topic_id: &str, completed: &CompletedSet) -> Vec<&'a Topic> {
        if completed.contains(topic_id) {
            return Vec::new();
        }
        self.iter()
            .filter(|t| t.id().as_str() != topic_id && !completed.contains(t.id()))
            .filter(|t| t.prerequisites().iter().any(|p| p.as_str() == topic_id))
            .filter(|t| {
                t.prerequisites()
                    .iter()
                    .all(|p| p.as_str() == topic_id || completed.contains(p))
            })
            .collect()
    }

    /// Check that every prerequisite exists and the graph has no cycle.
    ///
    /// # Errors
    ///
    /// Returns the first `GraphError::UnknownPrerequisite` in topic order, or
    /// `GraphError::Cycle` listing every topic left on a cycle.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.topological_order().map(|_| ())
    }

    /// Prerequisite-first ordering; ties keep first-seen order.
    ///
    /// # Errors
    ///
    /// Same as [`TopicIndex::validate`].
    pub fn topological_order(&self) -> Result<Vec<&'a Topic>, GraphError> {
        let position: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id().as_str(), i))
            .collect();

        let mut pending = vec![0_usize; self.order.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.order.len()];

        for (i, topic) in self.order.iter().enumerate() {
            let mut seen = HashSet::new();
            for prereq in topic.prerequisites() {
                let Some(&p) = position.get(prereq.as_str()) else {
                    return Err(GraphError::UnknownPrerequisite {
                        topic: topic.id().clone(),
                        prerequisite: prereq.clone(),
                    });
                };
                if seen.insert(p) {
                    pending[i] += 1;
                    dependents[p].push(i);
                }
            }
        }

        let mut ready: BTreeSet<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, n)| **n == 0)
            .map(|(i, _)| i)
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(next) = ready.pop_first() {
            sorted.push(self.order[next]);
            for &dep in &dependents[next] {
                pending[dep] -= 1;
                if pending[dep] == 0 {
                    ready.insert(dep);
                }
            }
        }

        if sorted.len() < self.order.len() {
            let mut topics: Vec<TopicId> = pending
                .iter()
                .enumerate()
                .filter(|(_, n)| **n > 0)
                .map(|(i, _)| self.order[i].id().clone())
                .collect();
            topics.sort();
            return Err(GraphError::Cycle { topics });
        }

        Ok(sorted)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
