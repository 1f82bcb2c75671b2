//! Walking the category/topic tree.
//!
//! Every walk keeps a seen-set keyed by node id: when seed data repeats an
//! id across branches, only the first occurrence (and its subtree) is
//! visited.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::{Category, GraphNode, Topic, TopicId};

/// Borrowed view of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef<'a> {
    Category(&'a Category),
    Topic(&'a Topic),
}

/// How a visible row should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibleKind {
    Category,
    ParentTopic,
    Topic,
}

/// One row of the currently visible tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleNode<'a> {
    pub node: NodeRef<'a>,
    pub depth: usize,
    pub kind: VisibleKind,
    /// True when the node can expand and its id is in the expansion set.
    pub expanded: bool,
}

impl<'a> VisibleNode<'a> {
    #[must_use]
    pub fn key(&self) -> &'a str {
        match self.node {
            NodeRef::Category(c) => c.id().as_str(),
            NodeRef::Topic(t) => t.id().as_str(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'a str {
        match self.node {
            NodeRef::Category(c) => c.name(),
            NodeRef::Topic(t) => t.name(),
        }
    }
}

/// Rows that should be visible given which ids are expanded.
///
/// Root nodes are always emitted. A category or parent topic contributes its
/// children only when its id is in `expanded`, recursively.
#[must_use]
pub fn flatten_visible<'a>(nodes: &'a [GraphNode], expanded: &HashSet<String>) -> Vec<VisibleNode<'a>> {
    let mut walker = VisibleWalker {
        expanded,
        seen: HashSet::new(),
        out: Vec::new(),
    };
    walker.nodes(nodes, 0);
    walker.out
}

struct VisibleWalker<'a, 'e> {
    expanded: &'e HashSet<String>,
    seen: HashSet<&'a str>,
    out: Vec<VisibleNode<'a>>,
}

impl<'a> VisibleWalker<'a, '_> {
    fn nodes(&mut self, nodes: &'a [GraphNode], depth: usize) {
        for node in nodes {
            match node {
                GraphNode::Category(category) => self.category(category, depth),
                GraphNode::Topic(topic) => self.topic(topic, depth),
            }
        }
    }

    fn category(&mut self, category: &'a Category, depth: usize) {
        if !self.seen.insert(category.id().as_str()) {
            return;
        }
        let expanded = self.expanded.contains(category.id().as_str());
        self.out.push(VisibleNode {
            node: NodeRef::Category(category),
            depth,
            kind: VisibleKind::Category,
            expanded,
        });
        if expanded {
            self.nodes(category.children(), depth + 1);
        }
    }

    fn topic(&mut self, topic: &'a Topic, depth: usize) {
        if !self.seen.insert(topic.id().as_str()) {
            return;
        }
        let kind = if topic.is_parent() {
            VisibleKind::ParentTopic
        } else {
            VisibleKind::Topic
        };
        let expanded = topic.is_parent() && self.expanded.contains(topic.id().as_str());
        self.out.push(VisibleNode {
            node: NodeRef::Topic(topic),
            depth,
            kind,
            expanded,
        });
        if expanded {
            for child in topic.children() {
                self.topic(child, depth + 1);
            }
        }
    }
}

/// Every leaf topic under `nodes`, ignoring expansion state.
///
/// A topic marked as parent but without children counts as a leaf.
#[must_use]
pub fn flatten_topics(nodes: &[GraphNode]) -> Vec<&Topic> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_nodes(nodes, &mut seen, &mut out);
    out
}

/// Every leaf topic in a topic list, descending into children.
#[must_use]
pub fn leaf_topics(topics: &[Topic]) -> Vec<&Topic> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for topic in topics {
        collect_topic(topic, &mut seen, &mut out);
    }
    out
}

fn collect_nodes<'a>(nodes: &'a [GraphNode], seen: &mut HashSet<&'a str>, out: &mut Vec<&'a Topic>) {
    for node in nodes {
        match node {
            GraphNode::Category(category) => {
                if seen.insert(category.id().as_str()) {
                    collect_nodes(category.children(), seen, out);
                }
            }
            GraphNode::Topic(topic) => collect_topic(topic, seen, out),
        }
    }
}

fn collect_topic<'a>(topic: &'a Topic, seen: &mut HashSet<&'a str>, out: &mut Vec<&'a Topic>) {
    if !seen.insert(topic.id().as_str()) {
        return;
    }
    if topic.is_leaf() {
        out.push(topic);
        return;
    }
    for child in topic.children() {
        collect_topic(child, seen, out);
    }
}

/// Rebuild parent/child nesting from flat rows using `parent_id`.
///
/// Rows whose parent is missing from `flat` stay at the top level. Rows
/// caught in a parent loop are appended at the top level, sorted by id.
#[must_use]
pub fn nest_topics(flat: Vec<Topic>) -> Vec<Topic> {
    let ids: HashSet<TopicId> = flat.iter().map(|t| t.id().clone()).collect();
    let mut roots = Vec::new();
    let mut by_parent: HashMap<TopicId, Vec<Topic>> = HashMap::new();

    for topic in flat {
        let parent = topic
            .parent_id()
            .filter(|p| *p != topic.id() && ids.contains(*p))
            .cloned();
        match parent {
            Some(parent) => by_parent.entry(parent).or_default().push(topic),
            None => roots.push(topic),
        }
    }

    let mut nested: Vec<Topic> = roots
        .into_iter()
        .map(|t| attach_children(t, &mut by_parent))
        .collect();

    let mut looped: Vec<Topic> = by_parent.into_values().flatten().collect();
    looped.sort_by(|a, b| a.id().cmp(b.id()));
    nested.extend(looped);
    nested
}

fn attach_children(mut topic: Topic, by_parent: &mut HashMap<TopicId, Vec<Topic>>) -> Topic {
    let Some(kids) = by_parent.remove(topic.id()) else {
        return topic;
    };
    let mut children = topic.take_children();
    children.extend(kids.into_iter().map(|k| attach_children(k, by_parent)));
    topic.set_children(children);
    topic
}
