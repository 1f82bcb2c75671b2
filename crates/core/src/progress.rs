//! Completion statistics over topic sets.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::{Category, CategoryId, CompletedSet, GraphNode, Topic};
use crate::tree::{flatten_topics, leaf_topics, NodeRef};

/// Counts and rounded percentage of completed topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    /// `round(completed / total * 100)`, or 0 when `total` is 0.
    pub percentage: u8,
}

impl ProgressSummary {
    #[must_use]
    pub fn from_counts(total: usize, completed: usize) -> Self {
        let completed = completed.min(total);
        Self {
            total,
            completed,
            percentage: percentage(completed, total),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // round half up, integer only
    let scaled = (completed * 200 + total) / (2 * total);
    u8::try_from(scaled.min(100)).unwrap_or(100)
}

/// Summarize a sequence of topics against a completed set.
#[must_use]
pub fn summarize<'a, I>(topics: I, completed: &CompletedSet) -> ProgressSummary
where
    I: IntoIterator<Item = &'a Topic>,
{
    let mut total = 0;
    let mut done = 0;
    for topic in topics {
        total += 1;
        if completed.contains(topic.id()) {
            done += 1;
        }
    }
    ProgressSummary::from_counts(total, done)
}

/// Summary of the leaf topics beneath a node (a leaf topic summarizes itself).
#[must_use]
pub fn subtree_summary(node: NodeRef<'_>, completed: &CompletedSet) -> ProgressSummary {
    match node {
        NodeRef::Category(category) => summarize(flatten_topics(category.children()), completed),
        NodeRef::Topic(topic) => summarize(leaf_topics(std::slice::from_ref(topic)), completed),
    }
}

/// Progress of a single category, counting every leaf topic beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryProgress {
    pub id: CategoryId,
    pub name: String,
    pub color: String,
    pub depth: usize,
    pub summary: ProgressSummary,
}

/// Per-category progress for every category in the tree, depth-first.
///
/// Uses the same single seen-set as [`flatten_topics`]: a topic repeated
/// across categories counts toward the categories enclosing its first
/// occurrence only, so top-level totals add up to the overall total.
#[must_use]
pub fn category_progress(nodes: &[GraphNode], completed: &CompletedSet) -> Vec<CategoryProgress> {
    let mut walk = CategoryWalk {
        completed,
        seen: HashSet::new(),
        open: Vec::new(),
        rows: Vec::new(),
    };
    walk.nodes(nodes, 0);
    walk.rows
        .into_iter()
        .map(|row| CategoryProgress {
            id: row.category.id().clone(),
            name: row.category.name().to_owned(),
            color: row.category.color().to_owned(),
            depth: row.depth,
            summary: ProgressSummary::from_counts(row.total, row.done),
        })
        .collect()
}

struct Tally<'a> {
    category: &'a Category,
    depth: usize,
    total: usize,
    done: usize,
}

struct CategoryWalk<'a, 'c> {
    completed: &'c CompletedSet,
    seen: HashSet<&'a str>,
    // indexes into `rows` of the categories enclosing the current node
    open: Vec<usize>,
    rows: Vec<Tally<'a>>,
}

impl<'a> CategoryWalk<'a, '_> {
    fn nodes(&mut self, nodes: &'a [GraphNode], depth: usize) {
        for node in nodes {
            match node {
                GraphNode::Category(category) => {
                    if !self.seen.insert(category.id().as_str()) {
                        continue;
                    }
                    self.open.push(self.rows.len());
                    self.rows.push(Tally {
                        category,
                        depth,
                        total: 0,
                        done: 0,
                    });
                    self.nodes(category.children(), depth + 1);
                    self.open.pop();
                }
                GraphNode::Topic(topic) => self.topic(topic),
            }
        }
    }

    fn topic(&mut self, topic: &'a Topic) {
        if !self.seen.insert(topic.id().as_str()) {
            return;
        }
        if !topic.is_leaf() {
            for child in topic.children() {
                self.topic(child);
            }
            return;
        }
        let done = self.completed.contains(topic.id());
        for &i in &self.open {
            let tally = &mut self.rows[i];
            tally.total += 1;
            if done {
                tally.done += 1;
            }
        }
    }
}

/// Identity of the inputs a statistic was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoKey {
    pub curriculum_revision: u64,
    pub progress_revision: u64,
}

/// Single-slot memo: recomputes only when the key changes.
#[derive(Debug, Clone)]
pub struct ProgressMemo<T = ProgressSummary> {
    slot: Option<(MemoKey, T)>,
}

impl<T> Default for ProgressMemo<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T: Clone> ProgressMemo<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_compute(&mut self, key: MemoKey, compute: impl FnOnce() -> T) -> T {
        if let Some((cached_key, value)) = &self.slot {
            if *cached_key == key {
                return value.clone();
            }
        }
        let value = compute();
        self.slot = Some((key, value.clone()));
        value
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }
}
