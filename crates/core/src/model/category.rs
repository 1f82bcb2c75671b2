use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CategoryId, IdError};
use crate::model::topic::Topic;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CategoryError {
    #[error(transparent)]
    InvalidId(#[from] IdError),

    #[error("category name cannot be empty")]
    EmptyName,

    #[error("invalid display color: {0}")]
    InvalidColor(String),
}

pub const DEFAULT_COLOR: &str = "#6b7280";

fn default_color() -> String {
    DEFAULT_COLOR.to_owned()
}

/// Unvalidated category as it appears in seed documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub children: Vec<GraphNode>,
}

impl CategoryDraft {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            color: default_color(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<GraphNode>) -> Self {
        self.children = children;
        self
    }

    /// Validate the draft into a `Category`.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError` for a blank id or name, or a color that is
    /// not `#rgb` / `#rrggbb` hex.
    pub fn validate(self) -> Result<Category, CategoryError> {
        let id = CategoryId::new(self.id)?;
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(CategoryError::EmptyName);
        }
        let color = self.color.trim().to_ascii_lowercase();
        if !is_hex_color(&color) {
            return Err(CategoryError::InvalidColor(self.color));
        }

        Ok(Category {
            id,
            name,
            description: self.description.trim().to_owned(),
            color,
            children: self.children,
        })
    }
}

fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Presentation grouping of topics and sub-categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CategoryDraft", into = "CategoryDraft")]
pub struct Category {
    id: CategoryId,
    name: String,
    description: String,
    color: String,
    children: Vec<GraphNode>,
}

impl Category {
    #[must_use]
    pub fn id(&self) -> &CategoryId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn color(&self) -> &str {
        &self.color
    }

    #[must_use]
    pub fn children(&self) -> &[GraphNode] {
        &self.children
    }
}

impl TryFrom<CategoryDraft> for Category {
    type Error = CategoryError;

    fn try_from(draft: CategoryDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Category> for CategoryDraft {
    fn from(category: Category) -> Self {
        Self {
            id: category.id.into(),
            name: category.name,
            description: category.description,
            color: category.color,
            children: category.children,
        }
    }
}

/// Either a category or a topic; children are owned by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GraphNode {
    Category(Category),
    Topic(Topic),
}

impl GraphNode {
    /// Identifier used for expansion state and duplicate detection.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            GraphNode::Category(c) => c.id().as_str(),
            GraphNode::Topic(t) => t.id().as_str(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            GraphNode::Category(c) => c.name(),
            GraphNode::Topic(t) => t.name(),
        }
    }
}

impl From<Category> for GraphNode {
    fn from(category: Category) -> Self {
        GraphNode::Category(category)
    }
}

impl From<Topic> for GraphNode {
    fn from(topic: Topic) -> Self {
        GraphNode::Topic(topic)
    }
}

/// A whole knowledge graph as seeded and loaded in one piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curriculum {
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
}

impl Curriculum {
    #[must_use]
    pub fn new(title: impl Into<String>, nodes: Vec<GraphNode>) -> Self {
        Self {
            title: title.into(),
            nodes,
        }
    }
}
