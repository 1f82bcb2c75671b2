use thiserror::Error;

use crate::graph::GraphError;
use crate::model::{CategoryError, IdError, TopicError, UserProgressError};

/// Any validation failure raised by the domain model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Progress(#[from] UserProgressError),
}
