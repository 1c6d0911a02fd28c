use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid todo ID: {0}")]
    InvalidTodoId(String),

    #[error("{0}")]
    Validation(String),
}
