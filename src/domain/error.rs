use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown size class `{0}`")]
    UnknownSizeClass(String),
}
