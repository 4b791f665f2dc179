/// Errors raised while interpreting subjects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubjectError {
    /// The subject is empty or contains an empty token.
    #[error("malformed subject: {0:?}")]
    Malformed(String),

    /// The subject contains wildcards where a literal subject is required.
    #[error("subject must not contain wildcards: {0}")]
    NotLiteral(String),
}

pub type Result<T> = std::result::Result<T, SubjectError>;
