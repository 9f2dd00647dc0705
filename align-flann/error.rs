#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("Invalid tree count: {0} (must be >= 1)")]
    InvalidTrees(usize),
    #[error("Invalid check budget: {0} (must be >= 1)")]
    InvalidChecks(usize),
    #[error("Invalid neighbour count: {0} (must be >= 1)")]
    InvalidK(usize),
}

pub type MatchResult<T> = Result<T, MatchError>;
