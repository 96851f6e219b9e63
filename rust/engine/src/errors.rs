use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("not your turn")]
    NotYourTurn,
    #[error("unknown player for this session")]
    UnknownPlayer,
    #[error("session has ended")]
    SessionEnded,
    #[error("engine invariant violated: {0}")]
    InvariantViolation(String),
}

impl EngineError {
    pub fn illegal(reason: impl Into<String>) -> Self {
        EngineError::IllegalMove(reason.into())
    }
}
