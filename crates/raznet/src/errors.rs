use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Generation failed: {0}")]
    Generation(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
