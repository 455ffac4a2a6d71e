//! Error taxonomy for the verification gate.

/// Errors produced by the gate engine.
///
/// `Configuration` is the only variant that aborts a run before checks
/// execute. Everything else is converted into a failed [`crate::CheckResult`]
/// at the owning check's boundary.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("tool invocation failed: {0}")]
    ToolInvocation(String),

    #[error("data format error: {0}")]
    DataFormat(String),

    #[error("vcs error: {0}")]
    Vcs(String),

    #[error("duplicate check id: {0}")]
    DuplicateCheckId(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
