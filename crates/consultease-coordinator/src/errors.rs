// [crates/consultease-coordinator/src/errors.rs]
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("service '{0}' depends on unknown service '{1}'")]
    UnknownDependency(String, String),

    #[error("dependency graph contains a cycle involving '{0}'")]
    CyclicDependency(String),

    #[error("service '{name}' failed to start: {source}")]
    StartFailed { name: String, source: anyhow::Error },

    #[error("service '{name}' exhausted its restart budget ({budget} attempt(s))")]
    RestartBudgetExhausted { name: String, budget: u32 },
}
