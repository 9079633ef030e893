use thiserror::Error;

/// The three categories spec.md §4.1 allows an adapter to surface to the
/// core: "transport/timeout, remote validation, remote server failure."
/// The caller (`rezcore::fanout`/`rezcore::booking`) maps these onto
/// `common::CoreError`.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("transport error talking to source: {0}")]
    Transport(String),

    #[error("source call timed out after {0}ms")]
    Timeout(u64),

    #[error("remote rejected the request: {0}")]
    RemoteValidation(String),

    #[error("remote server failure: {0}")]
    RemoteServer(String),
}
