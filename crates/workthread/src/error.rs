use thiserror::Error;

// -----------------------------------------------------------------------------
// CreateError

/// Failure surfaced from [`WorkerHandle::create`], [`WorkerHandle::create_timed`],
/// [`WorkerBuilder::spawn`], or [`WorkerHandle::resume`].
///
/// [`WorkerHandle::create`]: crate::WorkerHandle::create
/// [`WorkerHandle::create_timed`]: crate::WorkerHandle::create_timed
/// [`WorkerBuilder::spawn`]: crate::WorkerBuilder::spawn
/// [`WorkerHandle::resume`]: crate::WorkerHandle::resume
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CreateError {
    /// The OS refused to spawn the worker thread (resource exhaustion).
    /// No handle is produced and no partial resources are leaked.
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(#[source] std::io::Error),
}
