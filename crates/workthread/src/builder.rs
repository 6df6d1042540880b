use std::time::Duration;

use crate::error::CreateError;
use crate::worker::WorkerHandle;

// -----------------------------------------------------------------------------
// WorkerBuilder

/// Builder for creating a [`WorkerHandle`].
///
/// Currently configurable parameters:
///
/// - [`interval`]: upper bound on how long the worker sleeps between
///   `check` invocations when there is no work and no [`wakeup`]. Zero
///   (the default) means "wait only for an explicit signal".
///
/// - [`name`]: thread name, surfaced to the OS and to log records. Purely
///   diagnostic; has no effect on the worker's behavior.
///
/// - [`stack_size`]: stack size for the worker thread. Default is
///   system-dependent.
///
/// Everything configured here is immutable once [`spawn`] has returned.
///
/// [`interval`]: Self::interval
/// [`name`]: Self::name
/// [`stack_size`]: Self::stack_size
/// [`wakeup`]: WorkerHandle::wakeup
/// [`spawn`]: Self::spawn
#[derive(Default)]
#[must_use]
pub struct WorkerBuilder {
    interval: Duration,
    name: Option<String>,
    stack_size: Option<usize>,
}

impl WorkerBuilder {
    /// Creates a new builder with an indefinite sleep interval and no name.
    #[inline]
    pub fn new() -> Self {
        Self { interval: Duration::ZERO, name: None, stack_size: None }
    }

    /// Sets the sleep interval. Zero means "wait indefinitely for [`wakeup`]".
    ///
    /// [`wakeup`]: WorkerHandle::wakeup
    #[inline]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Names the worker's OS thread, for debugging and log records. Does
    /// not participate in any invariant.
    #[inline]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overrides the worker thread's stack size.
    #[inline]
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Builds the [`WorkerHandle`], spawning its worker thread.
    ///
    /// `check` is invoked with the state lock held (see the crate docs for
    /// why) and must return promptly; `work` is invoked with no primitive
    /// lock held and may run arbitrarily long.
    ///
    /// On success, the returned handle is already running: its thread
    /// identity is set and the cancel flag is false. On failure (thread
    /// spawn failed), no handle is produced and nothing leaks.
    pub fn spawn<A, C, W>(self, check: C, work: W, arg: A) -> Result<WorkerHandle<A>, CreateError>
    where
        A: Send + Sync + 'static,
        C: Fn(&A, &WorkerHandle<A>) -> bool + Send + Sync + 'static,
        W: Fn(&A, &WorkerHandle<A>) + Send + Sync + 'static,
    {
        WorkerHandle::spawn_with(self.interval, self.name, self.stack_size, check, work, arg)
    }
}
