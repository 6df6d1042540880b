use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::error::CreateError;

// -----------------------------------------------------------------------------
// State

/// Everything the worker loop and the request surface negotiate under
/// `state`. Guarded separately from `request`, see [`Inner`].
struct State {
    /// `None` when the worker is stopped; `Some` while its loop is running.
    thread_id: Option<ThreadId>,
    /// Set by a requester, cleared by the worker loop on exit. Never the
    /// other way around.
    cancelled: bool,
}

// -----------------------------------------------------------------------------
// Inner

/// Shared, `Arc`-owned state of a [`WorkerHandle`].
///
/// Two locks, strict order `request` before `state`:
///
/// - `request` serializes [`wakeup`]/[`cancel`]/[`resume`] against each
///   other so each sees the handle in a well-defined state on entry.
/// - `state` guards the fields the worker loop itself reads and writes.
///   The worker loop only ever takes `state`, never `request`.
///
/// `condvar` is bound to `state`: it is only waited on (by the worker
/// loop) and only broadcast (by the request surface and by the worker
/// loop's own exit path) while `state` is held.
///
/// [`wakeup`]: WorkerHandle::wakeup
/// [`cancel`]: WorkerHandle::cancel
/// [`resume`]: WorkerHandle::resume
struct Inner<A> {
    state: Mutex<State>,
    request: Mutex<()>,
    condvar: Condvar,

    check: Box<dyn Fn(&A, &WorkerHandle<A>) -> bool + Send + Sync>,
    work: Box<dyn Fn(&A, &WorkerHandle<A>) + Send + Sync>,
    arg: A,

    interval: Duration,
    name: Option<String>,
    stack_size: Option<usize>,
}

#[inline]
fn lock_state<A>(inner: &Inner<A>) -> MutexGuard<'_, State> {
    inner.state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
fn lock_request<A>(inner: &Inner<A>) -> MutexGuard<'_, ()> {
    inner.request.lock().unwrap_or_else(PoisonError::into_inner)
}

// -----------------------------------------------------------------------------
// WorkerHandle

/// A managed background-worker thread.
///
/// `WorkerHandle` lets a host subsystem run an isolated, long-lived
/// activity on its own thread: wake it when there is work, let it sleep
/// when there isn't, cancel it cooperatively even mid-work, resume it
/// later, and eventually destroy it.
///
/// There is deliberately no work queue: exactly one "is there work"
/// decision, made by the `check` callback, drives the loop. Queuing,
/// priorities, work-stealing, multi-worker pools, and progress reporting
/// are all out of scope. Build those on top if you need them.
///
/// A `WorkerHandle` is cheap to clone (it is an `Arc` under the hood);
/// every clone refers to the same worker. Use [`create`] or
/// [`create_timed`] for the common case, or [`WorkerBuilder`] to name the
/// thread or set its stack size.
///
/// [`create`]: Self::create
/// [`create_timed`]: Self::create_timed
/// [`WorkerBuilder`]: crate::WorkerBuilder
pub struct WorkerHandle<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for WorkerHandle<A> {
    #[inline]
    fn clone(&self) -> Self {
        WorkerHandle { inner: Arc::clone(&self.inner) }
    }
}

impl<A> fmt::Debug for WorkerHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.inner);
        f.debug_struct("WorkerHandle")
            .field("name", &self.inner.name)
            .field("running", &state.thread_id.is_some())
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

impl<A: Send + Sync + 'static> WorkerHandle<A> {
    /// Spawns a worker whose sleep interval is zero: it only wakes on an
    /// explicit [`wakeup`] (or [`cancel`]).
    ///
    /// Equivalent to `create_timed(check, work, arg, Duration::ZERO)`.
    ///
    /// [`wakeup`]: Self::wakeup
    /// [`cancel`]: Self::cancel
    pub fn create<C, W>(check: C, work: W, arg: A) -> Result<Self, CreateError>
    where
        C: Fn(&A, &WorkerHandle<A>) -> bool + Send + Sync + 'static,
        W: Fn(&A, &WorkerHandle<A>) + Send + Sync + 'static,
    {
        Self::create_timed(check, work, arg, Duration::ZERO)
    }

    /// Spawns a worker that re-checks at least every `interval` even
    /// without an explicit [`wakeup`]. Zero means "wait only for an
    /// explicit signal" (see [`create`]).
    ///
    /// [`wakeup`]: Self::wakeup
    /// [`create`]: Self::create
    pub fn create_timed<C, W>(
        check: C,
        work: W,
        arg: A,
        interval: Duration,
    ) -> Result<Self, CreateError>
    where
        C: Fn(&A, &WorkerHandle<A>) -> bool + Send + Sync + 'static,
        W: Fn(&A, &WorkerHandle<A>) + Send + Sync + 'static,
    {
        Self::spawn_with(interval, None, None, check, work, arg)
    }

    pub(crate) fn spawn_with<C, W>(
        interval: Duration,
        name: Option<String>,
        stack_size: Option<usize>,
        check: C,
        work: W,
        arg: A,
    ) -> Result<Self, CreateError>
    where
        C: Fn(&A, &WorkerHandle<A>) -> bool + Send + Sync + 'static,
        W: Fn(&A, &WorkerHandle<A>) + Send + Sync + 'static,
    {
        let inner = Arc::new(Inner {
            state: Mutex::new(State { thread_id: None, cancelled: false }),
            request: Mutex::new(()),
            condvar: Condvar::new(),
            check: Box::new(check),
            work: Box::new(work),
            arg,
            interval,
            name,
            stack_size,
        });

        // No other caller can observe `inner` yet, so locking here is just
        // for uniformity with `resume`'s code path, not for exclusion.
        let mut state = lock_state(&inner);
        let id = spawn_thread(&inner)?;
        state.thread_id = Some(id);
        drop(state);

        log::debug!(target: "workthread", "worker {:?} created (interval = {:?})", inner.name, inner.interval);

        Ok(WorkerHandle { inner })
    }

    /// Broadcasts on the condvar: a hint, not a guarantee.
    ///
    /// If the worker is sleeping, it wakes and re-evaluates `check` at
    /// least once before sleeping again. If it is already working,
    /// already cancelled, or freshly (re)started, this is a no-op.
    pub fn wakeup(&self) {
        let _request = lock_request(&self.inner);
        let state = lock_state(&self.inner);
        self.inner.condvar.notify_all();
        drop(state);
    }

    /// Requests cancellation and waits for the worker thread to exit its
    /// loop.
    ///
    /// Idempotent: calling `cancel` on an already-stopped worker returns
    /// immediately. Cancellation is cooperative: the worker observes it
    /// between `check`/`work` iterations, or opportunistically inside a
    /// long `work` callback via [`is_cancelled`]. `cancel` never
    /// interrupts `work` mid-execution; a `work` callback that ignores
    /// [`is_cancelled`] can delay `cancel` indefinitely. That is by
    /// design: this primitive guarantees *eventual*, not preemptive,
    /// cancellation.
    ///
    /// On return, the worker's thread identity is `None` and its cancel
    /// flag is `false` again; the handle is reusable via [`resume`].
    ///
    /// [`is_cancelled`]: Self::is_cancelled
    /// [`resume`]: Self::resume
    pub fn cancel(&self) {
        let _request = lock_request(&self.inner);
        let mut state = lock_state(&self.inner);

        if state.thread_id.is_none() {
            // Already stopped.
            return;
        }

        state.cancelled = true;
        self.inner.condvar.notify_all();

        while state.thread_id.is_some() {
            state = self.inner.condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }

        debug_assert!(!state.cancelled, "worker loop must clear cancelled before clearing thread_id");
        drop(state);

        log::debug!(target: "workthread", "worker {:?} cancelled and stopped", self.inner.name);
    }

    /// Restarts a stopped worker. No-op if the worker is still running
    /// (this is the permissive reading of an open question in the
    /// underlying design: `resume` is meant to follow `cancel`, but a
    /// caller that races `resume` against a running worker is not
    /// punished for it).
    pub fn resume(&self) -> Result<(), CreateError> {
        let _request = lock_request(&self.inner);
        let mut state = lock_state(&self.inner);

        debug_assert!(
            !state.cancelled,
            "resume observed cancelled=true with no worker thread; the worker loop should have cleared it on exit"
        );

        if state.thread_id.is_some() {
            return Ok(());
        }

        let id = spawn_thread(&self.inner)?;
        state.thread_id = Some(id);
        drop(state);

        log::debug!(target: "workthread", "worker {:?} resumed", self.inner.name);
        Ok(())
    }

    /// Polls whether a cancellation is pending.
    ///
    /// Intended to be called only from inside the `work` callback, by the
    /// worker thread itself, to check in on a long-running work item.
    /// Acquires **only** the state lock, never the request lock: a
    /// concurrent `cancel` holds the request lock and is waiting on the
    /// state lock, so if `is_cancelled` tried to take the request lock
    /// too it could contend with the very `cancel` call it exists to let
    /// `work` detect: the worker would block on a lock held by a caller
    /// that is itself waiting for the worker to finish.
    ///
    /// # Panics (debug builds only)
    ///
    /// Panics if called from any thread other than the worker's own.
    pub fn is_cancelled(&self) -> bool {
        let state = lock_state(&self.inner);
        debug_assert_eq!(
            state.thread_id,
            Some(thread::current().id()),
            "is_cancelled() must be called from the worker's own thread"
        );
        state.cancelled
    }

    /// Tears down the worker handle.
    ///
    /// # Panics (debug builds only)
    ///
    /// Panics if the worker is not stopped. Callers should `cancel()`
    /// first (it is idempotent and waits for the worker to exit):
    ///
    /// ```
    /// # use workthread::WorkerHandle;
    /// # use std::sync::atomic::{AtomicBool, Ordering};
    /// # let worker = WorkerHandle::create(
    /// #     |_, _| false,
    /// #     |_, _| {},
    /// #     (),
    /// # ).unwrap();
    /// worker.cancel();
    /// worker.destroy();
    /// ```
    ///
    /// After `destroy` returns, no other operation on any clone of this
    /// handle is defined.
    pub fn destroy(self) {
        let state = lock_state(&self.inner);
        debug_assert!(
            state.thread_id.is_none(),
            "destroy() called on a worker that is still running; call cancel() first"
        );
        drop(state);

        log::debug!(target: "workthread", "worker {:?} destroyed", self.inner.name);

        // Rust's ownership model does the rest: this was this call's share
        // of the `Arc`; once the last clone drops, `Inner` (and its locks,
        // condvar, and callbacks) is freed. There is no separate manual
        // free step.
    }
}

// -----------------------------------------------------------------------------
// Worker loop

fn spawn_thread<A>(inner: &Arc<Inner<A>>) -> Result<ThreadId, CreateError>
where
    A: Send + Sync + 'static,
{
    let mut builder = thread::Builder::new();
    if let Some(name) = &inner.name {
        builder = builder.name(name.clone());
    }
    if let Some(stack_size) = inner.stack_size {
        builder = builder.stack_size(stack_size);
    }

    let inner = Arc::clone(inner);
    let join_handle = builder
        .spawn(move || worker_loop(inner))
        .map_err(CreateError::SpawnFailed)?;

    let id = join_handle.thread().id();
    // We never join: `cancel()` synchronizes with the worker via the
    // condvar, not via `JoinHandle::join`. Dropping the handle detaches
    // the thread, which is what we want.
    Ok(id)
}

/// The procedure run on the dedicated worker thread.
///
/// Holds the state lock continuously except while `work` executes.
fn worker_loop<A>(inner: Arc<Inner<A>>) {
    let handle = WorkerHandle { inner: Arc::clone(&inner) };
    let mut state = lock_state(&inner);

    loop {
        if state.cancelled {
            break;
        }

        // `check` runs under the state lock: this deliberately freezes
        // the cancel/resume surface while it decides whether there is
        // work, so the decision and the subsequent work dispatch can't
        // race with a cancel.
        let should_work = run_check(&inner, &handle);

        if should_work {
            log::trace!(target: "workthread", "worker {:?} dispatching work", inner.name);
            drop(state);
            run_work(&inner, &handle);
            state = lock_state(&inner);
            continue;
        }

        log::trace!(target: "workthread", "worker {:?} entering sleep", inner.name);
        state = if inner.interval.is_zero() {
            inner.condvar.wait(state).unwrap_or_else(PoisonError::into_inner)
        } else {
            // Spurious early wakeups are allowed; the top of the loop
            // treats every wakeup as a hint, not an edge.
            inner
                .condvar
                .wait_timeout(state, inner.interval)
                .unwrap_or_else(PoisonError::into_inner)
                .0
        };
        log::trace!(target: "workthread", "worker {:?} woke up", inner.name);
    }

    state.thread_id = None;
    state.cancelled = false;
    inner.condvar.notify_all();
    drop(state);

    log::debug!(target: "workthread", "worker {:?} loop exited", inner.name);
}

fn run_check<A>(inner: &Inner<A>, handle: &WorkerHandle<A>) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| (inner.check)(&inner.arg, handle))) {
        Ok(result) => result,
        Err(_) => {
            log::warn!(target: "workthread", "check callback for worker {:?} panicked; treating as no work", inner.name);
            false
        }
    }
}

fn run_work<A>(inner: &Inner<A>, handle: &WorkerHandle<A>) {
    if panic::catch_unwind(AssertUnwindSafe(|| (inner.work)(&inner.arg, handle))).is_err() {
        log::warn!(target: "workthread", "work callback for worker {:?} panicked; continuing loop", inner.name);
    }
}
