//! A managed background-worker thread.
//!
//! [`WorkerHandle`] lets a host subsystem run an isolated, long-lived
//! activity on its own thread: wake it when there is work, put it to
//! sleep when there isn't, cancel it safely even mid-work, resume it
//! later, and eventually destroy it. It is meant for activities that span
//! many epochs of a host system (background space reclamation,
//! scrubbing, compaction, trimming, ...) where exactly one authoritative
//! "is there work" indicator is owned by the host and consulted by a
//! `check` callback.
//!
//! # The protocol, in one picture
//!
//! ```text
//! loop {
//!     if cancelled { break }
//!     if check(arg) {      // runs with the state lock held
//!         work(arg)        // runs with no lock held, can be slow
//!     } else {
//!         sleep(interval)  // or wait indefinitely; wakeup()/cancel() break it early
//!     }
//! }
//! ```
//!
//! The split between `check` (locked, fast, serializes against
//! [`cancel`]/[`resume`]/[`wakeup`]) and `work` (unlocked, can be slow) is
//! the whole point: a single callback could not provide both properties
//! without risking deadlocking cancellation.
//!
//! # What this crate does not do
//!
//! There is no work queue: exactly one "is there work" bit, owned by the
//! caller and consulted by `check`. No priority scheduling, no
//! work-stealing, no multi-worker pools, no structured cancellation
//! trees, no progress reporting, no persistence across restarts. Build
//! those on top if you need them; this crate stays small on purpose.
//!
//! # Locking
//!
//! Two locks, one strict order. Requests ([`wakeup`], [`cancel`],
//! [`resume`]) take `request` then `state`. The worker loop only ever
//! takes `state`. [`is_cancelled`] (meant to be polled from inside
//! `work`) takes only `state`, never `request`, specifically so it
//! can't contend with a `cancel` call that is waiting on the same
//! worker. See [`WorkerHandle::is_cancelled`] for why that would
//! otherwise deadlock.
//!
//! [`cancel`]: WorkerHandle::cancel
//! [`resume`]: WorkerHandle::resume
//! [`wakeup`]: WorkerHandle::wakeup
//! [`is_cancelled`]: WorkerHandle::is_cancelled

mod builder;
mod error;
mod worker;

pub use builder::WorkerBuilder;
pub use error::CreateError;
pub use worker::WorkerHandle;

#[cfg(test)]
mod tests;
