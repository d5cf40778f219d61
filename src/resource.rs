//! Exclusively-held, time-bounded lock shared by two neighbouring agents.
//!
//! Ownership is represented by a [`ResourceGuard`]: the resource is released
//! when the guard is dropped, so only the current holder can ever release it
//! and a release happens exactly once per successful acquisition.

use crate::cancel::CancellationToken;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Waits longer than this are clamped so deadline arithmetic cannot overflow
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// A single contended resource in the ring
#[derive(Debug)]
pub struct Resource {
    id: usize,
    /// Id of the agent currently holding the resource
    holder: Mutex<Option<usize>>,
    released: Condvar,
}

/// Outcome of [`Resource::try_acquire`]
#[must_use]
#[derive(Debug)]
pub enum Acquisition<'a> {
    Acquired(ResourceGuard<'a>),
    TimedOut,
    /// The wait was interrupted by shutdown; treated like a timeout
    Cancelled,
}

impl<'a> Acquisition<'a> {
    pub fn into_guard(self) -> Option<ResourceGuard<'a>> {
        match self {
            Acquisition::Acquired(guard) => Some(guard),
            Acquisition::TimedOut | Acquisition::Cancelled => None,
        }
    }
}

/// Proof of exclusive ownership; releases the resource on drop
pub struct ResourceGuard<'a> {
    resource: &'a Resource,
    owner: usize,
}

impl Resource {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            holder: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Id of the current holder, if any. Only a point-in-time observation.
    pub fn holder(&self) -> Option<usize> {
        *self.lock_holder()
    }

    /// Block for at most `timeout` trying to take exclusive ownership for `owner`.
    ///
    /// Competing waiters are not served in FIFO order. Cancelling `cancel`
    /// (followed by [`Resource::interrupt`]) makes every pending and future
    /// call return [`Acquisition::Cancelled`].
    pub fn try_acquire(
        &self,
        owner: usize,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Acquisition<'_> {
        let deadline = Instant::now() + timeout.min(MAX_WAIT);
        let mut holder = self.lock_holder();

        loop {
            if cancel.is_cancelled() {
                return Acquisition::Cancelled;
            }

            match *holder {
                None => {
                    *holder = Some(owner);
                    return Acquisition::Acquired(ResourceGuard {
                        resource: self,
                        owner,
                    });
                }
                Some(current) => debug_assert_ne!(
                    current, owner,
                    "agent {} re-acquired resource {} it already holds",
                    owner, self.id
                ),
            }

            let now = Instant::now();
            if now >= deadline {
                return Acquisition::TimedOut;
            }

            let (guard, _) = self
                .released
                .wait_timeout(holder, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            holder = guard;
        }
    }

    /// Wake every thread blocked in [`Resource::try_acquire`] so it can
    /// observe cancellation.
    pub fn interrupt(&self) {
        let _holder = self.lock_holder();
        self.released.notify_all();
    }

    fn release(&self, owner: usize) {
        let mut holder = self.lock_holder();
        debug_assert_eq!(
            *holder,
            Some(owner),
            "resource {} released by non-holder {}",
            self.id,
            owner
        );
        *holder = None;
        drop(holder);
        self.released.notify_one();
    }

    fn lock_holder(&self) -> MutexGuard<'_, Option<usize>> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResourceGuard<'_> {
    pub fn resource_id(&self) -> usize {
        self.resource.id
    }
}

impl fmt::Debug for ResourceGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("resource", &self.resource.id)
            .field("owner", &self.owner)
            .finish()
    }
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        self.resource.release(self.owner);
    }
}
