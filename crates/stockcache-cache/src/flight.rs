//! Single-flight registry.
//!
//! Concurrent misses for the same key await one shared fetch instead of each
//! issuing their own. The caller that starts a fetch owns its registration;
//! when that caller finishes (or its future is dropped) the registration is
//! removed. Callers that joined keep polling the shared future, so a cancelled
//! owner never strands its waiters.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};

pub(crate) type SharedJob<V> = Shared<BoxFuture<'static, V>>;

struct Registry<K, V> {
    next_ticket: u64,
    jobs: HashMap<K, (u64, SharedJob<V>)>,
}

pub(crate) struct InFlight<K, V> {
    registry: Mutex<Registry<K, V>>,
}

impl<K, V> Default for InFlight<K, V> {
    fn default() -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_ticket: 0,
                jobs: HashMap::new(),
            }),
        }
    }
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn lock(&self) -> MutexGuard<'_, Registry<K, V>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Awaits the in-flight job for `key`, or starts one with `start`.
    pub(crate) async fn run<F>(&self, key: K, start: F) -> V
    where
        F: FnOnce() -> BoxFuture<'static, V>,
    {
        let (job, _guard) = {
            let mut registry = self.lock();
            if let Some((_, job)) = registry.jobs.get(&key) {
                (job.clone(), None)
            } else {
                let ticket = registry.next_ticket;
                registry.next_ticket += 1;
                let job = start().shared();
                registry.jobs.insert(key.clone(), (ticket, job.clone()));
                (
                    job,
                    Some(FlightGuard {
                        owner: self,
                        ticket,
                        keys: vec![key],
                    }),
                )
            }
        };
        job.await
    }

    /// Multi-key variant of [`run`](Self::run).
    ///
    /// Keys already in flight join their existing jobs (each distinct job is
    /// awaited once). The remaining keys are handed to `start` as one new job.
    /// Results come back with the newly started job first, followed by the
    /// joined jobs in the order their first key appeared in `keys`.
    pub(crate) async fn run_many<F>(&self, keys: &[K], start: F) -> Vec<V>
    where
        F: FnOnce(Vec<K>) -> BoxFuture<'static, V>,
    {
        let (jobs, _guard) = {
            let mut registry = self.lock();
            let mut joined = Vec::new();
            let mut joined_tickets = HashSet::new();
            let mut fresh = Vec::new();
            let mut fresh_seen = HashSet::new();

            for key in keys {
                match registry.jobs.get(key) {
                    Some((ticket, job)) => {
                        if joined_tickets.insert(*ticket) {
                            joined.push(job.clone());
                        }
                    }
                    None => {
                        if fresh_seen.insert(key.clone()) {
                            fresh.push(key.clone());
                        }
                    }
                }
            }

            if fresh.is_empty() {
                (joined, None)
            } else {
                let ticket = registry.next_ticket;
                registry.next_ticket += 1;
                let job = start(fresh.clone()).shared();
                for key in &fresh {
                    registry.jobs.insert(key.clone(), (ticket, job.clone()));
                }
                let mut jobs = Vec::with_capacity(joined.len() + 1);
                jobs.push(job);
                jobs.extend(joined);
                (
                    jobs,
                    Some(FlightGuard {
                        owner: self,
                        ticket,
                        keys: fresh,
                    }),
                )
            }
        };
        join_all(jobs).await
    }

    /// Detaches the job registered for `key`. Current waiters are unaffected;
    /// the next caller starts a new job.
    pub(crate) fn forget(&self, key: &K) {
        self.lock().jobs.remove(key);
    }

    pub(crate) fn forget_all(&self) {
        self.lock().jobs.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().jobs.len()
    }
}

/// Removes the owner's registrations on drop, unless they were replaced.
struct FlightGuard<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    owner: &'a InFlight<K, V>,
    ticket: u64,
    keys: Vec<K>,
}

impl<K, V> Drop for FlightGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        let mut registry = self.owner.lock();
        for key in &self.keys {
            if registry
                .jobs
                .get(key)
                .is_some_and(|(ticket, _)| *ticket == self.ticket)
            {
                registry.jobs.remove(key);
            }
        }
    }
}
