use std::cmp::Ordering;
use std::collections::HashSet;

use crate::scheduler::job::{Job, JobIdentity, JobState};
use crate::scheduler::store::JobStore;

/// Read-through priority view over the store's pending jobs.
///
/// Not a second store: the ordering is recomputed lazily from [`JobStore`]
/// when the view is queried after a mutation, so a burst of boost or
/// connection changes costs one re-sort per dispatch pass instead of one
/// per event.
#[derive(Debug, Default)]
pub struct SortModel {
    connected_platforms: HashSet<String>,
    /// Recency-ordered compile-boost lists. Duplicates are meaningful: the
    /// position encodes how recent the request was, not mere membership.
    sync_requests: Vec<JobIdentity>,
    async_requests: Vec<JobIdentity>,
    cached_order: Vec<JobIdentity>,
    dirty: bool,
    seen_revision: u64,
}

impl SortModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single highest-priority pending job, or `None` when nothing is
    /// pending (which, with zero jobs in flight, is the idle signal).
    pub fn next_pending(&mut self, store: &JobStore) -> Option<JobIdentity> {
        if self.dirty || self.seen_revision != store.revision() {
            self.resort(store);
        }
        for identity in &self.cached_order {
            if let Some(job) = store.get(identity) {
                if job.state() == JobState::Pending {
                    return Some(identity.clone());
                }
            }
        }
        None
    }

    fn resort(&mut self, store: &JobStore) {
        let mut pending: Vec<&Job> = store
            .jobs()
            .filter(|job| job.state() == JobState::Pending)
            .collect();
        pending.sort_by(|left, right| self.compare(left, right));
        self.cached_order = pending
            .into_iter()
            .map(|job| job.identity().clone())
            .collect();
        self.seen_revision = store.revision();
        self.dirty = false;
    }

    /// Total dispatch order; the first discriminator that differs wins.
    fn compare(&self, left: &Job, right: &Job) -> Ordering {
        // A platform someone is connected to beats one nobody waits on.
        let left_active = self.connected_platforms.contains(left.platform());
        let right_active = self.connected_platforms.contains(right.platform());
        if left_active != right_active {
            return if left_active {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }

        if left.is_critical() != right.is_critical() {
            return if left.is_critical() {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }

        // Compile-boost recency: a higher index is a more recent request
        // and sorts earlier. Unregistered jobs (-1) sort after all
        // registered ones.
        let left_sync = last_index_of(&self.sync_requests, left.identity());
        let right_sync = last_index_of(&self.sync_requests, right.identity());
        if left_sync != right_sync {
            return right_sync.cmp(&left_sync);
        }

        let left_async = last_index_of(&self.async_requests, left.identity());
        let right_async = last_index_of(&self.async_requests, right.identity());
        if left_async != right_async {
            return right_async.cmp(&left_async);
        }

        // pc-format assets are what the editor consumes, so pc goes first.
        if left.platform() != right.platform() {
            if left.platform() == "pc" {
                return Ordering::Less;
            }
            if right.platform() == "pc" {
                return Ordering::Greater;
            }
        }

        let left_priority = left.priority();
        let right_priority = right.priority();
        if left_priority >= 0 && right_priority >= 0 && left_priority != right_priority {
            return right_priority.cmp(&left_priority);
        }

        // Stable fallback: insertion order.
        left.serial().cmp(&right.serial())
    }

    /// Register a compile-group boost for this identity. Appending (even a
    /// duplicate) records recency; the queue re-sorts on the next query.
    pub fn add_compile_boost(&mut self, identity: JobIdentity, sync: bool) {
        self.dirty = true;
        if sync {
            self.sync_requests.push(identity);
        } else {
            self.async_requests.push(identity);
        }
    }

    /// Remove the most recently added matching boost entry only. Called
    /// when a group member finishes, so it does not disturb the relative
    /// order of anything still queued.
    pub fn remove_compile_boost(&mut self, identity: &JobIdentity, sync: bool) {
        let requests = if sync {
            &mut self.sync_requests
        } else {
            &mut self.async_requests
        };
        if let Some(idx) = requests.iter().rposition(|entry| entry == identity) {
            requests.remove(idx);
            self.dirty = true;
        }
    }

    /// Connection changes take effect on the next `next_pending` call, not
    /// retroactively on an order already handed out.
    pub fn set_platform_connected(&mut self, platform: &str, connected: bool) {
        tracing::debug!(platform, connected, "platform connection changed");
        self.dirty = true;
        let platform = platform.to_lowercase();
        if connected {
            self.connected_platforms.insert(platform);
        } else {
            self.connected_platforms.remove(&platform);
        }
    }

    pub fn is_platform_connected(&self, platform: &str) -> bool {
        self.connected_platforms
            .contains(&platform.to_lowercase())
    }
}

fn last_index_of(requests: &[JobIdentity], identity: &JobIdentity) -> i64 {
    requests
        .iter()
        .rposition(|entry| entry == identity)
        .map(|idx| idx as i64)
        .unwrap_or(-1)
}
