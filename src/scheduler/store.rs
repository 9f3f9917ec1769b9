use std::collections::{HashMap, HashSet};

use crate::builder::ProcessJobResponse;
use crate::scheduler::job::{Job, JobDetails, JobIdentity, JobState};

/// The single source of truth for all jobs.
///
/// Owns every job from submission until it either completes (evicted) or
/// fails (retained so the last failure stays queryable until a fresh
/// submission for the same identity supersedes it). All mutation happens on
/// the dispatch task; workers report results back through the controller.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: HashMap<JobIdentity, Job>,
    queued: HashSet<JobIdentity>,
    in_flight: HashSet<JobIdentity>,
    next_serial: u64,
    revision: u64,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a new build request. Returns false (and drops the request)
    /// when a job with the same identity is already pending or processing;
    /// resubmission of queued work is a deliberate no-op. A retained failed
    /// job with the same identity is purged: a retry supersedes the old
    /// failure record.
    pub fn submit(&mut self, details: JobDetails) -> bool {
        let identity = details.identity();
        if let Some(existing) = self.jobs.get(&identity) {
            if !existing.state().is_terminal() {
                tracing::debug!(job = %identity, "job is already in queue - ignored");
                return false;
            }
            tracing::debug!(job = %identity, "purging superseded failed job");
            self.jobs.remove(&identity);
        }

        let serial = self.next_serial;
        self.next_serial += 1;
        self.jobs.insert(identity.clone(), Job::new(details, serial));
        self.queued.insert(identity);
        self.revision += 1;
        true
    }

    /// Pending -> Processing: stamp the launch time and move the job from
    /// the queued lookup into the in-flight set.
    pub fn mark_processing(&mut self, identity: &JobIdentity) -> bool {
        let Some(job) = self.jobs.get_mut(identity) else {
            return false;
        };
        if job.state() != JobState::Pending {
            return false;
        }
        job.set_state(JobState::Processing);
        job.stamp_launched();
        self.queued.remove(identity);
        self.in_flight.insert(identity.clone());
        self.revision += 1;
        true
    }

    /// Record a terminal state. Completed jobs are evicted entirely; any
    /// other terminal state keeps the job around, indexed as failed.
    pub fn mark_completed(
        &mut self,
        identity: &JobIdentity,
        state: JobState,
        response: ProcessJobResponse,
    ) -> bool {
        debug_assert!(state.is_terminal());
        let Some(job) = self.jobs.get_mut(identity) else {
            return false;
        };
        job.set_state(state);
        job.stamp_completed();
        job.set_response(response);
        self.in_flight.remove(identity);
        self.queued.remove(identity);
        if state.is_success() {
            self.jobs.remove(identity);
        }
        self.revision += 1;
        true
    }

    pub fn get(&self, identity: &JobIdentity) -> Option<&Job> {
        self.jobs.get(identity)
    }

    /// Retained record of the last non-successful run for this identity,
    /// if any.
    pub fn failed_job(&self, identity: &JobIdentity) -> Option<&Job> {
        self.jobs
            .get(identity)
            .filter(|job| job.state().is_terminal())
    }

    pub fn is_queued(&self, identity: &JobIdentity) -> bool {
        self.queued.contains(identity)
    }

    pub fn is_in_flight(&self, identity: &JobIdentity) -> bool {
        self.in_flight.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Bumped on every mutation; lets the sort view detect churn without
    /// being notified of each event.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Three-tier broadening name match over pending and in-flight jobs on
    /// one platform. Each tier runs only if the previous one found nothing:
    ///
    /// 1. case-insensitive suffix match on the relative path;
    /// 2. the same with the extension stripped from both sides;
    /// 3. strip the search term from its last `_` onward (when past the
    ///    last path separator) and accept any path *containing* that stem.
    ///
    /// Tier 3 exists to catch texture-variant suffix conventions
    /// (`_diff`, `_spec`, ...) and can over-match; callers must expect it.
    pub fn heuristic_search(
        &self,
        search_term: &str,
        platform: &str,
    ) -> HashSet<JobIdentity> {
        let platform = platform.to_lowercase();
        let term = search_term.to_lowercase();
        let mut found = HashSet::new();

        let candidates = || {
            self.jobs.values().filter(|job| {
                !job.state().is_terminal() && job.platform() == platform
            })
        };

        for job in candidates() {
            if job.identity().source().to_lowercase().ends_with(&term) {
                tracing::debug!(job = %job.identity(), "heuristic search found exact match");
                found.insert(job.identity().clone());
            }
        }
        if !found.is_empty() {
            return found;
        }

        // Broaden: ignore everything after the last dot on both sides.
        let dot = term.rfind('.');
        let term_stem = match dot {
            Some(idx) => &term[..idx],
            None => term.as_str(),
        };
        if dot.is_some() {
            for job in candidates() {
                let input = job.identity().source().to_lowercase();
                if let Some(input_dot) = input.rfind('.') {
                    if input[..input_dot].ends_with(term_stem) {
                        tracing::debug!(job = %job.identity(), "heuristic search found broad match");
                        found.insert(job.identity().clone());
                    }
                }
            }
        }
        if !found.is_empty() {
            return found;
        }

        // Broaden further: drop the trailing underscore suffix from the
        // file name (blahblah_diff -> blahblah) and accept any path that
        // contains the stem anywhere. Deliberately very broad.
        let slash = term.rfind('/').map(|i| i as isize).unwrap_or(-1);
        let underscore = term.rfind('_').map(|i| i as isize).unwrap_or(-1);
        let broad_stem = if underscore != -1 && underscore > slash {
            &term_stem[..(underscore as usize).min(term_stem.len())]
        } else {
            term_stem
        };
        for job in candidates() {
            let input = job.identity().source().to_lowercase();
            if input.contains(broad_stem) {
                tracing::debug!(job = %job.identity(), "heuristic search found ultra-broad match");
                found.insert(job.identity().clone());
            }
        }
        found
    }
}
