use std::collections::HashSet;

use uuid::Uuid;

use crate::events::GroupStatus;
use crate::scheduler::{JobIdentity, JobState, JobStore, SortModel};

/// One outstanding "tell me when these all finish" request.
#[derive(Debug)]
pub struct CompileGroup {
    request_id: Uuid,
    members: HashSet<JobIdentity>,
}

impl CompileGroup {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn members(&self) -> &HashSet<JobIdentity> {
        &self.members
    }
}

/// Tracks compile groups so a network caller can block until every job
/// matching a search term finishes, without polling. A group resolves when
/// its member set drains, and fails fast the moment any single member ends
/// in a non-completed state.
#[derive(Debug, Default)]
pub struct CompileGroupTracker {
    active: Vec<CompileGroup>,
}

impl CompileGroupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a search term against the store and open a group over the
    /// matches. Every member gets a synchronous compile boost so the queue
    /// prefers it. Returns `Unknown` (and creates nothing) when the
    /// heuristic finds no match.
    pub fn request_group(
        &mut self,
        request_id: Uuid,
        platform: &str,
        search_term: &str,
        store: &JobStore,
        sort: &mut SortModel,
    ) -> GroupStatus {
        let members = store.heuristic_search(search_term, platform);
        if members.is_empty() {
            tracing::debug!(%request_id, search_term, "compile group request matched nothing");
            return GroupStatus::Unknown;
        }

        for member in &members {
            sort.add_compile_boost(member.clone(), true);
        }
        tracing::debug!(
            %request_id,
            members = members.len(),
            "compile group created"
        );
        self.active.push(CompileGroup { request_id, members });
        GroupStatus::Queued
    }

    /// Account a finished job against every group that contains it (an
    /// identity may belong to several overlapping groups). Returns the
    /// groups that resolved, with their final status.
    pub fn on_job_finished(
        &mut self,
        identity: &JobIdentity,
        state: JobState,
        sort: &mut SortModel,
    ) -> Vec<(Uuid, GroupStatus)> {
        let mut finished = Vec::new();
        if self.active.is_empty() {
            return finished;
        }

        // Walk backwards so groups can be removed mid-iteration.
        for idx in (0..self.active.len()).rev() {
            let group = &mut self.active[idx];
            if !group.members.remove(identity) {
                continue;
            }
            sort.remove_compile_boost(identity, true);

            if state != JobState::Completed {
                // One failure fails the whole group; remaining members keep
                // running but their outcome no longer matters to it.
                finished.push((group.request_id, GroupStatus::Failed));
                self.active.remove(idx);
            } else if group.members.is_empty() {
                finished.push((group.request_id, GroupStatus::Compiled));
                self.active.remove(idx);
            }
        }
        finished
    }

    pub fn active_groups(&self) -> &[CompileGroup] {
        &self.active
    }
}
