mod test_support;

use assetflow::{JobDetails, JobState, JobStore, ProcessJobResponse, SortModel};
use test_support::job_details;

fn submit(store: &mut JobStore, details: JobDetails) -> assetflow::JobIdentity {
    let identity = details.identity();
    assert!(store.submit(details));
    identity
}

#[test]
fn empty_store_has_no_next_job() {
    let store = JobStore::new();
    let mut sort = SortModel::new();
    assert!(sort.next_pending(&store).is_none());
}

#[test]
fn submission_order_is_the_stable_fallback() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let first = submit(&mut store, job_details("a.dds", "pc", "k"));
    let second = submit(&mut store, job_details("b.dds", "pc", "k"));

    assert_eq!(sort.next_pending(&store), Some(first.clone()));

    // Still the first job until it actually leaves Pending.
    assert_eq!(sort.next_pending(&store), Some(first.clone()));

    store.mark_processing(&first);
    assert_eq!(sort.next_pending(&store), Some(second));
}

#[test]
fn processing_jobs_are_never_returned() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let only = submit(&mut store, job_details("a.dds", "pc", "k"));
    store.mark_processing(&only);

    assert!(sort.next_pending(&store).is_none());
}

#[test]
fn connected_platform_sorts_first() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let es3 = submit(&mut store, job_details("a.dds", "es3", "k"));
    let ios = submit(&mut store, job_details("b.dds", "ios", "k"));

    sort.set_platform_connected("ios", true);
    assert!(sort.is_platform_connected("ios"));
    // Connection state compares case-insensitively, like platforms do.
    assert!(sort.is_platform_connected("IOS"));
    assert!(!sort.is_platform_connected("es3"));
    assert_eq!(sort.next_pending(&store), Some(ios));

    // Disconnect: back to the neutral order, i.e. submission order.
    sort.set_platform_connected("ios", false);
    assert!(!sort.is_platform_connected("ios"));
    assert_eq!(sort.next_pending(&store), Some(es3));
}

#[test]
fn connected_platform_beats_submission_order_regardless_of_direction() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let pc = submit(&mut store, job_details("a.dds", "pc", "k"));
    submit(&mut store, job_details("b.dds", "es3", "k"));

    sort.set_platform_connected("pc", true);
    assert_eq!(sort.next_pending(&store), Some(pc));

    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    submit(&mut store, job_details("a.dds", "es3", "k"));
    let pc = submit(&mut store, job_details("b.dds", "pc", "k"));

    sort.set_platform_connected("pc", true);
    assert_eq!(sort.next_pending(&store), Some(pc));
}

#[test]
fn critical_jobs_jump_the_queue() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    submit(&mut store, job_details("a.dds", "pc", "k"));
    let mut details = job_details("b.cfg", "pc", "copy");
    details.critical = true;
    let critical = submit(&mut store, details);

    assert_eq!(sort.next_pending(&store), Some(critical));
}

#[test]
fn connected_platform_outranks_criticality() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let mut details = job_details("a.cfg", "es3", "copy");
    details.critical = true;
    submit(&mut store, details);
    let connected = submit(&mut store, job_details("b.dds", "ios", "k"));

    sort.set_platform_connected("ios", true);
    assert_eq!(sort.next_pending(&store), Some(connected));
}

#[test]
fn sync_boost_prefers_most_recent_registration() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let first = submit(&mut store, job_details("a.dds", "pc", "k"));
    let second = submit(&mut store, job_details("b.dds", "pc", "k"));

    sort.add_compile_boost(first.clone(), true);
    sort.add_compile_boost(second.clone(), true);

    // More recent registration wins among sync-boosted jobs.
    assert_eq!(sort.next_pending(&store), Some(second.clone()));

    sort.remove_compile_boost(&second, true);
    assert_eq!(sort.next_pending(&store), Some(first));
}

#[test]
fn boosted_job_sorts_before_unboosted() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    submit(&mut store, job_details("a.dds", "pc", "k"));
    let boosted = submit(&mut store, job_details("b.dds", "pc", "k"));

    sort.add_compile_boost(boosted.clone(), true);
    assert_eq!(sort.next_pending(&store), Some(boosted));
}

#[test]
fn async_boost_breaks_sync_ties() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    submit(&mut store, job_details("a.dds", "pc", "k"));
    let async_boosted = submit(&mut store, job_details("b.dds", "pc", "k"));

    sort.add_compile_boost(async_boosted.clone(), false);
    assert_eq!(sort.next_pending(&store), Some(async_boosted));
}

#[test]
fn sync_boost_outranks_async_boost() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let async_boosted = submit(&mut store, job_details("a.dds", "pc", "k"));
    let sync_boosted = submit(&mut store, job_details("b.dds", "pc", "k"));

    sort.add_compile_boost(async_boosted, false);
    sort.add_compile_boost(sync_boosted.clone(), true);
    assert_eq!(sort.next_pending(&store), Some(sync_boosted));
}

#[test]
fn duplicate_boosts_unwind_one_at_a_time() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let first = submit(&mut store, job_details("a.dds", "pc", "k"));
    let second = submit(&mut store, job_details("b.dds", "pc", "k"));

    // first is boosted twice (two overlapping groups), second once, last.
    sort.add_compile_boost(first.clone(), true);
    sort.add_compile_boost(second.clone(), true);
    sort.add_compile_boost(first.clone(), true);

    assert_eq!(sort.next_pending(&store), Some(first.clone()));

    // Removing the most recent entry for first leaves its older entry,
    // which now ranks below second's.
    sort.remove_compile_boost(&first, true);
    assert_eq!(sort.next_pending(&store), Some(second));
}

#[test]
fn pc_platform_wins_the_tie_break() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    submit(&mut store, job_details("a.dds", "es3", "k"));
    let pc = submit(&mut store, job_details("b.dds", "pc", "k"));

    assert_eq!(sort.next_pending(&store), Some(pc));
}

#[test]
fn explicit_priority_orders_when_both_sides_have_one() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let mut low = job_details("a.dds", "pc", "k");
    low.priority = 1;
    submit(&mut store, low);
    let mut high = job_details("b.dds", "pc", "k");
    high.priority = 10;
    let high = submit(&mut store, high);

    assert_eq!(sort.next_pending(&store), Some(high));
}

#[test]
fn unset_priority_falls_back_to_submission_order() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let first = submit(&mut store, job_details("a.dds", "pc", "k"));
    let mut second = job_details("b.dds", "pc", "k");
    second.priority = 100;
    submit(&mut store, second);

    // One side unset (-1): the priority criterion does not apply.
    assert_eq!(sort.next_pending(&store), Some(first));
}

#[test]
fn completed_jobs_disappear_from_the_view() {
    let mut store = JobStore::new();
    let mut sort = SortModel::new();
    let first = submit(&mut store, job_details("a.dds", "pc", "k"));
    let second = submit(&mut store, job_details("b.dds", "pc", "k"));

    assert_eq!(sort.next_pending(&store), Some(first.clone()));
    store.mark_processing(&first);
    store.mark_completed(&first, JobState::Completed, ProcessJobResponse::success(Vec::new()));

    assert_eq!(sort.next_pending(&store), Some(second.clone()));
    store.mark_processing(&second);
    store.mark_completed(&second, JobState::Failed, ProcessJobResponse::failed());

    // The failed job is retained in the store but is not pending.
    assert!(sort.next_pending(&store).is_none());
}
