pub mod job;
pub mod sort;
pub mod store;

pub use job::{Job, JobDetails, JobIdentity, JobState};
pub use sort::SortModel;
pub use store::JobStore;
