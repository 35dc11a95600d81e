pub mod job;
pub mod response;

pub use job::{IngestRun, JobBaseline, JobHistoryPoint, JobRecord, Snapshot, SnapshotListing};
pub use response::{ErrorBody, IngestReport};
