pub mod id_matching;
pub mod report;
pub mod sync;

pub use id_matching::{matches, normalize_title};
pub use report::{format_unmatched, unmatched_rows, UnmatchedRow};
pub use sync::{SyncError, SyncOrchestrator, SyncSettings};
