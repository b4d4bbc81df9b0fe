mod snapshot;

pub use snapshot::{SNAPSHOT_FILENAME, Snapshot, read_snapshot, write_snapshot};
